pub mod config;
pub mod health;
pub mod job;
pub mod live;
pub mod scheduler;
pub mod timeline;
