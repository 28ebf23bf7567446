//! Server-side live view.
//!
//! A [`LiveView`] task owns the overview parameters and the redraw timers,
//! recomputes the scene when the model or the parameters change, and
//! publishes the newest [`LiveFrame`] on a `watch` channel.

pub mod live;

pub use live::{LiveFrame, LiveView, LiveViewClient, LiveViewHandle, ViewCommand};
