//! Benchmarks for event replay, timeline layout and animation frames.
use chrono::{Duration, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jobscope_core::model::{Aggregate, JobProperties, RawEvent, SchedulerAggregate, Snapshot, Timestamp};
use jobscope_core::timeline::{AnimationClock, LayoutParams, TimeInterval, TimelineLayoutEngine};

fn start() -> Timestamp {
    NaiveDateTime::parse_from_str("2024-03-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

fn wire(at: Timestamp) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// `jobs` jobs, each run every five minutes for a day; the last run stays open.
fn event_stream(jobs: usize) -> Vec<RawEvent> {
    let t0 = start();
    let mut events = Vec::new();
    for j in 0..jobs {
        let id = format!("job-{j}");
        events.push(
            RawEvent::new("job_added", wire(t0))
                .for_job(&id)
                .with_properties(JobProperties::new(&id, format!("Job {j}"))),
        );
    }
    for run in 0..288 {
        let srt = t0 + Duration::minutes(5 * run) + Duration::seconds(1);
        for j in 0..jobs {
            let id = format!("job-{j}");
            events.push(
                RawEvent::new("job_submitted", wire(srt))
                    .for_job(&id)
                    .with_scheduled_run_time(wire(srt)),
            );
            if run < 287 {
                events.push(
                    RawEvent::new("job_executed", wire(srt + Duration::seconds(40)))
                        .for_job(&id)
                        .with_scheduled_run_time(wire(srt)),
                );
            }
        }
    }
    events
}

fn scheduler(jobs: usize) -> SchedulerAggregate {
    let mut scheduler = SchedulerAggregate::initialize(&Snapshot::default());
    scheduler.replay(event_stream(jobs).iter());
    scheduler
}

fn now() -> Timestamp {
    start() + Duration::hours(23) + Duration::minutes(56)
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_replay");
    for jobs in [10, 100] {
        let events = event_stream(jobs);
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(jobs), &events, |b, events| {
            b.iter(|| {
                let mut scheduler = SchedulerAggregate::initialize(&Snapshot::default());
                scheduler.replay(events.iter());
                black_box(scheduler.version())
            });
        });
    }
    group.finish();
}

fn bench_overview_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("overview_layout");
    let engine = TimelineLayoutEngine::default();
    for jobs in [10, 100, 500] {
        let scheduler = scheduler(jobs);
        for (label, interval) in [("minute", TimeInterval::MINUTE), ("hour", TimeInterval::HOUR)] {
            let params = LayoutParams::overview(1300, interval);
            group.bench_with_input(BenchmarkId::new(label, jobs), &scheduler, |b, scheduler| {
                b.iter(|| black_box(engine.compute(scheduler, now(), &params)));
            });
        }
    }
    group.finish();
}

fn bench_filtered_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtered_layout");
    let engine = TimelineLayoutEngine::default();
    let scheduler = scheduler(500);
    for filter in ["", "job 4", "executed", "no such job"] {
        let params = LayoutParams::overview(1300, TimeInterval::HOUR).with_filter(filter);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{filter:?}")), &params, |b, params| {
            b.iter(|| black_box(engine.compute(&scheduler, now(), params)));
        });
    }
    group.finish();
}

fn bench_detail_layout(c: &mut Criterion) {
    let engine = TimelineLayoutEngine::default();
    let scheduler = scheduler(100);
    let Some(job) = scheduler.job("job-0") else {
        return;
    };
    let params = LayoutParams::detail(job, 1300);
    c.bench_function("detail_layout", |b| {
        b.iter(|| black_box(engine.compute(&scheduler, now(), &params)));
    });
}

fn bench_animation_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("animation_frames");
    let engine = TimelineLayoutEngine::default();
    for jobs in [10, 100] {
        let scene = engine.compute(&scheduler(jobs), now(), &LayoutParams::overview(1300, TimeInterval::MINUTE));
        group.bench_with_input(BenchmarkId::from_parameter(jobs), &scene, |b, scene| {
            b.iter(|| black_box(AnimationClock::new(scene, 1)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_replay,
    bench_overview_layout,
    bench_filtered_layout,
    bench_detail_layout,
    bench_animation_frames
);
criterion_main!(benches);
