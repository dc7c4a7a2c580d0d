//! Performance benchmarks for assignment ticks and check-ins

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use walkin_queue::engine::{AssignmentEngine, Counter, CounterRoster};
use walkin_queue::events::NoopEventPublisher;
use walkin_queue::queue::QueueSettings;
use walkin_queue::store::InMemoryQueueStore;
use walkin_queue::types::{CheckInRequest, QueueEntry, ServiceRequest, TicketNumber};
use walkin_queue::QueueManager;

const CLASSES: [&str; 4] = ["consultation", "billing", "general", "records"];

fn bench_roster(counters: usize) -> CounterRoster {
    let counters = (0..counters)
        .map(|i| {
            Counter::new(
                format!("Counter {}", i + 1),
                [CLASSES[i % CLASSES.len()], "general"],
            )
        })
        .collect();
    CounterRoster::new(counters).expect("valid roster")
}

fn bench_queue(size: usize) -> Vec<QueueEntry> {
    let opened = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    (0..size)
        .map(|i| {
            QueueEntry::new(
                TicketNumber::new(i as u64 + 1),
                format!("Visitor {}", i),
                format!("555-{:04}", i),
                vec![ServiceRequest::new(
                    "Service",
                    CLASSES[i % CLASSES.len()],
                    10 + (i % 20) as u32,
                )],
                opened + Duration::seconds(i as i64),
            )
        })
        .collect()
}

fn bench_engine_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick");
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

    for size in [20usize, 200, 2000] {
        let engine = AssignmentEngine::new(bench_roster(8));
        let queue = bench_queue(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &queue, |b, queue| {
            b.iter(|| black_box(engine.tick(queue.clone(), now)))
        });
    }

    group.finish();
}

fn bench_check_in(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");

    c.bench_function("check_in_and_tick", |b| {
        b.iter(|| {
            rt.block_on(async {
                let manager = QueueManager::new(
                    Arc::new(InMemoryQueueStore::new()),
                    AssignmentEngine::new(bench_roster(3)),
                    Arc::new(NoopEventPublisher),
                    QueueSettings::default(),
                )
                .expect("manager");

                for i in 0..10 {
                    manager
                        .check_in(CheckInRequest {
                            name: format!("Visitor {}", i),
                            phone: "555-0100".to_string(),
                            requested_services: vec![ServiceRequest::new(
                                "Service", "general", 10,
                            )],
                        })
                        .await
                        .expect("check-in");
                }
                black_box(manager.run_tick(Utc::now()).await.expect("tick"))
            })
        })
    });
}

criterion_group!(benches, bench_engine_tick, bench_check_in);
criterion_main!(benches);
