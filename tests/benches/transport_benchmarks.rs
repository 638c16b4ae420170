//! # Transport Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Route resolution | < 1µs |
//! | Send + receive through the in-memory fabric | < 10µs per message |
//! | Payload buffer reuse | < 1µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_bus::{BufferPool, InMemoryFabric, RouteTable};
use shared_types::message_types::RIC_INDICATION;
use shared_types::{Endpoint, MessageEnvelope};
use std::sync::Arc;
use std::time::Duration;
use xf_01_endpoint_registry::EndpointRegistry;
use xf_02_transport::{MessageTransport, ReceiveMode, Received, Transport, TransportConfig};

// ============================================================================
// ROUTE TABLE
// ============================================================================

fn bench_route_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("route-table");

    let mut table = RouteTable::new();
    for sub_id in 0..1_000 {
        table.add(RIC_INDICATION, Some(sub_id), format!("xapp-{}", sub_id % 16));
    }
    table.add(RIC_INDICATION, None, "collector");

    group.bench_function("resolve_subscription_route", |b| {
        b.iter(|| black_box(table.resolve(RIC_INDICATION, black_box(512))))
    });
    group.bench_function("resolve_type_fallback", |b| {
        b.iter(|| black_box(table.resolve(RIC_INDICATION, black_box(5_000))))
    });

    group.finish();
}

// ============================================================================
// SEND / RECEIVE
// ============================================================================

fn transport(fabric: &Arc<InMemoryFabric>, name: &str, capacity: usize) -> Transport<InMemoryFabric> {
    Transport::new(
        Arc::clone(fabric),
        Endpoint::new(name, "127.0.0.1", 8080, 4560),
        Arc::new(EndpointRegistry::new()),
        TransportConfig {
            mailbox_capacity: capacity,
            ..TransportConfig::default()
        },
    )
}

fn bench_send_receive(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport");
    group.measurement_time(Duration::from_secs(10));

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");

    for payload_size in [64usize, 1_024, 16_384] {
        let batch = 256;
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new().with_route(RIC_INDICATION, None, "kpimon"),
        ));
        let sender = transport(&fabric, "e2term", batch);
        let receiver = transport(&fabric, "kpimon", batch);
        let payload = vec![0xABu8; payload_size];

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(
            BenchmarkId::new("send_receive_batch", payload_size),
            &payload,
            |b, payload| {
                b.iter(|| {
                    rt.block_on(async {
                        for _ in 0..batch {
                            let envelope = MessageEnvelope::builder(RIC_INDICATION)
                                .subscription_id(1)
                                .payload(payload.clone())
                                .build();
                            sender.send(envelope).await.expect("send");
                        }
                        for _ in 0..batch {
                            match receiver.receive(ReceiveMode::NonBlocking).await {
                                Received::Message(envelope) => receiver.recycle(envelope),
                                other => panic!("unexpected receive result: {other:?}"),
                            }
                        }
                    })
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// BUFFER POOL
// ============================================================================

fn bench_buffer_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer-pool");
    let pool = BufferPool::new(64, 65_536);

    group.bench_function("acquire_release_4k", |b| {
        b.iter(|| {
            let buffer = pool.acquire(black_box(4_096));
            pool.release(buffer);
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_route_resolution,
    bench_send_receive,
    bench_buffer_pool
);
criterion_main!(benches);
