//! Criterion benchmarks for broadcaster fan-out.
//!
//! Measures how long one `Broadcaster::deliver` takes as the number of
//! registered connections grows, using in-memory recording sinks so the
//! numbers reflect the core's own overhead (snapshot, render, per-peer write
//! bookkeeping) rather than socket I/O.
//!
//! Run with:
//! ```bash
//! cargo bench --package chatroom-core --bench fanout_bench
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

use chatroom_core::application::{broadcast_queue, Broadcaster, Registry};
use chatroom_core::{
    ConnectionHandle, HubConfig, Identity, MessageSink, OutboundMessage, TransportError,
    WireFormat,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// A sink that accepts and discards every write.
///
/// The recording double would grow without bound across iterations.
struct NullSink;

#[async_trait]
impl MessageSink for NullSink {
    async fn write_message(&self, payload: &str) -> Result<(), TransportError> {
        black_box(payload);
        Ok(())
    }

    async fn close(&self) {}
}

fn make_broadcaster(peers: usize, wire_format: WireFormat) -> Broadcaster {
    let config = HubConfig {
        wire_format,
        ..HubConfig::default()
    };
    let registry = Arc::new(Registry::new());
    for i in 0..peers {
        registry
            .join(Arc::new(ConnectionHandle::new(
                Identity::new(format!("peer-{i}")),
                Arc::new(NullSink),
            )))
            .expect("fresh handles never collide");
    }
    let (_publisher, rx) = broadcast_queue(&config).expect("default config is valid");
    Broadcaster::new(registry, rx, &config)
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_fanout(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    let message = OutboundMessage::chat(Uuid::new_v4(), Identity::new("bench"), "hello, everyone");

    let mut group = c.benchmark_group("deliver");
    for peers in [1usize, 16, 128, 1024] {
        for (name, format) in [("text", WireFormat::Text), ("json", WireFormat::Json)] {
            let broadcaster = make_broadcaster(peers, format);
            group.bench_with_input(BenchmarkId::new(name, peers), &peers, |b, _| {
                b.iter(|| rt.block_on(broadcaster.deliver(black_box(&message))))
            });
        }
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let message = OutboundMessage::chat(Uuid::new_v4(), Identity::new("bench"), "hello, everyone");
    c.bench_function("render_text", |b| {
        b.iter(|| black_box(&message).render(WireFormat::Text))
    });
    c.bench_function("render_json", |b| {
        b.iter(|| black_box(&message).render(WireFormat::Json))
    });
}

criterion_group!(benches, bench_fanout, bench_render);
criterion_main!(benches);
