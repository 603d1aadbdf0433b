//! Frame codec and request round-trip benchmarks.
//!
//! Benchmarks:
//! - Encoding and decoding frames of different payload sizes
//! - Decoding a burst of back-to-back read events
//! - Request/response latency over loopback TCP
//!
//! Run with: cargo bench --bench frame_codec
//! Results saved to: target/criterion/

use std::hint::black_box;

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures_util::{SinkExt, StreamExt};
use tfp_client::{ErrorCode, Frame, FrameCodec, IpConnection, Uid};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio_util::codec::{Decoder, Encoder, Framed};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_SIZES: &[usize] = &[0, 8, 64, 72];
const BURST_FRAMES: usize = 256;

fn uid() -> Uid {
    Uid::parse("XYZ").expect("uid")
}

// ============================================================================
// Benchmark: Codec
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for &size in PAYLOAD_SIZES {
        let frame = Frame::new(uid(), 1, vec![0xA5; size]).expect("frame");
        group.throughput(Throughput::Bytes((8 + size) as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &frame, |b, frame| {
            let mut buf = BytesMut::with_capacity(80);
            b.iter(|| {
                buf.clear();
                FrameCodec
                    .encode(black_box(frame.clone()), &mut buf)
                    .expect("encode");
            });
        });

        let mut wire = BytesMut::new();
        FrameCodec.encode(frame, &mut wire).expect("encode");
        group.bench_with_input(BenchmarkId::new("decode", size), &wire, |b, wire| {
            b.iter(|| {
                let mut src = wire.clone();
                black_box(FrameCodec.decode(&mut src).expect("decode"));
            });
        });
    }

    group.finish();
}

fn bench_event_burst(c: &mut Criterion) {
    let mut wire = BytesMut::new();
    for offset in 0..BURST_FRAMES {
        let frame = Frame::new(uid(), 12, vec![offset as u8; 64]).expect("frame");
        FrameCodec.encode(frame, &mut wire).expect("encode");
    }

    let mut group = c.benchmark_group("burst");
    group.throughput(Throughput::Elements(BURST_FRAMES as u64));
    group.bench_function("decode_events", |b| {
        b.iter(|| {
            let mut src = wire.clone();
            let mut count = 0;
            while let Some(frame) = FrameCodec.decode(&mut src).expect("decode") {
                black_box(frame);
                count += 1;
            }
            assert_eq!(count, BURST_FRAMES);
        });
    });
    group.finish();
}

// ============================================================================
// Benchmark: Request Round Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let ipcon = rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        // Echo daemon: answers every request with its own payload.
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut framed = Framed::new(stream, FrameCodec);
            while let Some(Ok(request)) = framed.next().await {
                let reply = request
                    .reply(ErrorCode::Ok, request.payload.clone())
                    .expect("reply");
                if framed.send(reply).await.is_err() {
                    break;
                }
            }
        });

        let ipcon = IpConnection::new();
        ipcon.connect(addr.to_string()).await.expect("connect");
        ipcon
    });

    let mut group = c.benchmark_group("round_trip");
    group.bench_function("send_request", |b| {
        b.to_async(&rt).iter(|| async {
            let frame = Frame::new(uid(), 1, vec![0u8; 4]).expect("frame");
            black_box(ipcon.send_request(frame).await.expect("response"));
        });
    });
    group.finish();

    rt.block_on(ipcon.disconnect());
}

criterion_group!(benches, bench_codec, bench_event_burst, bench_round_trip);
criterion_main!(benches);
