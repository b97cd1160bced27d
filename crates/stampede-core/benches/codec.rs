//! Codec benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stampede_core::{codec, Dispatcher, Envelope, MoveApproved, MoveRequest, PositionCorrection, Vector3f};

fn encode_benchmark(c: &mut Criterion) {
    let msg = MoveRequest {
        target: Vector3f::new(3.25, -1.5, 8.0),
    };

    c.bench_function("encode_move_request", |b| {
        b.iter(|| black_box(codec::encode(&msg).unwrap()))
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let text = codec::encode(&MoveApproved {
        target: Vector3f::new(3.25, -1.5, 8.0),
        speed: 1.0,
    })
    .unwrap();

    c.bench_function("decode_move_approved", |b| {
        b.iter(|| {
            let envelope = Envelope::from_slice(black_box(text.as_bytes())).unwrap();
            black_box(envelope.decode::<MoveApproved>().unwrap())
        })
    });
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut dispatcher: Dispatcher<Vector3f> = Dispatcher::new();
    dispatcher.register::<PositionCorrection, _>(|pos, corr| *pos = corr.position);
    let text = codec::encode(&PositionCorrection {
        position: Vector3f::new(0.5, 0.5, 0.5),
    })
    .unwrap();

    c.bench_function("parse_and_dispatch_correction", |b| {
        let mut pos = Vector3f::ZERO;
        b.iter(|| {
            let envelope = Envelope::from_slice(text.as_bytes()).unwrap();
            black_box(dispatcher.dispatch(&mut pos, &envelope))
        })
    });
}

criterion_group!(benches, encode_benchmark, decode_benchmark, dispatch_benchmark);
criterion_main!(benches);
