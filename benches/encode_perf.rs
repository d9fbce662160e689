use std::hint::black_box;

use codspeed_criterion_compat::*;

use cbor_encoder::{EncoderOptions, Value, encode_to_vec};

fn document(width: usize) -> Value {
    let shared = Value::map([
        (Value::from("kind"), Value::from("shared")),
        (Value::from("payload"), Value::bytes(vec![0xab; 64])),
    ]);
    Value::array((0..width).map(|i| {
        Value::array([
            Value::from(i),
            Value::from(i as f64 * 0.5),
            Value::from(format!("item-{i}")),
            shared.clone(),
        ])
    }))
}

fn bench(c: &mut Criterion) {
    let doc = document(1000);
    let plain = EncoderOptions::default();
    let sharing = EncoderOptions::default().with_value_sharing(true);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("plain", |b| {
        b.iter(|| encode_to_vec(black_box(&doc), &plain))
    });
    group.bench_function("value_sharing", |b| {
        b.iter(|| encode_to_vec(black_box(&doc), &sharing))
    });
    group.finish();
}

criterion_group!(benches, bench);
criterion_main!(benches);
