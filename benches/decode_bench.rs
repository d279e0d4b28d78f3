use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use peel::codec::{get_codec, Codec};
use peel::{CodecId, Engine, Payload};
use std::io::Write;

fn layered_input() -> String {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&b"print('layered payload')\n".repeat(512)).unwrap();
    let inner = STANDARD.encode(enc.finish().unwrap());
    hex::encode(STANDARD.encode(inner))
}

fn bench_auto(c: &mut Criterion) {
    let engine = Engine::default();
    let layered = layered_input();

    c.bench_function("auto_plain_text", |b| b.iter(|| engine.decode_auto(black_box("hello world"))));
    c.bench_function("auto_three_layers", |b| b.iter(|| engine.decode_auto(black_box(layered.as_str()))));
}

fn bench_codecs(c: &mut Criterion) {
    let data = Payload::from(STANDARD.encode(vec![7u8; 1024 * 1024]));
    let base64 = get_codec(CodecId::Base64);

    c.bench_function("base64_decode_1mb", |b| b.iter(|| base64.decode(black_box(&data), usize::MAX)));
}

fn bench_batch(c: &mut Criterion) {
    let engine = Engine::default();
    let inputs: Vec<Payload> = (0..64).map(|i| Payload::from(hex::encode(format!("item {i}")))).collect();

    c.bench_function("batch_64_hex", |b| b.iter(|| engine.decode_batch(black_box(inputs.clone()))));
}

criterion_group!(benches, bench_auto, bench_codecs, bench_batch);
criterion_main!(benches);
