//! Benchmarks for the codec and event-decoding hot paths.
//!
//! Run with: `cargo bench --bench protocol_bench`

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use binlog_follower::event::decoder::EventDecoder;
use binlog_follower::protocol::codec::{get_length_encoded_int, put_length_encoded_int};

const TYPE_LONG: u8 = 3;
const TYPE_VARCHAR: u8 = 15;

/// A realistic format-description event (5.5, no checksums).
fn format_description_event() -> Vec<u8> {
    let mut body = vec![4, 0];
    let mut version = [0u8; 50];
    version[..15].copy_from_slice(b"5.5.34-32.0-log");
    body.extend_from_slice(&version);
    body.extend_from_slice(&[0, 0, 0, 0]);
    body.push(19);
    body.extend_from_slice(&[
        56, 13, 0, 8, 0, 18, 0, 4, 4, 4, 4, 18, 0, 0, 84, 0, 4, 26, 8, 0, 0, 0, 8, 8, 8, 2, 0,
    ]);
    event(15, &body)
}

fn table_map_event() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[76, 0, 0, 0, 0, 0]);
    body.extend_from_slice(&[1, 0]);
    body.push(8);
    body.extend_from_slice(b"shard767\0");
    body.push(5);
    body.extend_from_slice(b"items\0");
    body.push(2);
    body.extend_from_slice(&[TYPE_LONG, TYPE_VARCHAR]);
    body.push(2);
    body.extend_from_slice(&255u16.to_le_bytes());
    body.push(0b10);
    event(19, &body)
}

/// A write-rows event carrying `rows` copies of an (int, varchar) image.
fn write_rows_event(rows: usize) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[76, 0, 0, 0, 0, 0]);
    body.extend_from_slice(&[1, 0]);
    body.push(2);
    body.push(0b11);
    for i in 0..rows {
        body.push(0b00);
        body.extend_from_slice(&(i as i32).to_le_bytes());
        body.push(11);
        body.extend_from_slice(b"hello world");
    }
    event(23, &body)
}

fn event(event_type: u8, body: &[u8]) -> Vec<u8> {
    let size = 19 + body.len();
    let mut b = Vec::with_capacity(size);
    b.extend_from_slice(&1_407_799_890u32.to_le_bytes());
    b.push(event_type);
    b.extend_from_slice(&0xF388u32.to_le_bytes());
    b.extend_from_slice(&(size as u32).to_le_bytes());
    b.extend_from_slice(&[0; 4]);
    b.extend_from_slice(&[0; 2]);
    b.extend_from_slice(body);
    b
}

fn bench_length_encoded_int(c: &mut Criterion) {
    let mut group = c.benchmark_group("length_encoded_int");
    for n in [250u64, 0xFFFF, 0xFF_FFFF, u64::MAX] {
        let encoded = put_length_encoded_int(n);
        group.bench_with_input(BenchmarkId::new("decode", n), &encoded, |b, encoded| {
            b.iter(|| get_length_encoded_int(black_box(encoded)).unwrap().value)
        });
    }
    group.finish();
}

fn bench_event_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_decode");

    for rows in [1usize, 10, 100] {
        let fde = Bytes::from(format_description_event());
        let map = Bytes::from(table_map_event());
        let rows_event = Bytes::from(write_rows_event(rows));
        group.throughput(Throughput::Bytes(rows_event.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("write_rows", rows),
            &rows_event,
            |b, rows_event| {
                b.iter_batched(
                    || {
                        let mut decoder = EventDecoder::new();
                        decoder.parse(fde.clone()).unwrap();
                        decoder.parse(map.clone()).unwrap();
                        decoder
                    },
                    |mut decoder| decoder.parse(black_box(rows_event.clone())).unwrap(),
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_length_encoded_int, bench_event_decode);
criterion_main!(benches);
