//! Benchmark tests for the decoder
//!
//! These benchmarks measure the synthesis filterbank, the bit reader and
//! full frame decoding on a synthetic Layer II stream.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use maponus_rs::bitstream::{BitReader, BitWriter};
use maponus_rs::synthesis::SynthesisFilter;
use maponus_rs::{Buffer16BitStereo, Decoder, DecoderConfig, FrameHeader};
use std::io::Cursor;

/// MPEG-1 Layer II, 192 kbps, 44.1 kHz, stereo
const HEADER: u32 = 0xFFFD_A004;

/// One frame with every subband of both channels allocated at 16 bits
fn busy_frame(seed: u32) -> Vec<u8> {
    let header = FrameHeader::parse(HEADER).unwrap();
    let table = header.allocation_table();
    let mut w = BitWriter::new();
    w.put_bits(HEADER, 32);

    // Only the low-band row has a 16-bit class at code 15
    let limit = 3;
    for sb in 0..table.sblimit {
        let (nbal, _) = table.band(sb).unwrap();
        let code = if sb < limit { 15 } else { 0 };
        w.put_bits(code, nbal);
        w.put_bits(code, nbal);
    }
    for _ in 0..2 * limit {
        w.put_bits(0, 2);
    }
    for _ in 0..2 * limit {
        w.put_bits(10, 6);
        w.put_bits(12, 6);
        w.put_bits(14, 6);
    }
    let mut state = seed;
    for _ in 0..12 {
        for _ in 0..limit * 2 * 3 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            w.put_bits(state >> 16, 16);
        }
    }
    w.pad_to(header.frame_length());
    w.finish()
}

fn benchmark_synthesis_pass(c: &mut Criterion) {
    let mut filter = SynthesisFilter::new();
    let mut input = [0.0f32; 32];
    for (i, s) in input.iter_mut().enumerate() {
        *s = ((i as f32) * 0.37).sin() * 0.5;
    }

    c.bench_function("synthesis_pass", |b| {
        b.iter(|| {
            filter.input_samples(black_box(&input));
            black_box(filter.calculate_pcm_samples());
        })
    });
}

fn benchmark_bit_reader(c: &mut Criterion) {
    let data = busy_frame(1);

    c.bench_function("bit_reader_fields", |b| {
        b.iter(|| {
            let mut reader = BitReader::new(Cursor::new(black_box(&data[..])));
            let mut sum = 0u32;
            for _ in 0..(data.len() * 8 / 13) {
                sum = sum.wrapping_add(reader.get_bits(13).unwrap());
            }
            black_box(sum);
        })
    });
}

fn benchmark_frame_decode(c: &mut Criterion) {
    let stream: Vec<u8> = (0..10).flat_map(busy_frame).collect();

    c.bench_function("decode_10_frames", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new(Cursor::new(black_box(&stream[..])));
            let mut buffer = Buffer16BitStereo::default();
            for _ in 0..10 {
                decoder.decode_frame(&mut buffer).unwrap();
            }
            black_box(buffer.drain_samples());
        })
    });
}

fn benchmark_config_validation(c: &mut Criterion) {
    let config = DecoderConfig::new();

    c.bench_function("config_validation", |b| {
        b.iter(|| {
            black_box(config.validate()).unwrap();
        })
    });
}

criterion_group!(
    benches,
    benchmark_synthesis_pass,
    benchmark_bit_reader,
    benchmark_frame_decode,
    benchmark_config_validation
);
criterion_main!(benches);
