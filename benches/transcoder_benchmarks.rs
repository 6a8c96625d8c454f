//! Performance benchmarks for the audio path
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use voice_bridge::core::audio::{Transcoder, decode_base64, encode_base64};
use voice_bridge::core::telephony::InboundMessage;

/// 20 ms of telephony audio
const FRAME_MS: usize = 20;

fn mulaw_frame(ms: usize) -> Vec<u8> {
    (0..8 * ms).map(|i| (i % 256) as u8).collect()
}

fn pcm_frame(rate: u32, ms: usize) -> Vec<u8> {
    let samples = rate as usize / 1000 * ms;
    (0..samples)
        .flat_map(|i| (((i as f32 * 0.05).sin() * 8000.0) as i16).to_le_bytes())
        .collect()
}

/// Benchmark μ-law to wideband PCM16 (caller audio)
fn bench_narrowband_to_wideband(c: &mut Criterion) {
    let mut group = c.benchmark_group("narrowband_to_wideband");
    group.measurement_time(Duration::from_secs(5));

    for rate in [16_000u32, 24_000] {
        let transcoder = Transcoder::new(rate).unwrap();
        let frame = mulaw_frame(FRAME_MS);

        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("20ms", rate), &frame, |b, frame| {
            b.iter(|| transcoder.narrowband_to_wideband(black_box(frame)));
        });
    }

    group.finish();
}

/// Benchmark wideband PCM16 to μ-law (synthesized audio)
fn bench_wideband_to_narrowband(c: &mut Criterion) {
    let mut group = c.benchmark_group("wideband_to_narrowband");
    group.measurement_time(Duration::from_secs(5));

    for rate in [16_000u32, 24_000] {
        let transcoder = Transcoder::new(rate).unwrap();
        for ms in [FRAME_MS, 200] {
            let frame = pcm_frame(rate, ms);
            group.throughput(Throughput::Bytes(frame.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("{ms}ms"), rate),
                &frame,
                |b, frame| {
                    b.iter(|| transcoder.wideband_to_narrowband(black_box(frame)));
                },
            );
        }
    }

    group.finish();
}

/// Benchmark the full inbound frame path: envelope parse, base64, transcode
fn bench_inbound_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("inbound_frame");

    let transcoder = Transcoder::default();
    let payload = encode_base64(&mulaw_frame(FRAME_MS));
    let envelope = format!(
        r#"{{"event":"media","streamSid":"MZ1","media":{{"track":"inbound","chunk":"42","timestamp":"840","payload":"{payload}"}}}}"#
    );

    group.throughput(Throughput::Bytes(envelope.len() as u64));
    group.bench_function("parse_decode_transcode", |b| {
        b.iter(|| {
            if let Ok(InboundMessage::Media { media, .. }) =
                serde_json::from_str::<InboundMessage>(black_box(&envelope))
                && let Ok(mulaw) = decode_base64(&media.payload)
            {
                black_box(transcoder.narrowband_to_wideband(&mulaw));
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_narrowband_to_wideband,
    bench_wideband_to_narrowband,
    bench_inbound_frame,
);

criterion_main!(benches);
