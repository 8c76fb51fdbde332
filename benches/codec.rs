//! Codec throughput for the packets a verifying client sends most.

use std::hint::black_box;

use botwall::protocol::frame::{decode_frame, encode_frame};
use botwall::protocol::packets::play::MovementFlags;
use botwall::protocol::packets::{Clientbound, KeepAlive, Serverbound, SetPlayerPosition};
use botwall::protocol::registry::PacketCodec;
use botwall::protocol::{Phase, ProtocolVersion};
use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, Criterion};

fn movement_frames(count: usize, codec: &PacketCodec) -> BytesMut {
    let mut out = BytesMut::new();
    let mut y = 1200.0;
    for _ in 0..count {
        y -= 0.0784;
        let body = codec
            .encode_serverbound(&Serverbound::SetPlayerPosition(SetPlayerPosition {
                x: 8.0,
                y,
                z: 8.0,
                flags: MovementFlags::on_ground(false),
            }))
            .unwrap();
        encode_frame(&mut out, &body);
    }
    out
}

fn decode_benchmark(c: &mut Criterion) {
    for version in [ProtocolVersion::V1_8, ProtocolVersion::V1_18_2, ProtocolVersion::LATEST] {
        let codec = PacketCodec::new(version, Phase::Game);
        let frames = movement_frames(64, &codec);
        c.bench_function(&format!("decode_movement_{}", version), |b| {
            b.iter(|| {
                let mut buf = frames.clone();
                while let Some(frame) = decode_frame(&mut buf).unwrap() {
                    black_box(codec.decode_serverbound(frame).unwrap());
                }
            })
        });
    }
}

fn encode_benchmark(c: &mut Criterion) {
    let codec = PacketCodec::new(ProtocolVersion::V1_18_2, Phase::Game);
    c.bench_function("encode_keep_alive", |b| {
        let packet = Clientbound::KeepAlive(KeepAlive { id: 0x1234_5678 });
        let mut out = BytesMut::with_capacity(4096);
        b.iter(|| {
            out.clear();
            let body = codec.encode_clientbound(&packet).unwrap();
            encode_frame(&mut out, &body);
            black_box(out.len())
        })
    });
}

criterion_group!(benches, decode_benchmark, encode_benchmark);
criterion_main!(benches);
