// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multipart Boundary Scan Benchmark
//!
//! Measures delimiter search over attachment-sized bodies:
//! - one-shot search with `find_delimiter`
//! - streaming `MultipartReader` over a full three-part body
//!
//! Payloads are filled with near-miss prefixes (`\r\n--MIM`) so the
//! matcher exercises its failure function rather than skipping ahead.

#![allow(clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dpws::mime::{find_delimiter, MultipartReader};
use std::hint::black_box as bb;
use std::io::{Cursor, Read};

const BOUNDARY: &str = "MIMEBoundary_4f2a9c";

fn noisy_payload(size: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(size);
    let near_miss = b"\r\n--MIM";
    while payload.len() < size {
        payload.extend_from_slice(near_miss);
        payload.extend_from_slice(&[0xAB; 56]);
    }
    payload.truncate(size);
    payload
}

fn multipart_body(part_size: usize) -> Vec<u8> {
    let mut body = Vec::new();
    for i in 0..3 {
        body.extend_from_slice(format!("\r\n--{}\r\nContent-ID: <p{}>\r\n\r\n", BOUNDARY, i).as_bytes());
        body.extend_from_slice(&noisy_payload(part_size));
    }
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// One-shot search for a delimiter at the end of a payload
fn bench_find_delimiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_delimiter");
    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let mut haystack = noisy_payload(size);
        haystack.extend_from_slice(format!("\r\n--{}", BOUNDARY).as_bytes());
        group.throughput(Throughput::Bytes(haystack.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &haystack, |b, h| {
            b.iter(|| bb(find_delimiter(bb(h), BOUNDARY)));
        });
    }
    group.finish();
}

/// Streaming reader over a three-part body, every part read to the end
fn bench_multipart_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("multipart_reader");
    for part_size in [4 * 1024usize, 256 * 1024] {
        let body = multipart_body(part_size);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(part_size), &body, |b, body| {
            b.iter(|| {
                let mut reader = MultipartReader::new(Cursor::new(body.as_slice()), BOUNDARY)
                    .expect("valid body");
                let mut total = 0usize;
                let mut buf = Vec::with_capacity(part_size);
                loop {
                    buf.clear();
                    reader
                        .part()
                        .expect("current part")
                        .read_to_end(&mut buf)
                        .expect("read part");
                    total += buf.len();
                    if !reader.advance_to_next_part().expect("advance") {
                        break;
                    }
                }
                bb(total)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_delimiter, bench_multipart_reader);
criterion_main!(benches);
