use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hyper::{HeaderMap, Method};
use mokksy::mapping::{MappingOptions, MappingRegistry, Responder};
use mokksy::{CapturedRequest, RequestSpecification, ResponseDefinition};
use serde_json::json;
use std::sync::Arc;

fn responder() -> Responder {
    Arc::new(|_: &CapturedRequest| ResponseDefinition::ok())
}

fn registry_with(count: usize, regex: bool) -> MappingRegistry {
    let registry = MappingRegistry::new();
    for i in 0..count {
        let builder = RequestSpecification::builder().post();
        let builder = if regex {
            builder.path_matching(&format!(r"^/api/v\d+/endpoint{i}$"))
        } else {
            builder.path(&format!("/api/v1/endpoint{i}"))
        };
        let spec = builder.build().unwrap();
        registry.register(spec, MappingOptions::default(), responder());
    }
    registry
}

fn request(path: &str) -> CapturedRequest {
    CapturedRequest::new(
        Method::POST,
        path.parse().unwrap(),
        HeaderMap::new(),
        Bytes::new(),
    )
}

fn bench_find_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_match");

    for count in [10, 100, 1000].iter() {
        let registry = registry_with(*count, false);
        let first = request("/api/v1/endpoint0");
        let last = request(&format!("/api/v1/endpoint{}", count - 1));
        let miss = request("/api/v1/missing");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("first", count), count, |b, _| {
            b.iter(|| registry.find_match(black_box(&first)));
        });
        group.bench_with_input(BenchmarkId::new("last", count), count, |b, _| {
            b.iter(|| registry.find_match(black_box(&last)));
        });
        group.bench_with_input(BenchmarkId::new("miss", count), count, |b, _| {
            b.iter(|| registry.find_match(black_box(&miss)));
        });
    }

    group.finish();
}

fn bench_regex_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_paths");

    for count in [10, 100].iter() {
        let registry = registry_with(*count, true);
        let last = request(&format!("/api/v2/endpoint{}", count - 1));

        group.bench_with_input(BenchmarkId::new("last", count), count, |b, _| {
            b.iter(|| registry.find_match(black_box(&last)));
        });
    }

    group.finish();
}

fn bench_json_body(c: &mut Criterion) {
    let spec = RequestSpecification::builder()
        .post()
        .path("/v1/chat/completions")
        .json_field("model", "gpt")
        .json_field("stream", true)
        .build()
        .unwrap();
    let body = json!({"model": "gpt", "stream": true, "messages": [{"role": "user", "content": "hi"}]});

    c.bench_function("json_body_match", |b| {
        b.iter(|| {
            // Fresh request each time so the parsed body is not memoised.
            let request = CapturedRequest::new(
                Method::POST,
                "/v1/chat/completions".parse().unwrap(),
                HeaderMap::new(),
                Bytes::from(body.to_string()),
            );
            spec.matches(black_box(&request))
        });
    });
}

fn bench_closest_candidates(c: &mut Criterion) {
    let registry = registry_with(100, false);
    let miss = request("/api/v1/missing");

    c.bench_function("closest_candidates_100", |b| {
        b.iter(|| registry.closest_candidates(black_box(&miss), 3));
    });
}

criterion_group!(
    benches,
    bench_find_match,
    bench_regex_paths,
    bench_json_body,
    bench_closest_candidates
);
criterion_main!(benches);
