use cloudwatch_bridge::{EmfTransport, MetricSample, MetricsTransport};
use criterion::{criterion_group, criterion_main, Criterion};

fn criterion_benchmark(c: &mut Criterion) {
    let transport = EmfTransport::new(std::io::sink());
    let sample = MetricSample {
        namespace: "MyApplication".to_string(),
        dimension_name: "Function".to_string(),
        dimension_value: "My_Function_Name".to_string(),
        metric_name: "requests".to_string(),
        value: 1.0,
        unit: Some(metrics::Unit::Count),
    };

    c.bench_function("emf_put_metric", |b| {
        b.iter(|| futures::executor::block_on(transport.put_metric(sample.clone())))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
