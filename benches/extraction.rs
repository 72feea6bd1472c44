use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ev_registrations::constants::layout;
use ev_registrations::{BevClassifier, RecordExtractor};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const FUELS: &[&str] = &["BEV", "GASOLINA", "DIESEL", "PHEV", "HEV", "BATTERY ELECTRIC"];

fn pad(value: &str, width: usize) -> String {
    format!("{:<width$}", value, width = width)
}

fn daily_file(dir: &TempDir, lines: usize) -> PathBuf {
    let mut content = String::new();
    for i in 0..lines {
        content.push_str(&pad("", layout::MAKE.start));
        content.push_str(&pad("TESLA", layout::MAKE.len()));
        content.push_str(&pad("MODEL 3", layout::MODEL.len()));
        content.push_str(&pad(&format!("VIN{:014}", i), layout::VIN.len()));
        content.push_str(&pad("", layout::FUEL.start - layout::VIN.end));
        content.push_str(&pad(FUELS[i % FUELS.len()], layout::FUEL.len()));
        content.push('\n');
    }
    let path = dir.path().join("export_mat_20250201.txt");
    fs::write(&path, content).unwrap();
    path
}

fn bench_extraction(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let extractor = RecordExtractor::default();
    let mut group = c.benchmark_group("extract_file");

    for lines in [1_000, 10_000, 50_000] {
        let path = daily_file(&temp_dir, lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &path, |b, path| {
            b.iter(|| extractor.extract_file(black_box(path)).unwrap())
        });
    }
    group.finish();
}

fn bench_classification(c: &mut Criterion) {
    let classifier = BevClassifier::new();

    c.bench_function("classify_descriptor", |b| {
        b.iter(|| {
            for fuel in FUELS {
                black_box(classifier.classify_descriptor(black_box(fuel), &["MODEL 3"]));
            }
        })
    });
}

criterion_group!(benches, bench_extraction, bench_classification);
criterion_main!(benches);
