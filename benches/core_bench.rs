//! Benchmarks for kiln core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kiln::core::{assembler, hasher, parser, synth, types::LogicalId};

const STACK_YAML: &str = r#"
version: "1.0"
stack: BenchStack
source:
  owner: acme
  repo: images
infrastructure:
  subnet_id: subnet-0abc
  security_group_ids: [sg-0abc]
recipe:
  parent_image: arn:aws:imagebuilder:us-west-2:aws:image/amazon-linux-2-x86/x.x.x
  base_components:
    - arn:aws:imagebuilder:us-west-2:aws:component/amazon-linux-2-base-amazon-linux-2/
"#;

fn bench_logical_id(c: &mut Criterion) {
    c.bench_function("logical_id_derive", |b| {
        b.iter(|| LogicalId::derive(black_box("BenchStack"), black_box("BuildArtifactsBucket")));
    });
}

fn bench_asset_hash(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();

    let mut group = c.benchmark_group("asset_hash");
    for size_kb in [1, 64, 1024] {
        let path = dir.path().join(format!("bench_{size_kb}k.yml"));
        std::fs::write(&path, vec![b'x'; size_kb * 1024]).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size_kb), &path, |b, path| {
            b.iter(|| hasher::hash_file(black_box(path)).unwrap());
        });
    }
    group.finish();
}

fn bench_assemble_and_render(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let components = dir.path().join("imagebuilder_components");
    std::fs::create_dir_all(&components).unwrap();
    std::fs::write(components.join("install_nginx.yml"), "name: InstallNginx\n").unwrap();
    let config = parser::parse_config(STACK_YAML).unwrap();

    c.bench_function("assemble", |b| {
        b.iter(|| assembler::assemble(black_box(&config), dir.path()).unwrap());
    });

    let stack = assembler::assemble(&config, dir.path()).unwrap();
    c.bench_function("render_template", |b| {
        b.iter(|| synth::render_template(black_box(&stack)));
    });
    c.bench_function("execution_order", |b| {
        b.iter(|| black_box(&stack).graph().execution_order());
    });
}

criterion_group!(
    benches,
    bench_logical_id,
    bench_asset_hash,
    bench_assemble_and_render
);
criterion_main!(benches);
