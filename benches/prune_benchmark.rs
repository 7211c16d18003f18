use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use css_pruner::{
    combine_media_queries, extract_usage, extract_usage_parallel, purge, segment, Pruner, PurgeArgs,
    SegmentOptions, SourceDocument, UsageSet,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Stylesheet with `rules` used rules, as many unused ones and a media
/// query every tenth rule spread over four breakpoints
fn generate_stylesheet(rules: usize) -> String {
    let mut css = String::from("/* bench */\n:root { --brand: #123456; }\n");
    for i in 0..rules {
        css.push_str(&format!(".used-{} {{ padding: {}px; }}\n", i % 100, i));
        css.push_str(&format!(".unused-{} > .child {{ margin: {}px; }}\n", i, i));
        if i % 10 == 0 {
            css.push_str(&format!(
                "@media screen and (max-width: {}px) {{ .used-{} {{ display: none; }} }}\n",
                320 + (i % 4) * 160,
                i % 100
            ));
        }
    }
    css.push_str("@keyframes spin { from { opacity: 0; } to { opacity: 1; } }\n");
    css
}

fn generate_documents(count: usize) -> Vec<SourceDocument> {
    (0..count)
        .map(|i| {
            let content = format!(
                r#"
                export const Component{i} = ({{ open }}) => (
                    <div id="panel-{i}" className={{open ? "used-{a} open" : "used-{b}"}}>
                        <input type="text" className="used-{c} field" />
                        <span className="label">Content {i}</span>
                    </div>
                );
                "#,
                i = i,
                a = i % 100,
                b = (i + 1) % 100,
                c = (i + 2) % 100
            );
            SourceDocument::new(format!("component_{}.jsx", i), content)
        })
        .collect()
}

fn usage() -> UsageSet {
    UsageSet::with_classes((0..100).map(|i| format!("used-{}", i)))
}

fn benchmark_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");

    for rules in [100, 1_000, 10_000].iter() {
        let css = generate_stylesheet(*rules);
        group.bench_with_input(BenchmarkId::new("rules", rules), &css, |b, css| {
            b.iter(|| segment(black_box(css), &SegmentOptions::default()))
        });
    }

    group.finish();
}

fn benchmark_purge(c: &mut Criterion) {
    let mut group = c.benchmark_group("purge");
    let pruner = Pruner::default();
    let usage = usage();

    for rules in [100, 1_000, 10_000].iter() {
        let css = generate_stylesheet(*rules);
        group.bench_with_input(BenchmarkId::new("rules", rules), &css, |b, css| {
            b.iter(|| pruner.purge(black_box(css), &usage))
        });
    }

    group.finish();
}

fn benchmark_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine_media");

    for rules in [1_000, 10_000].iter() {
        let blocks = segment(&generate_stylesheet(*rules), &SegmentOptions::default());
        group.bench_with_input(BenchmarkId::new("rules", rules), &blocks, |b, blocks| {
            b.iter(|| combine_media_queries(black_box(blocks)))
        });
    }

    group.finish();
}

fn benchmark_usage_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("usage_extraction");
    group.sample_size(20);

    for count in [10, 100, 1_000].iter() {
        let documents = generate_documents(*count);
        group.bench_with_input(BenchmarkId::new("sequential", count), &documents, |b, docs| {
            b.iter(|| extract_usage(black_box(docs)))
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &documents, |b, docs| {
            b.iter(|| extract_usage_parallel(black_box(docs)))
        });
    }

    group.finish();
}

fn write_project(dir: &Path, files: usize) {
    fs::write(dir.join("app.css"), generate_stylesheet(2_000)).unwrap();
    for document in generate_documents(files) {
        fs::write(dir.join(&document.path), &document.content).unwrap();
    }
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    group.sample_size(10);

    for threads in [1, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("threads", threads), threads, |b, &threads| {
            b.iter_with_setup(
                || {
                    let temp_dir = TempDir::new().unwrap();
                    write_project(temp_dir.path(), 200);

                    let args = PurgeArgs {
                        input: vec![format!("{}/*.css", temp_dir.path().display())],
                        sources: vec![format!("{}/*.jsx", temp_dir.path().display())],
                        output: None,
                        report: None,
                        config: None,
                        exclude: vec![],
                        tailwind: false,
                        combine_media: true,
                        minify: false,
                        dry_run: true, // Don't write files in benchmarks
                        verbose: true,
                        jobs: Some(threads),
                    };
                    (temp_dir, args)
                },
                |(temp_dir, args)| {
                    let rt = tokio::runtime::Runtime::new().unwrap();
                    rt.block_on(async { purge(args).await.unwrap() });
                    black_box(temp_dir); // Keep temp_dir alive
                },
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_segmentation,
    benchmark_purge,
    benchmark_combine,
    benchmark_usage_extraction,
    benchmark_end_to_end
);
criterion_main!(benches);
