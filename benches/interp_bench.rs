//! Benchmarks for armlite assembly, label lookup and execution

use armlite::interp::Interpreter;
use armlite::ir::{Assembler, LabelTable};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::io;

/// Sum 1..=n with a counted loop
fn loop_source(n: i64) -> String {
    format!(
        "mov x1, {}\n\
         mov x0, 0\n\
         top:\n\
         add x0, x0, x1\n\
         sub x1, x1, 1\n\
         cmp x1, 0\n\
         bgt top\n",
        n
    )
}

fn bench_interpreter(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter");

    for &n in &[10i64, 1_000, 100_000] {
        let program = Assembler::new().assemble(&loop_source(n)).unwrap();
        group.throughput(Throughput::Elements(n as u64 * 4 + 2));
        group.bench_function(format!("sum_loop_{}", n), |b| {
            let mut interp = Interpreter::with_output(1024, io::sink());
            b.iter(|| black_box(interp.execute(&program)))
        });
    }

    let calls = Assembler::new()
        .assemble(
            "mov x1, 1000\n\
             top:\n\
             call leaf\n\
             sub x1, x1, 1\n\
             cmp x1, 0\n\
             bne top\n\
             b end\n\
             leaf:\n\
             add x0, x0, 1\n\
             ret\n\
             end:\n",
        )
        .unwrap();
    group.bench_function("call_ret_1000", |b| {
        let mut interp = Interpreter::with_output(1024, io::sink());
        b.iter(|| black_box(interp.execute(&calls)))
    });

    group.finish();
}

fn bench_memory(c: &mut Criterion) {
    let program = Assembler::new()
        .assemble(
            "mov x1, 0\n\
             top:\n\
             store x1, x1, 8\n\
             load x2, 8, x1\n\
             add x1, x1, 8\n\
             cmp x1, 4096\n\
             blt top\n",
        )
        .unwrap();
    c.bench_function("store_load_4k", |b| {
        let mut interp = Interpreter::with_output(4096, io::sink());
        b.iter(|| black_box(interp.execute(&program)))
    });
}

fn bench_labels(c: &mut Criterion) {
    let mut group = c.benchmark_group("labels");
    let names: Vec<String> = (0..512).map(|i| format!("label_{}", i)).collect();

    for &buckets in &[1usize, 16, 64, 256] {
        let mut table = LabelTable::with_buckets(buckets);
        for (i, name) in names.iter().enumerate() {
            table.put(name.as_str(), i).unwrap();
        }
        group.bench_function(format!("get_512_in_{}_buckets", buckets), |b| {
            b.iter(|| {
                for name in &names {
                    black_box(table.get(name).ok());
                }
            })
        });
    }

    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let source: String = (0..50)
        .map(|i| loop_source(10).replace("top", &format!("top{}", i)))
        .collect();

    c.bench_function("assemble_50_loops", |b| {
        b.iter(|| black_box(Assembler::new().assemble(black_box(&source))))
    });
}

criterion_group!(
    benches,
    bench_interpreter,
    bench_memory,
    bench_labels,
    bench_assemble
);
criterion_main!(benches);
