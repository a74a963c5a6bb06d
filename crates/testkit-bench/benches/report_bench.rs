//! Cost of formatting crash report lines into the fixed buffer.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use testkit_core::FatalSignal;
use testkit_core::config::{ALT_STACK_SIZE, LINE_CAPACITY};
use testkit_core::report::{self, LineBuf};
use testkit_core::signal::FATAL_SIGNALS;

fn bench_lines(c: &mut Criterion) {
    let mut line = LineBuf::<LINE_CAPACITY>::new();

    c.bench_function("report_header", |b| {
        b.iter(|| {
            report::header(&mut line, black_box(FatalSignal::Segv.signum()));
            black_box(line.len())
        });
    });
    c.bench_function("report_fault", |b| {
        b.iter(|| {
            report::fault(&mut line, black_box(0xdead_beef), black_box(1));
            black_box(line.len())
        });
    });
    c.bench_function("report_banner", |b| {
        b.iter(|| {
            report::install_banner(&mut line, black_box(&FATAL_SIGNALS), ALT_STACK_SIZE);
            black_box(line.len())
        });
    });
}

criterion_group!(benches, bench_lines);
criterion_main!(benches);
