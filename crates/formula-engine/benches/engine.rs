use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use formula_engine::{Formula, Sheet};
use formula_model::{Point, MAX_GRID_SIZE};

fn nested_formula(depth: usize) -> String {
    let mut text = String::from("=");
    text.push_str(&"(".repeat(depth));
    text.push('1');
    text.push_str(&"+1)".repeat(depth));
    text
}

/// A1 holds a value; every later row adds one to the row above.
fn chain_sheet(rows: u32) -> Sheet {
    let mut sheet = Sheet::new();
    sheet.suspend_recalc();
    sheet.set_value_cell(Point::new(0, 0), 1.0).unwrap();
    for y in 1..rows {
        sheet
            .set_formula_cell(Point::new(0, y), &format!("=A{}+1", y))
            .unwrap();
    }
    sheet.resume_recalc().unwrap();
    sheet
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for depth in [100usize, 10_000] {
        let text = nested_formula(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &text, |b, text| {
            b.iter(|| Formula::parse(black_box(text), Point::new(0, 0), MAX_GRID_SIZE));
        });
    }
    group.finish();
}

fn bench_recalc(c: &mut Criterion) {
    let mut group = c.benchmark_group("recalc_chain");
    group.sample_size(20);
    for rows in [1_000u32, 10_000] {
        let mut sheet = chain_sheet(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| {
                sheet.set_value_cell(Point::new(0, 0), 2.0).unwrap();
                black_box(sheet.get_value(Point::new(0, rows - 1)))
            });
        });
    }
    group.finish();
}

fn bench_insert_rows(c: &mut Criterion) {
    let mut sheet = chain_sheet(5_000);
    c.bench_function("insert_delete_rows", |b| {
        b.iter(|| {
            sheet.insert_rows(black_box(2_500), 10).unwrap();
            sheet.delete_rows(2_500, 10).unwrap();
        });
    });
}

criterion_group!(benches, bench_parse, bench_recalc, bench_insert_rows);
criterion_main!(benches);
