use chaindb::{Condition, Dialect, Fields, Limit, WhereClause, WherePredicate, compile};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// `n` equality clauses plus one IN list of `n` values.
fn build_condition(n: usize) -> Condition {
    let mut clauses: Vec<WhereClause> = (0..n)
        .map(|i| WhereClause::eq(format!("col{i}"), i as i64))
        .collect();
    clauses.push(WhereClause::in_list("id", (0..n as i64).collect::<Vec<_>>()));

    let mut cond = Condition::for_table("t");
    cond.set_where(clauses)
        .set_order_by("id DESC")
        .set_limit(Limit::Pair(11, 20))
        .set_primary_key("id");
    cond
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/select");
    let dialects = [
        ("mysql", Dialect::mysql()),
        ("postgres", Dialect::postgres()),
        ("sqlserver", Dialect::sqlserver()),
    ];

    for n in [1, 10, 100] {
        let cond = build_condition(n);
        for (name, dialect) in &dialects {
            group.bench_with_input(BenchmarkId::new(*name, n), &cond, |b, cond| {
                b.iter(|| black_box(compile::select(cond, dialect, &Fields::All)));
            });
        }
    }

    group.finish();
}

fn bench_json_where(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/json_where");

    for n in [1, 10, 100] {
        let doc = serde_json::Value::Array(
            (0..n)
                .map(|i| serde_json::json!([format!("col{i}"), "OR", ">=", i]))
                .collect(),
        );
        group.bench_with_input(BenchmarkId::from_parameter(n), &doc, |b, doc| {
            b.iter(|| {
                let pred = WherePredicate::from_json(doc.clone());
                black_box(pred.map(|p| compile::compile_where(&p, &Dialect::postgres())))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select, bench_json_where);
criterion_main!(benches);
