use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chrono::{DateTime, Duration, TimeZone, Utc};
use homekeep_core::grouping::{dedupe_by_occurrence_key, group_by_key};
use homekeep_core::models::{RecurrenceType, Task};
use homekeep_core::projection::OccurrenceProjector;
use homekeep_core::recurrence::next_due_date;
use std::collections::HashSet;

const RULES: [RecurrenceType; 4] = [
    RecurrenceType::Weekly,
    RecurrenceType::Monthly,
    RecurrenceType::Quarterly,
    RecurrenceType::Yearly,
];

fn base_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn create_templates(count: usize) -> Vec<Task> {
    let mut rng = fastrand::Rng::with_seed(7);
    (0..count)
        .map(|i| {
            let rule = RULES[rng.usize(..RULES.len())];
            Task {
                title: format!("Chore {}", i % 25),
                is_recurring: true,
                recurrence_type: Some(rule),
                next_due_date: base_date() + Duration::days(rng.i64(0..60)),
                ..Default::default()
            }
        })
        .collect()
}

fn bench_next_due_date(c: &mut Criterion) {
    let anchor = Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap();
    let mut group = c.benchmark_group("next_due_date");
    for rule in RULES {
        group.bench_with_input(BenchmarkId::from_parameter(rule), &rule, |b, rule| {
            b.iter(|| next_due_date(black_box(*rule), black_box(anchor)).unwrap())
        });
    }
    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let projector = OccurrenceProjector::default();
    let horizon = base_date() + Duration::days(365);
    let existing = HashSet::new();

    let mut group = c.benchmark_group("project_virtual_occurrences");
    for count in [10usize, 100, 1000] {
        let templates = create_templates(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &templates, |b, templates| {
            b.iter(|| {
                projector
                    .project_virtual_occurrences(black_box(templates), horizon, &existing)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let templates = create_templates(200);
    let occurrences = OccurrenceProjector::default()
        .project_virtual_occurrences(&templates, base_date() + Duration::days(180), &HashSet::new())
        .unwrap();

    c.bench_function("dedupe_and_group", |b| {
        b.iter(|| group_by_key(dedupe_by_occurrence_key(black_box(occurrences.clone()))))
    });
}

criterion_group!(benches, bench_next_due_date, bench_projection, bench_grouping);
criterion_main!(benches);
