use formula_summarize::{
    summarize_cartesian, CancellationToken, CartesianDomains, FieldValue, Filter,
    SummarizeColumns, SummarizeError, SummarizeOptions, SummarizeResult,
};
use pretty_assertions::assert_eq;
use std::cell::Cell;

type Key = (String, String);

struct Sale {
    product: &'static str,
    category: &'static str,
    amount: i64,
}

fn sales() -> Vec<Sale> {
    vec![
        Sale { product: "P1", category: "C1", amount: 10 },
        Sale { product: "P1", category: "C2", amount: 20 },
        Sale { product: "P2", category: "C1", amount: 5 },
        Sale { product: "P3", category: "C3", amount: 15 },
    ]
}

fn sale_key(sale: &Sale) -> Key {
    (sale.product.to_string(), sale.category.to_string())
}

fn key(product: &str, category: &str) -> Key {
    (product.to_string(), category.to_string())
}

fn total(rows: &[&Sale], _: &Key) -> Option<i64> {
    Some(rows.iter().map(|sale| sale.amount).sum())
}

#[test]
fn every_combination_is_evaluated_before_truncation() {
    let sales = sales();
    let evaluated = Cell::new(0);
    let out: Vec<(Key, i64)> = summarize_cartesian(
        &sales,
        sale_key,
        Filter::groups(|_: &[&Sale], _: &Key| true),
        |rows: &[&Sale], key: &Key| {
            evaluated.set(evaluated.get() + 1);
            total(rows, key)
        },
        None,
    )
    .unwrap()
    .collect::<SummarizeResult<_>>()
    .unwrap();

    assert_eq!(evaluated.get(), 9);
    assert_eq!(
        out,
        vec![
            (key("P1", "C1"), 10),
            (key("P1", "C2"), 20),
            (key("P1", "C3"), 0),
            (key("P2", "C1"), 5),
            (key("P2", "C2"), 0),
            (key("P2", "C3"), 0),
            (key("P3", "C1"), 0),
            (key("P3", "C2"), 0),
            (key("P3", "C3"), 15),
        ]
    );
}

#[test]
fn max_count_truncates_the_product() {
    let sales = sales();
    let evaluated = Cell::new(0);
    let out: Vec<(Key, i64)> = summarize_cartesian(
        &sales,
        sale_key,
        Filter::none(),
        |rows: &[&Sale], key: &Key| {
            evaluated.set(evaluated.get() + 1);
            total(rows, key)
        },
        Some(6),
    )
    .unwrap()
    .collect::<SummarizeResult<_>>()
    .unwrap();

    assert_eq!(out.len(), 6);
    assert_eq!(out[5], (key("P2", "C3"), 0));
    // The window is capped by max_count, so the remaining keys are never scanned.
    assert_eq!(evaluated.get(), 6);
}

#[test]
fn combined_filter_drops_holes_by_key() {
    let sales = sales();
    let filter = Filter::combined(|row: Option<&Sale>, key: Option<&Key>| {
        row.is_some_and(|sale| sale.category != "C1") || key.is_some_and(|key| key.1 != "C1")
    });
    let out: Vec<(Key, i64)> = summarize_cartesian(&sales, sale_key, filter, total, None)
        .unwrap()
        .collect::<SummarizeResult<_>>()
        .unwrap();
    assert_eq!(out.len(), 6);
    assert!(out.iter().all(|(key, _)| key.1 != "C1"));
}

#[test]
fn domain_overrides_replace_observed_values() {
    let sales = sales();
    let domains = CartesianDomains::new()
        .with_domain("0", ["P3", "P9"])
        .with_domain("1", ["C3", "C1"]);
    let out: Vec<(Key, i64)> = SummarizeColumns::new(&sales, sale_key)
        .cartesian_with(domains)
        .evaluate(total)
        .unwrap()
        .collect::<SummarizeResult<_>>()
        .unwrap();
    assert_eq!(
        out,
        vec![
            (key("P3", "C3"), 15),
            (key("P3", "C1"), 0),
            (key("P9", "C3"), 0),
            (key("P9", "C1"), 0),
        ]
    );
}

#[test]
fn empty_override_is_an_error() {
    let sales = sales();
    let mut out = SummarizeColumns::new(&sales, sale_key)
        .cartesian_with(CartesianDomains::new().with_domain("1", Vec::<FieldValue>::new()))
        .evaluate(total)
        .unwrap();
    assert_eq!(
        out.next(),
        Some(Err(SummarizeError::EmptyDomain {
            field: "1".to_string()
        }))
    );
    assert_eq!(out.next(), None);
}

#[test]
fn unknown_override_field_is_an_error() {
    let sales = sales();
    let result: SummarizeResult<Vec<(Key, i64)>> = SummarizeColumns::new(&sales, sale_key)
        .cartesian_with(CartesianDomains::new().with_domain("region", ["EU"]))
        .evaluate(total)
        .unwrap()
        .collect();
    assert_eq!(
        result,
        Err(SummarizeError::UnknownField {
            field: "region".to_string()
        })
    );
}

#[test]
fn no_rows_means_no_candidates() {
    let sales: Vec<Sale> = Vec::new();
    let out: Vec<(Key, i64)> = summarize_cartesian(&sales, sale_key, Filter::none(), total, None)
        .unwrap()
        .collect::<SummarizeResult<_>>()
        .unwrap();
    assert!(out.is_empty());
}

#[test]
fn small_windows_do_not_change_the_result() {
    let sales = sales();
    let run = |window: usize| -> Vec<(Key, i64)> {
        SummarizeColumns::new(&sales, sale_key)
            .cartesian()
            .options(SummarizeOptions::default().with_window_size(window))
            .evaluate(total)
            .unwrap()
            .collect::<SummarizeResult<_>>()
            .unwrap()
    };
    let whole = run(1_000);
    assert_eq!(whole.len(), 9);
    for window in [1, 2, 4, 8] {
        assert_eq!(run(window), whole, "window = {window}");
    }
}

#[test]
fn equivalent_override_values_build_one_key() {
    let rows = [("P1", 1u32)];
    let out: Vec<((String, u32), usize)> =
        SummarizeColumns::new(&rows, |row: &(&str, u32)| (row.0.to_string(), row.1))
            .cartesian_with(
                CartesianDomains::new()
                    .with_domain("1", [FieldValue::UInt(1), FieldValue::Int(1)]),
            )
            .evaluate(|rows: &[&(&str, u32)], _: &(String, u32)| Some(rows.len()))
            .unwrap()
            .collect::<SummarizeResult<_>>()
            .unwrap();
    assert_eq!(out, vec![(("P1".to_string(), 1), 1)]);
}

#[test]
fn override_values_of_the_wrong_type_are_an_error() {
    let sales = sales();
    let mut out = SummarizeColumns::new(&sales, sale_key)
        .cartesian_with(CartesianDomains::new().with_domain("1", [7i64]))
        .evaluate(total)
        .unwrap();
    assert!(matches!(out.next(), Some(Err(SummarizeError::FieldType { .. }))));
    assert!(out.next().is_none());
}

#[test]
fn zero_field_keys_still_validate_overrides() {
    let rows = [1u32, 2];
    let mut out = SummarizeColumns::new(&rows, |_: &u32| ())
        .cartesian_with(CartesianDomains::new().with_domain("nope", Vec::<i64>::new()))
        .evaluate(|rows: &[&u32], _: &()| Some(rows.len()))
        .unwrap();
    assert_eq!(
        out.next(),
        Some(Err(SummarizeError::UnknownField {
            field: "nope".to_string()
        }))
    );
    assert_eq!(out.next(), None);

    let plain: Vec<((), usize)> = SummarizeColumns::new(&rows, |_: &u32| ())
        .cartesian()
        .evaluate(|rows: &[&u32], _: &()| Some(rows.len()))
        .unwrap()
        .collect::<SummarizeResult<_>>()
        .unwrap();
    assert_eq!(plain, vec![((), 2)]);
}

#[test]
fn cancelled_before_the_first_pull() {
    let sales = sales();
    let token = CancellationToken::new();
    token.cancel();
    let evaluated = Cell::new(0);
    let mut out = SummarizeColumns::new(&sales, sale_key)
        .cartesian()
        .options(SummarizeOptions::default().with_cancellation(token))
        .evaluate(|rows: &[&Sale], key: &Key| {
            evaluated.set(evaluated.get() + 1);
            total(rows, key)
        })
        .unwrap();
    assert_eq!(out.next(), Some(Err(SummarizeError::Cancelled)));
    assert_eq!(out.next(), None);
    assert_eq!(evaluated.get(), 0);
}
