mod common;

use std::collections::HashMap;

use proptest::prelude::*;
use serde_json::{Value, json};
use sheetlens::{CellValue, Reducer, Row, aggregate};

use common::{region_rows, row};

fn records_json(series: &sheetlens::Series) -> Value {
    Value::Array(series.to_records().into_iter().map(Value::Object).collect())
}

#[test]
fn sums_amount_per_region() {
    let series = aggregate(&region_rows(), "region", "amt", Reducer::Sum, None);
    assert_eq!(
        records_json(&series),
        json!([
            {"region": "East", "amt": 17},
            {"region": "West", "amt": 5}
        ])
    );
    assert_eq!(series.points[0].count, 2);
}

#[test]
fn count_reducer_reports_bucket_sizes() {
    let series = aggregate(&region_rows(), "region", "amt", Reducer::Count, None);
    let counts = series
        .points
        .iter()
        .map(|point| point.metric)
        .collect::<Vec<_>>();
    assert_eq!(counts, vec![Some(2.0), Some(1.0)]);
}

#[test]
fn numeric_groups_sort_numerically_before_text() {
    let rows = vec![
        row(&[("k", 10.into()), ("v", 1.into())]),
        row(&[("k", "beta".into()), ("v", 1.into())]),
        row(&[("k", 9.into()), ("v", 1.into())]),
        row(&[("k", "alpha".into()), ("v", 1.into())]),
    ];
    let series = aggregate(&rows, "k", "v", Reducer::Sum, None);
    let groups = series
        .points
        .iter()
        .map(|point| point.group.key_string())
        .collect::<Vec<_>>();
    assert_eq!(groups, vec!["9", "10", "alpha", "beta"]);
}

#[test]
fn text_groups_sort_ignoring_case() {
    let rows = ["banana", "Apple", "apple", "Cherry"]
        .into_iter()
        .map(|key| row(&[("fruit", key.into()), ("qty", 1.into())]))
        .collect::<Vec<_>>();
    let series = aggregate(&rows, "fruit", "qty", Reducer::Count, None);
    let groups = series
        .points
        .iter()
        .map(|point| point.group.key_string())
        .collect::<Vec<_>>();
    assert_eq!(groups, vec!["apple", "Apple", "banana", "Cherry"]);
}

#[test]
fn number_and_numeric_text_share_a_bucket() {
    let rows = vec![
        row(&[("k", 10.into()), ("v", 1.into())]),
        row(&[("k", "10".into()), ("v", 2.into())]),
    ];
    let series = aggregate(&rows, "k", "v", Reducer::Sum, None);
    assert_eq!(series.len(), 1);
    assert_eq!(series.points[0].metric, Some(3.0));
    assert_eq!(series.points[0].group, CellValue::Number(10.0));
}

#[test]
fn breakdown_sums_per_label_and_drops_metric() {
    let rows = vec![
        row(&[("region", "East".into()), ("product", "Widget".into()), ("amt", 10.into())]),
        row(&[("region", "East".into()), ("product", "Gadget".into()), ("amt", 7.into())]),
        row(&[("region", "East".into()), ("product", "Widget".into()), ("amt", 3.into())]),
        row(&[("region", "West".into()), ("amt", 5.into())]),
    ];
    let series = aggregate(&rows, "region", "amt", Reducer::Avg, Some("product"));
    assert_eq!(series.breakdown_labels(), vec!["Gadget", "N/A", "Widget"]);
    let east = &series.points[0];
    assert!(east.metric.is_none());
    assert_eq!(east.breakdown_value("Widget"), Some(13.0));
    assert_eq!(east.breakdown_value("Gadget"), Some(7.0));
    assert_eq!(
        records_json(&series),
        json!([
            {"region": "East", "Widget": 13, "Gadget": 7},
            {"region": "West", "N/A": 5}
        ])
    );
}

#[test]
fn unparseable_metrics_count_as_zero() {
    let rows = vec![
        row(&[("k", "a".into()), ("v", "n/a".into())]),
        row(&[("k", "a".into()), ("v", "4".into())]),
        row(&[("k", "a".into()), ("v", true.into())]),
    ];
    let series = aggregate(&rows, "k", "v", Reducer::Sum, None);
    assert_eq!(series.points[0].metric, Some(5.0));
    let avg = aggregate(&rows, "k", "v", Reducer::Avg, None);
    assert_eq!(avg.points[0].metric, Some(5.0 / 3.0));
}

#[test]
fn empty_input_yields_empty_series() {
    let series = aggregate(&[], "region", "amt", Reducer::Sum, None);
    assert!(series.is_empty());
    assert!(series.to_records().is_empty());
}

fn rows_strategy() -> impl Strategy<Value = Vec<Row>> {
    let key = prop_oneof![
        Just(CellValue::Absent),
        (0i32..4).prop_map(CellValue::from),
        "[xyz]".prop_map(CellValue::from),
    ];
    prop::collection::vec(
        (key, -100i32..100).prop_map(|(k, v)| Row::new().with("k", k).with("v", v)),
        0..60,
    )
}

proptest! {
    #[test]
    fn buckets_partition_keyed_rows(rows in rows_strategy()) {
        let series = aggregate(&rows, "k", "v", Reducer::Count, None);
        let keyed = rows.iter().filter(|row| !row.get("k").is_absent()).count();
        let total: usize = series.points.iter().map(|point| point.count).sum();
        prop_assert_eq!(total, keyed);

        let mut expected: HashMap<String, usize> = HashMap::new();
        for row in rows.iter().filter(|row| !row.get("k").is_absent()) {
            *expected.entry(row.get("k").key_string()).or_default() += 1;
        }
        prop_assert_eq!(series.len(), expected.len());
        for point in &series.points {
            prop_assert_eq!(point.metric, Some(point.count as f64));
            prop_assert_eq!(Some(&point.count), expected.get(&point.group.key_string()));
        }
    }

    #[test]
    fn points_are_sorted_by_group(rows in rows_strategy()) {
        let series = aggregate(&rows, "k", "v", Reducer::Sum, None);
        for pair in series.points.windows(2) {
            prop_assert!(pair[0].group.axis_cmp(&pair[1].group).is_le());
        }
    }
}
