mod common;

use proptest::prelude::*;
use sheetlens::{CellValue, ColumnType, Row, profile_rows};

use common::{region_rows, row};

#[test]
fn amount_column_profiles_as_number_with_range() {
    let profiles = profile_rows(&region_rows());
    let amt = profiles
        .iter()
        .find(|profile| profile.name == "amt")
        .expect("amt profile");
    assert_eq!(amt.column_type, ColumnType::Number);
    assert_eq!(amt.min, Some(5.0));
    assert_eq!(amt.max, Some(10.0));
    assert_eq!(amt.distinct_count, 3);
}

#[test]
fn profile_order_follows_first_row_keys() {
    let rows = vec![
        row(&[("b", 1.into()), ("a", "x".into()), ("c", true.into())]),
        row(&[("c", false.into()), ("a", "y".into())]),
    ];
    let names = profile_rows(&rows)
        .into_iter()
        .map(|profile| profile.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["b", "a", "c"]);
}

#[test]
fn first_value_governs_mixed_columns() {
    let rows = vec![
        row(&[("code", "A-100".into())]),
        row(&[("code", 42.into())]),
        row(&[("code", 43.into())]),
    ];
    let profile = &profile_rows(&rows)[0];
    assert_eq!(profile.column_type, ColumnType::String);
    assert!(profile.min.is_none());
    assert_eq!(profile.distinct_count, 3);
}

#[test]
fn boolean_and_date_columns_are_recognised() {
    let rows = vec![
        row(&[
            ("paid", true.into()),
            ("shipped", "2024/03/15".into()),
            ("label", "12-01".into()),
        ]),
        row(&[
            ("paid", false.into()),
            ("shipped", "2024/03/16".into()),
            ("label", "12-02".into()),
        ]),
    ];
    let types = profile_rows(&rows)
        .into_iter()
        .map(|profile| profile.column_type)
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        vec![ColumnType::Boolean, ColumnType::Date, ColumnType::String]
    );
}

#[test]
fn year_month_and_timestamp_columns_profile_as_dates() {
    let rows = vec![
        row(&[
            ("month", "2024-01".into()),
            ("logged", "2024-01-05 10:00:00.123".into()),
            ("due", "5-Jan-2024".into()),
            ("sku", "100-12".into()),
        ]),
        row(&[
            ("month", "2024-02".into()),
            ("logged", "2024-01-06 11:30:00.5".into()),
            ("due", "12-Feb-2024".into()),
            ("sku", "100-13".into()),
        ]),
    ];
    let types = profile_rows(&rows)
        .into_iter()
        .map(|profile| profile.column_type)
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        vec![
            ColumnType::Date,
            ColumnType::Date,
            ColumnType::Date,
            ColumnType::String
        ]
    );
}

#[test]
fn wide_rows_keep_first_row_column_order() {
    let names = (0..200).map(|idx| format!("c{idx:03}")).collect::<Vec<_>>();
    let rows = (0..3)
        .map(|value| {
            names
                .iter()
                .rev()
                .map(|name| (name.clone(), CellValue::from(value)))
                .collect::<Row>()
        })
        .collect::<Vec<_>>();
    let profiles = profile_rows(&rows);
    assert_eq!(profiles.len(), 200);
    assert_eq!(profiles[0].name, "c199");
    assert_eq!(profiles[199].name, "c000");
    assert!(profiles.iter().all(|profile| profile.distinct_count == 3));
}

fn cell_strategy() -> impl Strategy<Value = CellValue> {
    prop_oneof![
        Just(CellValue::Absent),
        (-50i32..50).prop_map(CellValue::from),
        "[a-d]{1,2}".prop_map(CellValue::from),
        any::<bool>().prop_map(CellValue::from),
    ]
}

fn rows_strategy() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(
        prop::collection::vec(cell_strategy(), 3).prop_map(|cells| {
            ["a", "b", "c"]
                .into_iter()
                .zip(cells)
                .collect::<Row>()
        }),
        1..40,
    )
}

proptest! {
    #[test]
    fn one_profile_per_first_row_key(rows in rows_strategy()) {
        let profiles = profile_rows(&rows);
        prop_assert_eq!(profiles.len(), rows[0].len());
    }

    #[test]
    fn range_present_only_for_numbers(rows in rows_strategy()) {
        for profile in profile_rows(&rows) {
            let numeric = profile.column_type == ColumnType::Number;
            prop_assert_eq!(profile.min.is_some(), numeric);
            prop_assert_eq!(profile.max.is_some(), numeric);
            prop_assert!(profile.sample_values.len() <= 5);
            prop_assert!(profile.sample_values.len() <= profile.distinct_count);
        }
    }

    #[test]
    fn distinct_count_is_set_cardinality(rows in rows_strategy()) {
        for profile in profile_rows(&rows) {
            let mut seen: Vec<CellValue> = Vec::new();
            for row in &rows {
                let value = row.get(&profile.name);
                if !value.is_absent() && !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
            prop_assert_eq!(profile.distinct_count, seen.len());
        }
    }
}
