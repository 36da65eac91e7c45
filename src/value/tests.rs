use super::*;

#[test]
fn empty_and_null_are_distinct() {
    assert!(Value::Empty.is_absent());
    assert!(Value::Null.is_absent());
    assert_ne!(Value::Empty, Value::Null);
}

#[test]
fn json_null_is_distinct_from_sql_null() {
    assert!(Value::JsonNull.is_absent());
    assert_ne!(Value::JsonNull, Value::Null);
}

#[test]
fn get_field_on_map_and_record() {
    let mut map = BTreeMap::new();
    map.insert("a".to_string(), Value::Int(1));
    assert_eq!(Value::Map(map).get_field("a"), Value::Int(1));

    let record = Value::Record(vec![("b".to_string(), Value::Int(2))]);
    assert_eq!(record.get_field("b"), Value::Int(2));
    assert_eq!(record.get_field("missing"), Value::Empty);
}

#[test]
fn get_field_on_non_object_is_empty() {
    assert_eq!(Value::Int(1).get_field("a"), Value::Empty);
}

#[test]
fn empty_to_null_only_converts_empty() {
    assert_eq!(Value::Empty.empty_to_null(), Value::Null);
    assert_eq!(Value::Null.empty_to_null(), Value::Null);
    assert_eq!(Value::Int(5).empty_to_null(), Value::Int(5));
}

#[test]
fn empty_to_null_recurses_into_record_fields() {
    let record = Value::Record(vec![
        ("present".to_string(), Value::Int(1)),
        ("absent".to_string(), Value::Empty),
    ]);
    assert_eq!(
        record.empty_to_null(),
        Value::Record(vec![
            ("present".to_string(), Value::Int(1)),
            ("absent".to_string(), Value::Null),
        ])
    );
}

#[test]
fn empty_to_null_recurses_into_map_values() {
    let mut map = BTreeMap::new();
    map.insert("present".to_string(), Value::Int(1));
    map.insert("absent".to_string(), Value::Empty);
    let mut expected = BTreeMap::new();
    expected.insert("present".to_string(), Value::Int(1));
    expected.insert("absent".to_string(), Value::Null);
    assert_eq!(Value::Map(map).empty_to_null(), Value::Map(expected));
}

#[test]
fn compare_values_orders_across_numeric_representations() {
    assert_eq!(
        compare_values(&Value::Int(1), &Value::Double(1.0), NullRank::Last),
        Ordering::Equal
    );
    assert_eq!(
        compare_values(&Value::Int(1), &Value::Long(2), NullRank::Last),
        Ordering::Less
    );
}

#[test]
fn compare_values_null_rank_controls_placement() {
    assert_eq!(
        compare_values(&Value::Null, &Value::Int(1), NullRank::First),
        Ordering::Less
    );
    assert_eq!(
        compare_values(&Value::Null, &Value::Int(1), NullRank::Last),
        Ordering::Greater
    );
}

#[test]
fn compare_values_antisymmetric_for_strings() {
    let a = Value::String("alpha".into());
    let b = Value::String("beta".into());
    assert_eq!(
        compare_values(&a, &b, NullRank::Last).reverse(),
        compare_values(&b, &a, NullRank::Last)
    );
}

#[test]
fn values_equal_distinguishes_empty_from_null() {
    assert!(values_equal(&Value::Empty, &Value::Empty));
    assert!(!values_equal(&Value::Empty, &Value::Null));
}

#[test]
fn null_rank_wire_round_trips() {
    assert_eq!(NullRank::from_nulls_lowest(true), NullRank::First);
    assert_eq!(NullRank::from_nulls_lowest(false), NullRank::Last);
    assert_eq!(NullRank::First.as_wire(), -1);
    assert_eq!(NullRank::Last.as_wire(), 1);
}

#[test]
fn numeric_promotion_widens_to_the_highest_representation() {
    assert_eq!(promote(NumericRepr::Int, NumericRepr::Long), NumericRepr::Long);
    assert_eq!(promote(NumericRepr::Long, NumericRepr::Double), NumericRepr::Double);
    assert_eq!(promote(NumericRepr::Double, NumericRepr::Decimal), NumericRepr::Decimal);
}
