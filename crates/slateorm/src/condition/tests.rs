use super::*;
use crate::{field_map, vlist};

fn placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

#[test]
fn test_scalar_equality() {
    let mut f = Filter::new();
    f.apply(&field_map! { "user_id" => 11 }, Combinator::And).unwrap();
    assert_eq!(f.expr(), " (`user_id` =?)");
    assert_eq!(f.args(), &[Value::Int(11)]);
}

#[test]
fn test_between_three_elements() {
    let mut f = Filter::new();
    f.apply(&field_map! { "age" => vlist!["BETWEEN", 18, 30] }, Combinator::And)
        .unwrap();
    assert_eq!(f.expr(), " (`age`BETWEEN ? and ? )");
    assert_eq!(f.args(), &[Value::Int(18), Value::Int(30)]);
}

#[test]
fn test_between_pair_form() {
    let mut f = Filter::new();
    f.apply(
        &field_map! { "age" => vlist!["between", vec![18, 30]] },
        Combinator::And,
    )
    .unwrap();
    assert_eq!(f.expr(), " (`age`BETWEEN ? and ? )");
    assert_eq!(f.args(), &[Value::Int(18), Value::Int(30)]);
}

#[test]
fn test_between_wrong_arity_is_an_error() {
    let mut f = Filter::new();
    let err = f
        .apply(&field_map! { "age" => vlist!["BETWEEN", 1, 2, 3] }, Combinator::And)
        .unwrap_err();
    assert!(err.is_usage());

    let err = f
        .apply(&field_map! { "age" => vlist!["BETWEEN", vec![1, 2, 3]] }, Combinator::And)
        .unwrap_err();
    assert!(err.is_usage());

    let err = f
        .apply(&field_map! { "age" => vlist!["BETWEEN", 1] }, Combinator::And)
        .unwrap_err();
    assert!(err.is_usage());

    assert!(f.is_empty());
    assert!(f.args().is_empty());
}

#[test]
fn test_in_with_single_scalar() {
    let mut f = Filter::new();
    f.apply(&field_map! { "id" => vlist!["IN", 7] }, Combinator::And)
        .unwrap();
    assert_eq!(f.expr(), " (`id`IN (?) )");
    assert_eq!(placeholders(f.expr()), 1);
    assert_eq!(f.args(), &[Value::Int(7)]);
}

#[test]
fn test_in_with_list_keeps_order() {
    let mut f = Filter::new();
    f.apply(
        &field_map! { "name" => vlist!["IN", vec!["c", "a", "b"]] },
        Combinator::And,
    )
    .unwrap();
    assert_eq!(f.expr(), " (`name`IN (?,?,?) )");
    assert_eq!(
        f.args(),
        &[
            Value::Text("c".into()),
            Value::Text("a".into()),
            Value::Text("b".into())
        ]
    );
}

#[test]
fn test_in_empty_list_is_an_error() {
    let mut f = Filter::new();
    let err = f
        .apply(&field_map! { "id" => vlist!["IN", Vec::<i64>::new()] }, Combinator::And)
        .unwrap_err();
    assert!(err.is_usage());
}

#[test]
fn test_comparison_operators() {
    for op in ["=", ">", ">=", "<", "<=", "<>", "!=", "LIKE"] {
        let mut f = Filter::new();
        f.apply(&field_map! { "n" => vlist![op, 5] }, Combinator::And)
            .unwrap();
        if op == "=" {
            assert_eq!(f.expr(), " (`n` =?)");
        } else {
            assert_eq!(f.expr(), format!(" (`n`{op} ? )"));
        }
        assert_eq!(f.args(), &[Value::Int(5)]);
    }
}

#[test]
fn test_like_is_case_insensitive() {
    let mut f = Filter::new();
    f.apply(&field_map! { "name" => cmp("like", "%bo%") }, Combinator::And)
        .unwrap();
    assert_eq!(f.expr(), " (`name`LIKE ? )");
}

#[test]
fn test_unknown_operator_is_an_error() {
    let mut f = Filter::new();
    let err = f
        .apply(&field_map! { "n" => vlist!["~~", 5] }, Combinator::And)
        .unwrap_err();
    assert!(err.to_string().contains("unsupported operator"));
}

#[test]
fn test_non_text_operator_is_an_error() {
    let mut f = Filter::new();
    assert!(f
        .apply(&field_map! { "n" => vlist![1, 5] }, Combinator::And)
        .is_err());
}

#[test]
fn test_qualified_key() {
    let mut f = Filter::new();
    f.apply(&field_map! { "u.name" => "bob" }, Combinator::And)
        .unwrap();
    assert_eq!(f.expr(), " (u.`name` =?)");
}

#[test]
fn test_null_scalar_renders_is_null() {
    let mut f = Filter::new();
    f.apply(&field_map! { "deleted_at" => Value::Null }, Combinator::And)
        .unwrap();
    assert_eq!(f.expr(), " (`deleted_at` IS NULL)");
    assert!(f.args().is_empty());
}

#[test]
fn test_multiple_keys_join_with_and() {
    let mut f = Filter::new();
    f.apply(
        &field_map! { "a" => 1, "b" => vlist![">", 2] },
        Combinator::And,
    )
    .unwrap();
    assert_eq!(f.expr(), " (`a` =? AND `b`> ? )");
    assert_eq!(f.args(), &[Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_groups_are_flat() {
    let mut f = Filter::new();
    f.apply(&field_map! { "a" => 1 }, Combinator::And).unwrap();
    f.apply(&field_map! { "b" => 2 }, Combinator::And).unwrap();
    f.apply(&field_map! { "c" => 3 }, Combinator::Or).unwrap();
    assert_eq!(f.expr(), " (`a` =?) AND (`b` =?) OR (`c` =?)");
    assert_eq!(f.args(), &[Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn test_or_first_group_has_no_keyword() {
    let mut f = Filter::new();
    f.apply(&field_map! { "a" => 1 }, Combinator::Or).unwrap();
    assert_eq!(f.expr(), " (`a` =?)");
}

#[test]
fn test_empty_map_is_noop() {
    let mut f = Filter::new();
    f.apply(&FieldMap::new(), Combinator::And).unwrap();
    assert!(f.is_empty());
}

#[test]
fn test_placeholder_count_matches_args() {
    let mut f = Filter::new();
    f.apply(
        &field_map! {
            "a" => 1,
            "t.b" => in_list([4, 5, 6]),
            "c" => between(1.5, 2.5),
            "d" => Value::Null,
            "e" => cmp("!=", "x"),
        },
        Combinator::And,
    )
    .unwrap();
    f.apply(&field_map! { "f" => vlist!["BETWEEN", vec![1, 2]] }, Combinator::Or)
        .unwrap();

    assert_eq!(placeholders(f.expr()), f.args().len());
    assert_eq!(
        f.args(),
        &[
            Value::Int(1),
            Value::Int(4),
            Value::Int(5),
            Value::Int(6),
            Value::Float(1.5),
            Value::Float(2.5),
            Value::Text("x".into()),
            Value::Int(1),
            Value::Int(2),
        ]
    );
}

#[test]
fn test_failed_group_leaves_filter_untouched() {
    let mut f = Filter::new();
    f.apply(&field_map! { "a" => 1 }, Combinator::And).unwrap();
    let before = f.clone();
    assert!(f
        .apply(&field_map! { "b" => 2, "c" => vlist!["IN"] }, Combinator::And)
        .is_err());
    assert_eq!(f, before);
}
