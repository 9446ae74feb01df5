//! Operator set
//!
//! Named binary predicates usable in explicit `(left, op, right)` assertions.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::models::{classify, Kind, Value, UNDEFINED};

/// A binary predicate over two values
pub type Operator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Registry of named operators
#[derive(Clone)]
pub struct OperatorSet {
    operators: HashMap<String, Operator>,
}

impl OperatorSet {
    /// An empty registry, without the built-in operators
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Register an operator, replacing any previous one with the same name
    pub fn insert<F>(&mut self, name: impl Into<String>, op: F) -> &mut Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.operators.insert(name.into(), Arc::new(op));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Operator> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Apply the named operator; unknown operators never hold
    pub fn apply(&self, name: &str, left: &Value, right: &Value) -> bool {
        self.get(name).is_some_and(|op| op(left, right))
    }
}

impl Default for OperatorSet {
    fn default() -> Self {
        let mut set = Self::empty();
        set.insert("===", strict_equals)
            .insert("!==", |a, b| !strict_equals(a, b))
            .insert("==", loose_equals)
            .insert("!=", |a, b| !loose_equals(a, b))
            .insert(">", |a, b| compare(a, b) == Some(Ordering::Greater))
            .insert(">=", |a, b| {
                matches!(compare(a, b), Some(Ordering::Greater | Ordering::Equal))
            })
            .insert("<", |a, b| compare(a, b) == Some(Ordering::Less))
            .insert("<=", |a, b| {
                matches!(compare(a, b), Some(Ordering::Less | Ordering::Equal))
            })
            .insert("=~", matches)
            .insert("!~", |a, b| !matches(a, b));
        set
    }
}

impl fmt::Debug for OperatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorSet")
            .field("operators", &self.names())
            .finish()
    }
}

/// Strict deep equality.
///
/// `NaN` equals itself so the relation stays reflexive.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    let kind = classify(a);
    if kind != classify(b) {
        return false;
    }
    match kind {
        Kind::Null | Kind::Undefined => true,
        Kind::Array => {
            let (Some(left), Some(right)) = (a.elements(), b.elements()) else {
                return false;
            };
            left.len() == right.len()
                && left.iter().zip(&right).all(|pair| match pair {
                    (None, None) => true,
                    (Some(x), Some(y)) => strict_equals(x, y),
                    _ => false,
                })
        }
        Kind::Object => object_equals(a, b),
        _ => native_equals(a, b),
    }
}

fn object_equals(a: &Value, b: &Value) -> bool {
    if let (Value::Object(x), Value::Object(y)) = (a, b) {
        if let (Some(xe), Some(ye)) = (x.as_equals(), y.as_equals()) {
            return xe.equals(b) && ye.equals(a);
        }
    }
    let left = a.entries();
    let right = b.entries();
    let lookup = |entries: &[(String, Value)], key: &str| -> Value {
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map_or_else(|| UNDEFINED.clone(), |(_, v)| v.clone())
    };
    left.iter()
        .chain(right.iter())
        .all(|(key, _)| strict_equals(&lookup(&left, key), &lookup(&right, key)))
}

fn native_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => x.same(y),
        (Value::RegExp(x), Value::RegExp(y)) => x.as_str() == y.as_str(),
        (Value::Date(x), Value::Date(y)) => x == y,
        _ => false,
    }
}

fn is_primitive(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Null | Kind::Undefined | Kind::Boolean | Kind::Number | Kind::String
    )
}

/// Conversion hint for [`to_primitive`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hint {
    Default,
    Number,
}

fn to_primitive(value: &Value, hint: Hint) -> Value {
    match value {
        v if is_primitive(classify(v)) => v.clone(),
        Value::Date(date) if hint == Hint::Number => Value::Number(date.timestamp_millis() as f64),
        v => Value::String(v.to_js_string()),
    }
}

/// Loose equality with ECMAScript coercions.
///
/// Compound values of the same kind compare structurally.
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    let (ka, kb) = (classify(a), classify(b));
    if ka.is_nullish() || kb.is_nullish() {
        return ka.is_nullish() && kb.is_nullish();
    }
    if ka == kb {
        return match (a, b) {
            (Value::Number(x), Value::Number(y)) => x == y,
            _ => strict_equals(a, b),
        };
    }
    match (ka, kb) {
        (Kind::Number, Kind::String) | (Kind::String, Kind::Number) => {
            a.to_number() == b.to_number()
        }
        (Kind::Boolean, _) => loose_equals(&Value::Number(a.to_number()), b),
        (_, Kind::Boolean) => loose_equals(a, &Value::Number(b.to_number())),
        (Kind::Number | Kind::String, other) if !is_primitive(other) => {
            loose_equals(a, &to_primitive(b, Hint::Default))
        }
        (other, Kind::Number | Kind::String) if !is_primitive(other) => {
            loose_equals(&to_primitive(a, Hint::Default), b)
        }
        _ => false,
    }
}

/// Relational comparison; `None` when the operands are unordered
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    let pa = to_primitive(a, Hint::Number);
    let pb = to_primitive(b, Hint::Number);
    if let (Value::String(x), Value::String(y)) = (&pa, &pb) {
        return Some(x.encode_utf16().cmp(y.encode_utf16()));
    }
    pa.to_number().partial_cmp(&pb.to_number())
}

/// Membership, pattern or property test depending on the right operand
pub fn matches(left: &Value, right: &Value) -> bool {
    match classify(right) {
        Kind::Array => right.elements().unwrap_or_default().iter().any(|slot| {
            strict_equals(left, slot.as_ref().unwrap_or(&UNDEFINED))
        }),
        Kind::Object => right
            .entries()
            .iter()
            .any(|(_, value)| strict_equals(left, value)),
        Kind::Regexp => match right {
            Value::RegExp(re) => re.is_match(&left.to_js_string()),
            _ => false,
        },
        Kind::String | Kind::Number => {
            let needle = right.to_js_string();
            if matches!(classify(left), Kind::String | Kind::Number) {
                left.to_js_string().contains(&needle)
            } else {
                left.has_property(&needle)
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HasEquals, HostObject, TestFn};
    use crate::{array, map};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    #[derive(Debug)]
    struct Approx(f64);

    impl HostObject for Approx {
        fn as_equals(&self) -> Option<&dyn HasEquals> {
            Some(self)
        }
    }

    impl HasEquals for Approx {
        fn equals(&self, other: &Value) -> bool {
            other
                .get("value")
                .map(|v| (v.to_number() - self.0).abs() < 0.01)
                .unwrap_or(true)
        }
    }

    #[test]
    fn test_strict_equals_kinds() {
        assert!(strict_equals(&1.into(), &1.into()));
        assert!(!strict_equals(&1.into(), &"1".into()));
        assert!(strict_equals(&Value::Null, &Value::Null));
        assert!(!strict_equals(&Value::Null, &Value::Undefined));
        assert!(strict_equals(&f64::NAN.into(), &f64::NAN.into()));
    }

    #[test]
    fn test_strict_equals_deep() {
        let a = map! { "x" => array![1, map! { "y" => "z" }] };
        let b = map! { "x" => array![1, map! { "y" => "z" }] };
        assert!(strict_equals(&a, &b));
        let c = map! { "x" => array![1, map! { "y" => "w" }] };
        assert!(!strict_equals(&a, &c));
    }

    #[test]
    fn test_strict_equals_absent_key_is_undefined() {
        assert!(strict_equals(
            &map! { "a" => 1, "b" => Value::Undefined },
            &map! { "a" => 1 }
        ));
        assert!(!strict_equals(&map! { "a" => 1, "b" => 2 }, &map! { "a" => 1 }));
    }

    #[test]
    fn test_strict_equals_holes() {
        let holey = Value::sparse(vec![Some(1.into()), None]);
        let filled = array![1, Value::Undefined];
        assert!(!strict_equals(&holey, &filled));
        assert!(strict_equals(&holey, &holey.clone()));
    }

    #[test]
    fn test_strict_equals_array_like() {
        let like = map! { "0" => "a", "length" => 1 };
        assert!(strict_equals(&like, &array!["a"]));
    }

    #[test]
    fn test_strict_equals_functions_and_regexps() {
        let f = TestFn::constant(true.into());
        assert!(strict_equals(&f.clone().into(), &f.into()));
        assert!(!strict_equals(
            &TestFn::constant(true.into()).into(),
            &TestFn::constant(true.into()).into()
        ));
        assert!(strict_equals(
            &Value::regex("a+").unwrap(),
            &Value::regex("a+").unwrap()
        ));
    }

    #[test]
    fn test_strict_equals_custom() {
        let a = Value::object(Approx(1.0));
        let b = Value::object(Approx(1.001));
        assert!(strict_equals(&a, &b));
        assert!(!strict_equals(&a, &map! { "value" => 1 }));
    }

    #[test]
    fn test_loose_equals() {
        assert!(loose_equals(&1.into(), &"1".into()));
        assert!(loose_equals(&Value::Null, &Value::Undefined));
        assert!(!loose_equals(&Value::Null, &0.into()));
        assert!(loose_equals(&true.into(), &1.into()));
        assert!(loose_equals(&"1".into(), &true.into()));
        assert!(loose_equals(&array![1, 2], &"1,2".into()));
        assert!(loose_equals(&array![1], &array![1]));
        assert!(!loose_equals(&f64::NAN.into(), &f64::NAN.into()));
        assert!(!loose_equals(&array![], &map! {}));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&2.into(), &10.into()), Some(Ordering::Less));
        assert_eq!(compare(&"2".into(), &"10".into()), Some(Ordering::Greater));
        assert_eq!(compare(&"2".into(), &10.into()), Some(Ordering::Less));
        assert_eq!(compare(&f64::NAN.into(), &1.into()), None);
        let early = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(compare(&early.into(), &late.into()), Some(Ordering::Less));
    }

    #[test]
    fn test_relational_operators() {
        let ops = OperatorSet::default();
        assert!(ops.apply(">", &3.into(), &2.into()));
        assert!(ops.apply(">=", &2.into(), &2.into()));
        assert!(ops.apply("<=", &Value::Null, &0.into()));
        assert!(!ops.apply("<", &Value::Undefined, &0.into()));
        assert!(!ops.apply(">=", &Value::Undefined, &0.into()));
    }

    #[test]
    fn test_matches() {
        assert!(matches(&2.into(), &array![1, 2, 3]));
        assert!(!matches(&"2".into(), &array![1, 2, 3]));
        assert!(matches(&Value::Undefined, &Value::sparse(vec![None])));
        assert!(matches(&"b".into(), &map! { "k" => "b" }));
        assert!(matches(&"hello world".into(), &Value::regex("wor").unwrap()));
        assert!(matches(&123.into(), &Value::regex(r"^\d+$").unwrap()));
        assert!(matches(&"hello".into(), &"ell".into()));
        assert!(matches(&1234.into(), &23.into()));
        assert!(matches(&map! { "a" => 1 }, &"a".into()));
        assert!(!matches(&map! { "a" => 1 }, &"b".into()));
        assert!(matches(&array![5], &0.into()));
        assert!(!matches(&"x".into(), &true.into()));
    }

    #[test]
    fn test_unknown_and_custom_operators() {
        let mut ops = OperatorSet::default();
        assert!(!ops.apply("<>", &1.into(), &1.into()));
        ops.insert("divides", |a, b| b.to_number() % a.to_number() == 0.0);
        assert!(ops.apply("divides", &3.into(), &9.into()));
        assert!(ops.contains("=~"));
        assert!(!OperatorSet::empty().contains("==="));
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            Just(Value::Undefined),
            any::<bool>().prop_map(Value::from),
            any::<f64>().prop_map(Value::from),
            "[a-z]{0,4}".prop_map(Value::from),
        ]
    }

    fn value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(prop::option::of(inner.clone()), 0..4)
                    .prop_map(Value::sparse),
                prop::collection::vec(("[a-c]", inner), 0..4)
                    .prop_map(|entries| Value::Map(entries.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_strict_equals_reflexive(a in value()) {
            prop_assert!(strict_equals(&a, &a.clone()));
        }

        #[test]
        fn prop_strict_equals_symmetric(a in value(), b in value()) {
            prop_assert_eq!(strict_equals(&a, &b), strict_equals(&b, &a));
        }

        #[test]
        fn prop_array_single_change_breaks_equality(
            items in prop::collection::vec(value(), 1..5),
            index in any::<prop::sample::Index>(),
        ) {
            let a = Value::from(items.clone());
            prop_assert!(strict_equals(&a, &Value::from(items.clone())));
            let i = index.index(items.len());
            let mut changed = items;
            changed[i] = array![changed[i].clone(), "changed"];
            prop_assert!(!strict_equals(&a, &Value::from(changed)));
        }
    }
}
