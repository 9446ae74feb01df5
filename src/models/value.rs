//! Dynamic value model
//!
//! Test bodies report arbitrary values. This module defines them, the
//! capability traits host objects may opt into, and the type classifier used
//! for dispatch by the dumper, the operators and the judge.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::spec::TestFn;
use crate::assertion::{ops, Dumper};

pub(crate) static UNDEFINED: Value = Value::Undefined;

/// Semantic kind of a value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Null,
    Undefined,
    Boolean,
    Number,
    String,
    Array,
    Function,
    Regexp,
    Date,
    /// Mappings and any other non-array object.
    ///
    /// Plain mappings and host objects share this kind; host objects differ
    /// only through the capabilities they opt into.
    Object,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Undefined => "undefined",
            Kind::Boolean => "boolean",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Function => "function",
            Kind::Regexp => "regexp",
            Kind::Date => "date",
            Kind::Object => "object",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Kind::Null | Kind::Undefined)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Custom equivalence, consulted by `===` when both operands provide it
pub trait HasEquals {
    fn equals(&self, other: &Value) -> bool;
}

/// Custom stringification, preferred by the dumper over the generic mapping form
pub trait HasCustomDump {
    fn custom_dump(&self) -> String;
}

/// An opaque object supplied by test code.
///
/// Host objects behave like mappings over [`HostObject::properties`]. They can
/// opt into custom equality and custom dumping by returning themselves from
/// the capability accessors.
pub trait HostObject: fmt::Debug + Send + Sync {
    fn properties(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.properties()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn as_equals(&self) -> Option<&dyn HasEquals> {
        None
    }

    fn as_custom_dump(&self) -> Option<&dyn HasCustomDump> {
        None
    }
}

/// Error captured from a test body that failed or panicked
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn from_error(error: &anyhow::Error) -> Self {
        Self::new("Error", format!("{error:#}"))
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

impl HostObject for ErrorValue {
    fn properties(&self) -> Vec<(String, Value)> {
        vec![
            ("name".to_string(), Value::String(self.name.clone())),
            ("message".to_string(), Value::String(self.message.clone())),
        ]
    }

    fn as_custom_dump(&self) -> Option<&dyn HasCustomDump> {
        Some(self)
    }
}

impl HasCustomDump for ErrorValue {
    fn custom_dump(&self) -> String {
        self.to_string()
    }
}

/// Insertion-ordered string-keyed mapping
#[derive(Clone, Debug, Default)]
pub struct Map {
    entries: Vec<(String, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace in place, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, Value)> {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A dynamically typed value reported or returned by a test
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// `None` entries are holes
    Array(Vec<Option<Value>>),
    Map(Map),
    Function(TestFn),
    RegExp(Regex),
    Date(DateTime<Utc>),
    Object(Arc<dyn HostObject>),
}

impl Value {
    /// Array with holes preserved
    pub fn sparse(items: Vec<Option<Value>>) -> Self {
        Value::Array(items)
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Value::RegExp)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ErrorValue::new("Error", message).into()
    }

    pub fn object(object: impl HostObject + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn kind(&self) -> Kind {
        classify(self)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Own property lookup; `None` means the property is absent
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(key).cloned(),
            Value::Object(object) => object.get(key),
            Value::Array(items) => {
                if key == "length" {
                    Some(Value::Number(items.len() as f64))
                } else {
                    index_key(key).and_then(|i| items.get(i).cloned().flatten())
                }
            }
            Value::Function(f) if key == "name" => {
                Some(Value::String(f.name().unwrap_or_default().to_string()))
            }
            _ => None,
        }
    }

    pub fn has_property(&self, key: &str) -> bool {
        match self {
            Value::Map(map) => map.contains_key(key),
            Value::Array(items) => {
                key == "length"
                    || index_key(key)
                        .and_then(|i| items.get(i))
                        .is_some_and(Option::is_some)
            }
            Value::Object(object) => object.get(key).is_some(),
            Value::Function(_) => key == "name" || key == "length",
            Value::RegExp(_) => key == "source" || key == "lastIndex",
            _ => false,
        }
    }

    /// Slots of an array or array-like value
    pub fn elements(&self) -> Option<Vec<Option<Value>>> {
        match self {
            Value::Array(items) => Some(items.clone()),
            Value::Map(_) | Value::Object(_) => {
                let length = array_like_length(self)?;
                Some((0..length).map(|i| self.get(&i.to_string())).collect())
            }
            _ => None,
        }
    }

    /// Enumerable entries of a mapping or host object
    pub fn entries(&self) -> Vec<(String, Value)> {
        match self {
            Value::Map(map) => map.iter().cloned().collect(),
            Value::Object(object) => object.properties(),
            _ => Vec::new(),
        }
    }

    /// ECMAScript `ToString`
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    None | Some(Value::Undefined) | Some(Value::Null) => String::new(),
                    Some(v) => v.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) => "[object Object]".to_string(),
            Value::Function(f) => f.source_text(),
            Value::RegExp(re) => format!("/{}/", re.as_str()),
            Value::Date(date) => format_date(date),
            Value::Object(object) => object
                .as_custom_dump()
                .map(|d| d.custom_dump())
                .unwrap_or_else(|| "[object Object]".to_string()),
        }
    }

    /// ECMAScript `ToNumber`
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Date(date) => date.timestamp_millis() as f64,
            other => parse_number(&other.to_js_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        ops::strict_equals(self, other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Dumper::default().dump(self))
    }
}

/// Determine the semantic kind of a value
pub fn classify(value: &Value) -> Kind {
    match value {
        Value::Undefined => Kind::Undefined,
        Value::Null => Kind::Null,
        Value::Bool(_) => Kind::Boolean,
        Value::Number(_) => Kind::Number,
        Value::String(_) => Kind::String,
        Value::Array(_) => Kind::Array,
        Value::Function(_) => Kind::Function,
        Value::RegExp(_) => Kind::Regexp,
        Value::Date(_) => Kind::Date,
        Value::Map(_) | Value::Object(_) => {
            if array_like_length(value).is_some() {
                Kind::Array
            } else {
                Kind::Object
            }
        }
    }
}

/// Objects with a numeric `length` whose last index is present are arrays
fn array_like_length(value: &Value) -> Option<usize> {
    let length = match value.get("length")? {
        Value::Number(n) => n,
        _ => return None,
    };
    if length == 0.0 {
        return Some(0);
    }
    if length < 0.0 || length.fract() != 0.0 || !length.is_finite() {
        return None;
    }
    value
        .has_property(&format_number(length - 1.0))
        .then_some(length as usize)
}

fn index_key(key: &str) -> Option<usize> {
    key.parse::<usize>()
        .ok()
        .filter(|i| i.to_string() == key)
}

/// Format a number the way ECMAScript prints it
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if !(1e-6..1e21).contains(&abs) {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a %b %d %Y %H:%M:%S GMT+0000").to_string()
}

/// ECMAScript string-to-number conversion
fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let lower = s.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|n| n as f64)
                .unwrap_or(f64::NAN);
        }
    }
    if s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        s.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(|v| Some(v.into())).collect())
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<TestFn> for Value {
    fn from(f: TestFn) -> Self {
        Value::Function(f)
    }
}

impl From<Regex> for Value {
    fn from(re: Regex) -> Self {
        Value::RegExp(re)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Value::Date(date)
    }
}

impl From<ErrorValue> for Value {
    fn from(error: ErrorValue) -> Self {
        Value::Object(Arc::new(error))
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Array(vec![Some(a.into()), Some(b.into())])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Array(vec![Some(a.into()), Some(b.into()), Some(c.into())])
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => items.into(),
            serde_json::Value::Object(fields) => Value::Map(fields.into_iter().collect()),
        }
    }
}
