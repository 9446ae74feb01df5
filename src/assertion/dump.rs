//! Value dumper
//!
//! Deterministic, human readable rendering of values for verdict messages.

use serde::{Deserialize, Serialize};

use crate::models::{classify, Kind, Value};

/// Renders values for diagnostics.
///
/// Renderings longer than `max_length` characters are broken into one entry
/// per line, each line indented by `indent`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dumper {
    pub max_length: usize,
    pub indent: String,
}

impl Default for Dumper {
    fn default() -> Self {
        Self {
            max_length: 16,
            indent: "  ".to_string(),
        }
    }
}

impl Dumper {
    pub fn new(max_length: usize, indent: impl Into<String>) -> Self {
        Self {
            max_length,
            indent: indent.into(),
        }
    }

    pub fn dump(&self, value: &Value) -> String {
        match classify(value) {
            Kind::Null | Kind::Undefined => classify(value).name().to_string(),
            Kind::String => quote(&value.to_js_string()),
            Kind::Array => self.dump_array(value),
            Kind::Object => self.dump_object(value),
            _ => value.to_js_string(),
        }
    }

    fn dump_array(&self, value: &Value) -> String {
        let slots = value.elements().unwrap_or_default();
        if slots.iter().all(Option::is_none) {
            return "[]".to_string();
        }
        let parts: Vec<String> = slots
            .iter()
            .map(|slot| slot.as_ref().map(|v| self.dump(v)).unwrap_or_default())
            .collect();
        self.wrap("[", &parts, "]")
    }

    fn dump_object(&self, value: &Value) -> String {
        if let Value::Object(object) = value {
            if let Some(custom) = object.as_custom_dump() {
                return custom.custom_dump();
            }
        }
        let entries = value.entries();
        if entries.is_empty() {
            return "{}".to_string();
        }
        let parts: Vec<String> = entries
            .iter()
            .map(|(key, v)| format!("{}: {}", self.dump_key(key), self.dump(v)))
            .collect();
        self.wrap("{", &parts, "}")
    }

    fn dump_key(&self, key: &str) -> String {
        if is_identifier(key) {
            key.to_string()
        } else {
            quote(key)
        }
    }

    fn wrap(&self, open: &str, parts: &[String], close: &str) -> String {
        let inline = format!("{} {} {}", open, parts.join(", "), close);
        if inline.chars().count() <= self.max_length {
            return inline;
        }
        let body = format!("\n{}", parts.join(",\n"));
        format!(
            "{}{}\n{}",
            open,
            body.replace('\n', &format!("\n{}", self.indent)),
            close
        )
    }
}

/// `[A-Za-z_$][A-Za-z0-9_$]*`
fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorValue, HasCustomDump, HostObject, TestFn};
    use crate::{array, map};

    #[test]
    fn test_dump_scalars() {
        let dumper = Dumper::default();
        assert_eq!(dumper.dump(&Value::Null), "null");
        assert_eq!(dumper.dump(&Value::Undefined), "undefined");
        assert_eq!(dumper.dump(&true.into()), "true");
        assert_eq!(dumper.dump(&1.into()), "1");
        assert_eq!(dumper.dump(&Value::regex("a+b").unwrap()), "/a+b/");
        assert_eq!(
            dumper.dump(&TestFn::named("check", |_| Ok(true.into())).into()),
            "function check() { [native code] }"
        );
    }

    #[test]
    fn test_dump_string_escapes() {
        let dumper = Dumper::default();
        assert_eq!(dumper.dump(&"it's".into()), r"'it\'s'");
        assert_eq!(dumper.dump(&"a\\b\r\n".into()), r"'a\\b\r\n'");
    }

    #[test]
    fn test_dump_short_array_inline() {
        let dumper = Dumper::default();
        assert_eq!(dumper.dump(&array![1, 2]), "[ 1, 2 ]");
        assert_eq!(dumper.dump(&array![]), "[]");
        assert_eq!(dumper.dump(&Value::sparse(vec![None, None])), "[]");
        assert_eq!(
            dumper.dump(&Value::sparse(vec![Some(1.into()), None, Some(3.into())])),
            "[ 1, , 3 ]"
        );
    }

    #[test]
    fn test_dump_long_array_breaks_lines() {
        let dumper = Dumper::default();
        let out = dumper.dump(&array!["alpha", "beta", "gamma"]);
        assert_eq!(out, "[\n  'alpha',\n  'beta',\n  'gamma'\n]");
    }

    #[test]
    fn test_dump_nested_indent() {
        let dumper = Dumper::new(8, "  ");
        let out = dumper.dump(&map! { "a" => array![1, 2, 3] });
        assert_eq!(out, "{\n  a: [\n    1,\n    2,\n    3\n  ]\n}");
    }

    #[test]
    fn test_dump_object_keys() {
        let dumper = Dumper::new(80, "  ");
        let out = dumper.dump(&map! { "a" => 1, "$b_2" => 2, "x-y" => 3, "9" => 4 });
        assert_eq!(out, "{ a: 1, $b_2: 2, 'x-y': 3, '9': 4 }");
        assert_eq!(dumper.dump(&map! {}), "{}");
    }

    #[test]
    fn test_dump_custom_object() {
        #[derive(Debug)]
        struct Point(i32, i32);

        impl HostObject for Point {
            fn as_custom_dump(&self) -> Option<&dyn HasCustomDump> {
                Some(self)
            }
        }

        impl HasCustomDump for Point {
            fn custom_dump(&self) -> String {
                format!("Point({}, {})", self.0, self.1)
            }
        }

        let dumper = Dumper::default();
        assert_eq!(dumper.dump(&Value::object(Point(1, 2))), "Point(1, 2)");
        assert_eq!(
            dumper.dump(&ErrorValue::new("TypeError", "bad").into()),
            "TypeError: bad"
        );
    }

    #[test]
    fn test_dump_array_like_mapping() {
        let dumper = Dumper::default();
        let like = map! { "0" => "a", "1" => "b", "length" => 2 };
        assert_eq!(dumper.dump(&like), "[ 'a', 'b' ]");
    }
}
