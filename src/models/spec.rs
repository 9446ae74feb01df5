//! Test definitions
//!
//! Callables, test specs and the collections they are normalized from.

use std::fmt;
use std::sync::Arc;

use super::value::{classify, Kind, Map, Value};
use crate::executor::{HarnessError, Reporter};

type Body = dyn Fn(Reporter) -> anyhow::Result<Value> + Send + Sync;

/// A test callable.
///
/// The body receives the case's [`Reporter`] and returns a raw result;
/// `Value::Undefined` means it reports only through the reporter.
#[derive(Clone)]
pub struct TestFn {
    name: Option<String>,
    body: Arc<Body>,
}

impl TestFn {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(Reporter) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: None,
            body: Arc::new(body),
        }
    }

    pub fn named<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Reporter) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(body).with_name(name)
    }

    /// A callable that always returns `value`
    pub fn constant(value: Value) -> Self {
        Self::new(move |_| Ok(value.clone()))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn call(&self, reporter: Reporter) -> anyhow::Result<Value> {
        (self.body)(reporter)
    }

    /// Identity comparison
    pub fn same(&self, other: &TestFn) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.body) as *const (),
            Arc::as_ptr(&other.body) as *const (),
        )
    }

    pub(crate) fn source_text(&self) -> String {
        format!(
            "function {}() {{ [native code] }}",
            self.name.as_deref().unwrap_or_default()
        )
    }
}

impl fmt::Debug for TestFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One normalized test case
#[derive(Clone, Debug)]
pub struct TestSpec {
    /// Resolved to `test <N>` when the case runs
    pub name: Option<String>,
    pub callable: TestFn,
}

pub type Definition = Box<dyn FnOnce(&mut Registrar) -> anyhow::Result<Value> + Send>;

/// Input accepted by a suite
pub enum TestSet {
    /// An array of alternating names and callables, or a mapping name -> callable
    Collection(Value),
    /// A function that registers collections and/or returns one
    Define {
        name: Option<String>,
        define: Definition,
    },
}

impl TestSet {
    pub fn define<F>(define: F) -> Self
    where
        F: FnOnce(&mut Registrar) -> anyhow::Result<Value> + Send + 'static,
    {
        TestSet::Define {
            name: None,
            define: Box::new(define),
        }
    }

    pub fn define_named<F>(name: impl Into<String>, define: F) -> Self
    where
        F: FnOnce(&mut Registrar) -> anyhow::Result<Value> + Send + 'static,
    {
        TestSet::Define {
            name: Some(name.into()),
            define: Box::new(define),
        }
    }
}

impl From<Value> for TestSet {
    fn from(tests: Value) -> Self {
        TestSet::Collection(tests)
    }
}

impl From<Map> for TestSet {
    fn from(tests: Map) -> Self {
        TestSet::Collection(Value::Map(tests))
    }
}

impl fmt::Debug for TestSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestSet::Collection(tests) => f.debug_tuple("Collection").field(tests).finish(),
            TestSet::Define { name, .. } => f
                .debug_struct("Define")
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}

/// Collection registered from a definition function
pub struct Batch {
    pub tests: Value,
    pub on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl Batch {
    pub fn new(tests: Value) -> Self {
        Self {
            tests,
            on_complete: None,
        }
    }
}

/// Handed to definition functions to register collections
#[derive(Default)]
pub struct Registrar {
    batches: Vec<Batch>,
}

impl Registrar {
    pub fn register(&mut self, tests: impl Into<Value>) {
        self.batches.push(Batch::new(tests.into()));
    }

    /// Register a collection with a callback run after its last case is scheduled
    pub fn register_with<F>(&mut self, tests: impl Into<Value>, on_complete: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.batches.push(Batch {
            tests: tests.into(),
            on_complete: Some(Box::new(on_complete)),
        });
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub(crate) fn into_batches(self) -> Vec<Batch> {
        self.batches
    }
}

/// Normalize a collection into an ordered list of test specs.
///
/// A string entry names the entry right after it. Booleans, arrays and
/// mappings become constant callables; other entries are skipped.
pub fn normalize(tests: &Value) -> Result<Vec<TestSpec>, HarnessError> {
    let entries: Vec<Value> = match classify(tests) {
        Kind::Array => tests
            .elements()
            .unwrap_or_default()
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect(),
        Kind::Object => tests
            .entries()
            .into_iter()
            .flat_map(|(key, value)| [Value::String(key), value])
            .collect(),
        kind => return Err(HarnessError::UnsupportedTests(kind)),
    };

    let mut specs = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let label = match i.checked_sub(1).map(|p| &entries[p]) {
            Some(Value::String(name)) => Some(name.clone()),
            _ => None,
        };
        match entry {
            Value::Function(callable) => specs.push(TestSpec {
                name: label.or_else(|| callable.name().map(str::to_owned)),
                callable: callable.clone(),
            }),
            other => {
                if matches!(classify(other), Kind::Boolean | Kind::Array | Kind::Object) {
                    specs.push(TestSpec {
                        name: label,
                        callable: TestFn::constant(other.clone()),
                    });
                }
            }
        }
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{array, map};

    fn names(specs: &[TestSpec]) -> Vec<Option<&str>> {
        specs.iter().map(|s| s.name.as_deref()).collect()
    }

    #[test]
    fn test_normalize_alternating_sequence() {
        let tests = array![
            TestFn::constant(true.into()),
            "named",
            TestFn::constant(true.into()),
            array!["a", "a"],
            TestFn::named("own", |_| Ok(true.into())),
            "naming 3",
            array!["b", "b"],
            true,
        ];
        let specs = normalize(&tests).unwrap();
        assert_eq!(
            names(&specs),
            vec![None, Some("named"), None, Some("own"), Some("naming 3"), None]
        );
    }

    #[test]
    fn test_normalize_mapping() {
        let tests = map! {
            "wrong1" => false,
            "wrong2" => TestFn::constant(false.into()),
            "ignored" => "text",
        };
        let specs = normalize(&tests).unwrap();
        assert_eq!(names(&specs), vec![Some("wrong1"), Some("wrong2")]);
    }

    #[test]
    fn test_normalize_rejects_other_kinds() {
        let err = normalize(&Value::from(true)).unwrap_err();
        assert!(matches!(err, HarnessError::UnsupportedTests(Kind::Boolean)));
        assert!(normalize(&Value::Undefined).is_err());
    }

    #[test]
    fn test_function_identity() {
        let f = TestFn::constant(true.into());
        let g = f.clone();
        assert!(f.same(&g));
        assert!(!f.same(&TestFn::constant(true.into())));
    }

    #[test]
    fn test_registrar_collects_batches() {
        let mut registrar = Registrar::default();
        registrar.register(array!["t", true]);
        registrar.register_with(map! { "a" => true }, || {});
        assert_eq!(registrar.len(), 2);
        let batches = registrar.into_batches();
        assert!(batches[0].on_complete.is_none());
        assert!(batches[1].on_complete.is_some());
    }
}
