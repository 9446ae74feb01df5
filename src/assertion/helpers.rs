//! Helper constructors for common test shapes

use crate::executor::call_guarded;
use crate::models::{Map, TestFn, Value};

/// Package several raw results into one mapping keyed by position.
///
/// Returned from a test, the entries become sub-verdicts named `test 1`,
/// `test 2`, and so on.
pub fn multi<I, V>(results: I) -> Value
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Value::Map(
        results
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.into()))
            .collect::<Map>(),
    )
}

/// Wrap a callable that must not fail.
///
/// Success reports `true`; whatever the callable returned is still judged.
pub fn safe(test: TestFn) -> TestFn {
    let name = test.name().map(str::to_owned);
    let wrapped = TestFn::new(move |reporter| {
        let returned = test.call(reporter.clone())?;
        reporter.report(true);
        Ok(returned)
    });
    match name {
        Some(name) => wrapped.with_name(name),
        None => wrapped,
    }
}

/// Wrap a callable that must fail.
///
/// With `expected`, the error text is also matched against it with `=~`, so a
/// string checks for a substring and a regexp for a pattern.
pub fn raise(test: TestFn, expected: Option<Value>) -> TestFn {
    let name = test.name().map(str::to_owned);
    let wrapped = TestFn::new(move |reporter| {
        let outcome = match call_guarded(&test, reporter) {
            Ok(_) => Value::Bool(false),
            Err(error) => match &expected {
                None => Value::Bool(true),
                Some(expected) => (error.to_string(), "=~", expected.clone()).into(),
            },
        };
        Ok(outcome)
    });
    match name {
        Some(name) => wrapped.with_name(name),
        None => wrapped,
    }
}
