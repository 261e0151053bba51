//! `{{ path }}` interpolation and nested value lookup.

use serde_json::Value;

use crate::types::Params;

/// Looks up `key` in `target`.
///
/// The whole key is tried as a flat entry first. Otherwise the key is split on
/// `.` and segments are accumulated until they name an object to descend into,
/// so `"a.b.c"` finds `{"a": {"b.c": 1}}` as well as `{"a": {"b": {"c": 1}}}`.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use translate_runtime::parser::get_value;
///
/// let table = json!({ "HOME": { "TITLE": "Welcome" } });
/// assert_eq!(get_value(&table, "HOME.TITLE"), Some(&json!("Welcome")));
/// assert_eq!(get_value(&table, "HOME.MISSING"), None);
/// ```
#[must_use]
pub fn get_value<'a>(target: &'a Value, key: &str) -> Option<&'a Value> {
    let map = target.as_object()?;
    if let Some(value) = map.get(key) {
        return Some(value);
    }

    let mut current = target;
    let mut pending = String::new();
    let mut segments = key.split('.').peekable();

    while let Some(segment) = segments.next() {
        pending.push_str(segment);
        let is_last = segments.peek().is_none();

        match current.get(pending.as_str()) {
            Some(next) if next.is_object() || is_last => {
                current = next;
                pending.clear();
            }
            _ if is_last => return None,
            _ => pending.push('.'),
        }
    }

    Some(current)
}

/// Replaces every `{{ path }}` placeholder in `template` with the matching
/// parameter.
///
/// Paths missing from `params`, or pointing at `null`, are replaced with an
/// empty string. Text that does not form a complete placeholder is copied
/// as-is. Without parameters the template is returned unchanged.
#[must_use]
pub fn interpolate_string(template: &str, params: Option<&Params>) -> String {
    let Some(params) = params else {
        return template.to_string();
    };
    let params = Value::Object(params.clone());

    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let (before, tail) = rest.split_at(start);
        output.push_str(before);

        match placeholder(tail) {
            Some((path, consumed)) => {
                output.push_str(&render(get_value(&params, path)));
                rest = tail.get(consumed..).unwrap_or_default();
            }
            None => {
                output.push('{');
                rest = tail.get(1..).unwrap_or_default();
            }
        }
    }

    output.push_str(rest);
    output
}

/// Parses a placeholder at the start of `text`, which begins with `{{`.
///
/// Returns the path and the number of bytes the placeholder spans.
fn placeholder(text: &str) -> Option<(&str, usize)> {
    let inner = text.get(2..)?;
    let end = inner.find("}}")?;
    let path = inner.get(..end)?.trim();

    let valid = !path.is_empty()
        && !path.contains(|c: char| c.is_whitespace() || c == '{' || c == '}');
    valid.then_some((path, end + 4))
}

/// Text substituted for a parameter value.
fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    #[rstest]
    #[case::flat("This is a test {{param}}", json!({"param": "with param"}), "This is a test with param")]
    #[case::spaced("Hi {{ name }}!", json!({"name": "Ann"}), "Hi Ann!")]
    #[case::wide_spacing("Hi {{   name\t}}!", json!({"name": "Ann"}), "Hi Ann!")]
    #[case::nested(
        "This is a test {{param.one}} {{param.two}}",
        json!({"param": {"one": "with param-1", "two": "and param-2"}}),
        "This is a test with param-1 and param-2"
    )]
    #[case::number("{{count}} items", json!({"count": 3}), "3 items")]
    #[case::boolean("flag={{on}}", json!({"on": true}), "flag=true")]
    #[case::repeated("{{a}}{{a}}", json!({"a": "x"}), "xx")]
    #[case::flat_dotted_param("{{a.b}}", json!({"a.b": "flat"}), "flat")]
    fn substitutes_placeholders(#[case] template: &str, #[case] values: Value, #[case] expected: &str) {
        assert_that!(interpolate_string(template, Some(&params(values))), eq(expected));
    }

    #[rstest]
    #[case::missing_key("Hello {{name}}", "Hello ")]
    #[case::missing_segment("Hello {{user.last}}", "Hello ")]
    #[case::null_value("Hello {{nothing}}", "Hello ")]
    fn missing_values_become_empty(#[case] template: &str, #[case] expected: &str) {
        let values = params(json!({ "user": { "first": "Ann" }, "nothing": null }));

        assert_that!(interpolate_string(template, Some(&values)), eq(expected));
    }

    #[rstest]
    #[case::unclosed("Hello {{name")]
    #[case::empty_path("Hello {{}}")]
    #[case::inner_space("Hello {{first name}}")]
    #[case::single_braces("Hello {name}")]
    #[case::triple_open("Hello {{{")]
    fn malformed_placeholders_pass_through(#[case] template: &str) {
        let values = params(json!({ "name": "Ann" }));

        assert_that!(interpolate_string(template, Some(&values)), eq(template));
    }

    #[googletest::test]
    fn extra_leading_brace_is_kept() {
        let values = params(json!({ "name": "Ann" }));

        expect_that!(interpolate_string("{{{name}}", Some(&values)), eq("{Ann"));
    }

    #[googletest::test]
    fn template_without_params_is_unchanged() {
        expect_that!(interpolate_string("Hello {{name}}", None), eq("Hello {{name}}"));
    }

    #[googletest::test]
    fn objects_render_as_json() {
        let values = params(json!({ "obj": { "a": 1 } }));

        expect_that!(interpolate_string("{{obj}}", Some(&values)), eq(r#"{"a":1}"#));
    }

    #[googletest::test]
    fn get_value_prefers_flat_keys() {
        let table = json!({ "a.b": "flat", "a": { "b": "nested" } });

        expect_that!(get_value(&table, "a.b"), some(eq(&json!("flat"))));
    }

    #[googletest::test]
    fn get_value_accumulates_dotted_segments() {
        let table = json!({ "a": { "b.c": "joined" } });

        expect_that!(get_value(&table, "a.b.c"), some(eq(&json!("joined"))));
    }

    #[googletest::test]
    fn get_value_returns_subtrees() {
        let table = json!({ "a": { "b": { "c": "leaf" } } });

        expect_that!(get_value(&table, "a.b"), some(eq(&json!({ "c": "leaf" }))));
    }

    #[googletest::test]
    fn get_value_does_not_descend_into_strings() {
        let table = json!({ "a": "text" });

        expect_that!(get_value(&table, "a.b"), none());
        expect_that!(get_value(&json!("text"), "a"), none());
    }
}
