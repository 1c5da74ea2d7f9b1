//! Placeholder substitution in release environment values.
//!
//! Supported placeholders:
//!
//! - `{{ getenv "NAME" }}`: the bootstrap process's env var (empty if unset)
//! - `{{ step "step-id" "path.to.field" }}`: a field of an earlier step's
//!   recorded data; strings are inserted verbatim, other JSON values in
//!   their JSON form

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{BootstrapError, Result};
use crate::formation::Release;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
static ARG_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([a-z]+)((?:\s+"[^"]*")*)\s*\}\}"#).expect("valid placeholder regex")
    })
}

fn arg_re() -> &'static Regex {
    ARG_RE.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("valid argument regex"))
}

/// Substitute every placeholder in `input`.
pub fn interpolate(
    input: &str,
    step_data: &HashMap<String, Value>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in placeholder_re().captures_iter(input) {
        let whole = caps.get(0).expect("match 0 is always present");
        let func = &caps[1];
        let args: Vec<&str> = arg_re()
            .captures_iter(caps.get(2).map_or("", |m| m.as_str()))
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        let fail = |reason: &str| BootstrapError::Interpolate {
            placeholder: whole.as_str().to_string(),
            reason: reason.to_string(),
        };

        let value = match (func, args.as_slice()) {
            ("getenv", [name]) => env(name).unwrap_or_default(),
            ("step", [step, path]) => {
                let data = step_data
                    .get(*step)
                    .ok_or_else(|| fail("no data recorded for step"))?;
                let field = lookup(data, path).ok_or_else(|| fail("field not found"))?;
                match field {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }
            }
            ("getenv", _) | ("step", _) => return Err(fail("wrong number of arguments")),
            _ => return Err(fail("unknown function")),
        };

        out.push_str(&input[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }

    out.push_str(&input[last..]);
    Ok(out)
}

fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|p| !p.is_empty())
        .try_fold(data, |v, key| match v {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Interpolate every env value of `release` in place using the process
/// environment.
pub fn interpolate_release(release: &mut Release, step_data: &HashMap<String, Value>) -> Result<()> {
    let env = |name: &str| std::env::var(name).ok();
    for value in release.env.values_mut() {
        if value.contains("{{") {
            *value = interpolate(value, step_data, &env)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn plain_strings_pass_through() {
        let data = HashMap::new();
        assert_eq!(interpolate("hello", &data, &no_env).unwrap(), "hello");
    }

    #[test]
    fn getenv_substitutes_and_defaults_to_empty() {
        let data = HashMap::new();
        let env = |k: &str| (k == "DOMAIN").then(|| "example.com".to_string());
        assert_eq!(
            interpolate(r#"https://{{ getenv "DOMAIN" }}/x"#, &data, &env).unwrap(),
            "https://example.com/x"
        );
        assert_eq!(
            interpolate(r#"[{{getenv "MISSING"}}]"#, &data, &env).unwrap(),
            "[]"
        );
    }

    #[test]
    fn step_reads_nested_fields() {
        let mut data = HashMap::new();
        data.insert(
            "pg".to_string(),
            json!({"resources": [{"env": {"PGHOST": "10.0.0.9"}}], "port": 5432}),
        );
        assert_eq!(
            interpolate(
                r#"{{ step "pg" "resources.0.env.PGHOST" }}:{{ step "pg" "port" }}"#,
                &data,
                &no_env
            )
            .unwrap(),
            "10.0.0.9:5432"
        );
    }

    #[test]
    fn missing_step_is_error() {
        let data = HashMap::new();
        let err = interpolate(r#"{{ step "nope" "x" }}"#, &data, &no_env).unwrap_err();
        assert!(err.to_string().contains("no data recorded"));
    }

    #[test]
    fn unknown_function_is_error() {
        let data = HashMap::new();
        let err = interpolate(r#"{{ md5sum "x" }}"#, &data, &no_env).unwrap_err();
        assert!(err.to_string().contains("unknown function"));
    }

    #[test]
    fn release_values_are_rewritten_in_place() {
        let mut data = HashMap::new();
        data.insert("key".to_string(), json!({"data": "s3cr3t"}));
        let mut release = Release::default();
        release
            .env
            .insert("AUTH_KEY".into(), r#"{{ step "key" "data" }}"#.into());
        release.env.insert("PLAIN".into(), "value".into());

        interpolate_release(&mut release, &data).unwrap();
        assert_eq!(release.env["AUTH_KEY"], "s3cr3t");
        assert_eq!(release.env["PLAIN"], "value");
    }
}
