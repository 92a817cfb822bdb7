//! String sub-templates, invoked from template source as `.name(arg)`.
//!
//! The renderer behind the `@strTemplate` built-in. Deliberately small:
//! literal text plus `{{.field.path}}` substitutions and
//! `{{helper .field.path}}` calls into host-registered helpers. The
//! rest of the pipeline only sees the compile-then-render boundary, so
//! a richer engine can replace this one without touching the VM.

use crate::funcs::json::{json_get, string_key};
use crate::funcs::FuncError;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Helper function callable from inside a sub-template action.
pub type HelperFn = dyn Fn(&Value) -> Result<String, FuncError> + Send + Sync;

/// Named helpers supplied via `Options::string_functions`.
pub type HelperMap = HashMap<String, Arc<HelperFn>>;

/// A compiled sub-template: literal text interleaved with actions.
pub struct StrTemplate {
    name: String,
    segments: Vec<Segment>,
}

enum Segment {
    Text(String),
    /// `{{.a.b}}` — string-coerced lookup into the params value.
    Field(Vec<Value>),
    /// `{{helper .a.b}}` — helper call on the looked-up value.
    Call {
        helper_name: String,
        helper: Arc<HelperFn>,
        path: Vec<Value>,
    },
}

impl StrTemplate {
    /// Compile sub-template source, resolving helper names eagerly.
    pub fn compile(
        name: &str,
        source: &str,
        helpers: &HelperMap,
    ) -> Result<StrTemplate, String> {
        let mut segments = Vec::new();
        let mut rest = source;
        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| "unclosed {{ action".to_string())?;
            segments.push(parse_action(after[..close].trim(), helpers)?);
            rest = &after[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        Ok(StrTemplate {
            name: name.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render against a params value.
    pub fn render(&self, params: &Value) -> Result<String, FuncError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(path) => {
                    let value = json_get(params, path)?;
                    out.push_str(&string_key(&value)?);
                }
                Segment::Call {
                    helper_name,
                    helper,
                    path,
                } => {
                    let value = json_get(params, path)?;
                    let rendered = helper(&value).map_err(|e| {
                        FuncError::new(format!("helper {helper_name}: {e}"))
                    })?;
                    out.push_str(&rendered);
                }
            }
        }
        Ok(out)
    }
}

fn parse_action(action: &str, helpers: &HelperMap) -> Result<Segment, String> {
    if action.is_empty() {
        return Err("empty {{ }} action".to_string());
    }
    if action.starts_with('.') {
        return Ok(Segment::Field(parse_path(action)?));
    }
    let mut parts = action.split_whitespace();
    let helper_name = parts.next().expect("action is non-empty");
    let path_expr = parts
        .next()
        .ok_or_else(|| format!("helper {helper_name} needs a .field argument"))?;
    if parts.next().is_some() {
        return Err(format!("helper {helper_name} takes one argument"));
    }
    let helper = helpers
        .get(helper_name)
        .cloned()
        .ok_or_else(|| format!("function {helper_name} not defined"))?;
    Ok(Segment::Call {
        helper_name: helper_name.to_string(),
        helper,
        path: parse_path(path_expr)?,
    })
}

/// `.a.b` into lookup keys; `.` alone is the whole params value.
fn parse_path(expr: &str) -> Result<Vec<Value>, String> {
    if !expr.starts_with('.') {
        return Err(format!("expected a .field path, got `{expr}`"));
    }
    if expr == "." {
        return Ok(Vec::new());
    }
    expr[1..]
        .split('.')
        .map(|segment| {
            if segment.is_empty() {
                Err(format!("bad field path `{expr}`"))
            } else {
                Ok(Value::Str(segment.to_string()))
            }
        })
        .collect()
}

/// `@strTemplate(tmpl, params)` — the VM-facing wrapper.
pub(crate) fn render_builtin(args: &[Value]) -> Result<Value, FuncError> {
    match &args[0] {
        Value::Tmpl(template) => Ok(Value::Str(template.render(&args[1])?)),
        other => Err(FuncError::new(format!(
            "incorrect arg type: want template got {}",
            other.kind_name()
        ))),
    }
}

impl fmt::Debug for StrTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrTemplate")
            .field("name", &self.name)
            .field("segments", &self.segments.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn helpers() -> HelperMap {
        let mut map: HelperMap = HashMap::new();
        map.insert(
            "upper".to_string(),
            Arc::new(|v: &Value| Ok(string_key(v)?.to_uppercase())),
        );
        map
    }

    #[test]
    fn literal_text_passes_through() {
        let t = StrTemplate::compile("t", "plain text", &helpers()).unwrap();
        assert_eq!(t.render(&Value::Null).unwrap(), "plain text");
    }

    #[test]
    fn field_substitution() {
        let t = StrTemplate::compile("t", "Hello, {{.name}}!", &helpers()).unwrap();
        let params = Value::from(json!({"name": "World"}));
        assert_eq!(t.render(&params).unwrap(), "Hello, World!");
    }

    #[test]
    fn nested_field_paths() {
        let t = StrTemplate::compile("t", "{{.a.b}}", &helpers()).unwrap();
        let params = Value::from(json!({"a": {"b": 7}}));
        assert_eq!(t.render(&params).unwrap(), "7");
    }

    #[test]
    fn whole_params_dot() {
        let t = StrTemplate::compile("t", "v={{.}}", &helpers()).unwrap();
        assert_eq!(t.render(&Value::Int(3)).unwrap(), "v=3");
    }

    #[test]
    fn helper_call() {
        let t = StrTemplate::compile("t", "{{upper .name}}", &helpers()).unwrap();
        let params = Value::from(json!({"name": "quiet"}));
        assert_eq!(t.render(&params).unwrap(), "QUIET");
    }

    #[test]
    fn unknown_helper_fails_at_compile() {
        let err = StrTemplate::compile("t", "{{nope .x}}", &helpers()).unwrap_err();
        assert!(err.contains("nope"));
    }

    #[test]
    fn unclosed_action_fails_at_compile() {
        let err = StrTemplate::compile("t", "a {{.x", &helpers()).unwrap_err();
        assert!(err.contains("unclosed"));
    }

    #[test]
    fn missing_fields_render_as_null() {
        let t = StrTemplate::compile("t", "{{.nope}}", &helpers()).unwrap();
        let params = Value::from(json!({}));
        assert_eq!(t.render(&params).unwrap(), "null");
    }
}
