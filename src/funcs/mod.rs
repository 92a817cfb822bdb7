//! Function handles and the built-in function table.
//!
//! # Design
//!
//! - [`FuncDef`] is the one calling convention for built-ins and user
//!   functions alike: declared parameter kinds, a variadic flag, and a
//!   handler returning one value or an error.
//! - The executor coerces each argument to its declared kind before the
//!   call; arguments past the end of a variadic signature coerce to the
//!   final parameter's kind.
//! - [`builtin`] looks up the read-only table populated once at first
//!   use and never mutated afterwards.

pub mod iter;
pub mod json;
pub mod logic;

use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Failure inside a function body. The executor wraps it with the
/// calling instruction's source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FuncError(String);

impl FuncError {
    pub fn new(message: impl Into<String>) -> Self {
        FuncError(message.into())
    }
}

impl From<serde_json::Error> for FuncError {
    fn from(e: serde_json::Error) -> Self {
        FuncError(e.to_string())
    }
}

/// Declared kind of one function parameter, used for pre-call coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any runtime value, passed through untouched.
    Any,
    Bool,
    Int,
    Float,
    Str,
    /// Iterator state produced by the `@initIterator*` built-ins.
    Iterator,
    /// A compiled string sub-template constant.
    Template,
}

impl ParamKind {
    fn name(self) -> &'static str {
        match self {
            ParamKind::Any => "any",
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "string",
            ParamKind::Iterator => "iterator",
            ParamKind::Template => "template",
        }
    }
}

/// Handler signature: one value out, or an error.
pub type FuncHandler = dyn Fn(&[Value]) -> Result<Value, FuncError> + Send + Sync;

/// A callable function handle with its signature metadata.
pub struct FuncDef {
    name: String,
    params: Vec<ParamKind>,
    variadic: bool,
    handler: Box<FuncHandler>,
}

impl FuncDef {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ParamKind>,
        variadic: bool,
        handler: impl Fn(&[Value]) -> Result<Value, FuncError> + Send + Sync + 'static,
    ) -> Self {
        FuncDef {
            name: name.into(),
            params,
            variadic,
            handler: Box::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count (a variadic tail counts as one).
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Kind the argument at `i` must coerce to.
    pub fn param_kind(&self, i: usize) -> ParamKind {
        if i < self.params.len() {
            self.params[i]
        } else {
            // Past the declared list: the variadic element kind.
            *self.params.last().unwrap_or(&ParamKind::Any)
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, FuncError> {
        (self.handler)(args)
    }
}

impl std::fmt::Debug for FuncDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuncDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("variadic", &self.variadic)
            .finish_non_exhaustive()
    }
}

/// Coerce `value` to the declared parameter kind.
///
/// Directly assignable values pass through; raw blobs decode into the
/// wanted kind; primitive numeric widenings convert; anything else is
/// an argument-type error.
pub fn coerce(value: Value, kind: ParamKind) -> Result<Value, FuncError> {
    let ok = match (&value, kind) {
        (_, ParamKind::Any) => true,
        (Value::Bool(_), ParamKind::Bool) => true,
        (Value::Int(_), ParamKind::Int) => true,
        (Value::Float(_), ParamKind::Float) => true,
        (Value::Str(_), ParamKind::Str) => true,
        (Value::Iter(_), ParamKind::Iterator) => true,
        (Value::Tmpl(_), ParamKind::Template) => true,
        _ => false,
    };
    if ok {
        return Ok(value);
    }

    if let Value::Raw(_) = value {
        let decoded = value.decoded()?;
        if !matches!(decoded, Value::Raw(_)) {
            return coerce(decoded, kind);
        }
    }

    match (&value, kind) {
        (Value::Int(i), ParamKind::Float) => Ok(Value::Float(*i as f64)),
        (Value::Float(f), ParamKind::Int) => Ok(Value::Int(*f as i64)),
        _ => Err(FuncError::new(format!(
            "incorrect arg type: want {} got {}",
            kind.name(),
            value.kind_name()
        ))),
    }
}

/// The read-only built-in function table.
static BUILTINS: LazyLock<HashMap<&'static str, Arc<FuncDef>>> = LazyLock::new(|| {
    let mut table: HashMap<&'static str, Arc<FuncDef>> = HashMap::new();
    let mut add = |name: &'static str, params: Vec<ParamKind>, variadic, f: fn(&[Value]) -> Result<Value, FuncError>| {
        table.insert(name, Arc::new(FuncDef::new(name, params, variadic, f)));
    };
    use ParamKind::{Any, Iterator, Template};

    add("@clone", vec![Any], false, json::clone);
    add("@get", vec![Any, Any], true, json::get);
    add("@jsonSet", vec![Any, Any, Any], true, json::set);
    add("@append", vec![Any, Any, Any], true, json::append);

    add("@initIteratorK", vec![Any], false, iter::init_keys);
    add("@initIteratorV", vec![Any], false, iter::init_values);
    add("@initIteratorKV", vec![Any], false, iter::init_entries);
    add("@iteratorStep", vec![Iterator], false, iter::step);
    add("@iteratorKey", vec![Iterator], false, iter::key);
    add("@iteratorVal", vec![Iterator], false, iter::value);

    add(
        "@strTemplate",
        vec![Template, Any],
        false,
        crate::strtpl::render_builtin,
    );

    add("eq", vec![Any, Any], false, logic::eq);
    add("sum", vec![Any, Any], false, logic::sum);
    add("and", vec![Any], true, logic::and);
    add("or", vec![Any], true, logic::or);
    add("not", vec![Any], false, logic::not);

    table
});

/// Look up a built-in function by name.
pub fn builtin(name: &str) -> Option<Arc<FuncDef>> {
    BUILTINS.get(name).cloned()
}
