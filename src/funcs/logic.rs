//! Comparison, arithmetic, and boolean built-ins.

use crate::funcs::FuncError;
use crate::value::Value;

/// `eq(a, b)` — structural equality after JSON normalisation (raw
/// blobs decode; integers compare equal to equal floats).
pub fn eq(args: &[Value]) -> Result<Value, FuncError> {
    let a = args[0].decoded()?;
    let b = args[1].decoded()?;
    Ok(Value::Bool(a == b))
}

enum Num {
    Int(i64),
    Float(f64),
}

fn numeric(v: &Value) -> Result<Option<Num>, FuncError> {
    match v {
        Value::Int(i) => Ok(Some(Num::Int(*i))),
        Value::Float(f) => Ok(Some(Num::Float(*f))),
        Value::Raw(_) => numeric(&v.decoded()?),
        _ => Ok(None),
    }
}

/// `sum(a, b)` — integer addition when both sides are integers, float
/// addition otherwise; non-numeric sides are errors.
pub fn sum(args: &[Value]) -> Result<Value, FuncError> {
    let a = numeric(&args[0])?
        .ok_or_else(|| FuncError::new("first argument is not numeric"))?;
    let b = numeric(&args[1])?
        .ok_or_else(|| FuncError::new("second argument is not numeric"))?;
    Ok(match (a, b) {
        (Num::Int(x), Num::Int(y)) => Value::Int(x.wrapping_add(y)),
        (Num::Int(x), Num::Float(y)) => Value::Float(x as f64 + y),
        (Num::Float(x), Num::Int(y)) => Value::Float(x + y as f64),
        (Num::Float(x), Num::Float(y)) => Value::Float(x + y),
    })
}

/// `and(…)` — true when every argument is non-empty; short-circuits.
pub fn and(args: &[Value]) -> Result<Value, FuncError> {
    Ok(Value::Bool(!args.iter().any(Value::is_empty)))
}

/// `or(…)` — true when any argument is non-empty; short-circuits.
pub fn or(args: &[Value]) -> Result<Value, FuncError> {
    Ok(Value::Bool(args.iter().any(|v| !v.is_empty())))
}

/// `not(v)` — the emptiness of `v`.
pub fn not(args: &[Value]) -> Result<Value, FuncError> {
    Ok(Value::Bool(args[0].is_empty()))
}
