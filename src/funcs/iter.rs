//! Iterator built-ins backing the foreach construct.
//!
//! `@initIteratorK/V/KV` materialise the keys and/or values of a
//! source value into an opaque cursor; `@iteratorStep` advances it and
//! reports whether an element remains; `@iteratorKey`/`@iteratorVal`
//! read the current element.

use crate::funcs::FuncError;
use crate::value::Value;
use std::sync::{Arc, Mutex};

/// Materialised iteration state: parallel key/value lists and a cursor
/// starting before the first element.
#[derive(Debug)]
pub struct IterState {
    with_key: bool,
    with_val: bool,
    cur: isize,
    len: usize,
    keys: Vec<Value>,
    values: Vec<Value>,
}

/// Shared handle to iterator state, held in a variable slot for the
/// duration of one foreach loop.
#[derive(Debug, Clone)]
pub struct IterHandle(Arc<Mutex<IterState>>);

impl IterHandle {
    pub(crate) fn ptr_eq(&self, other: &IterHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl IterState {
    fn build(data: &Value, with_key: bool, with_val: bool) -> Result<IterState, FuncError> {
        let mut state = IterState {
            with_key,
            with_val,
            cur: -1,
            len: 0,
            keys: Vec::new(),
            values: Vec::new(),
        };
        state.fill(data)?;
        Ok(state)
    }

    fn fill(&mut self, data: &Value) -> Result<(), FuncError> {
        match data {
            Value::Raw(_) => self.fill(&data.decoded()?),
            Value::Array(items) => {
                self.len = items.len();
                for (i, item) in items.iter().enumerate() {
                    if self.with_key {
                        self.keys.push(Value::Int(i as i64));
                    }
                    if self.with_val {
                        self.values.push(item.clone());
                    }
                }
                Ok(())
            }
            Value::Object(map) => {
                self.len = map.len();
                for (key, val) in map {
                    if self.with_key {
                        self.keys.push(Value::Str(key.clone()));
                    }
                    if self.with_val {
                        self.values.push(val.clone());
                    }
                }
                Ok(())
            }
            // Scalars and natives iterate zero times.
            _ => Ok(()),
        }
    }
}

fn init(args: &[Value], with_key: bool, with_val: bool) -> Result<Value, FuncError> {
    let state = IterState::build(&args[0], with_key, with_val)?;
    Ok(Value::Iter(IterHandle(Arc::new(Mutex::new(state)))))
}

pub fn init_keys(args: &[Value]) -> Result<Value, FuncError> {
    init(args, true, false)
}

pub fn init_values(args: &[Value]) -> Result<Value, FuncError> {
    init(args, false, true)
}

pub fn init_entries(args: &[Value]) -> Result<Value, FuncError> {
    init(args, true, true)
}

fn with_state<T>(
    args: &[Value],
    f: impl FnOnce(&mut IterState) -> T,
) -> Result<T, FuncError> {
    match &args[0] {
        Value::Iter(handle) => {
            let mut state = handle
                .0
                .lock()
                .map_err(|_| FuncError::new("iterator state poisoned"))?;
            Ok(f(&mut state))
        }
        other => Err(FuncError::new(format!(
            "incorrect arg type: want iterator got {}",
            other.kind_name()
        ))),
    }
}

/// Advance the cursor; true while an element remains.
pub fn step(args: &[Value]) -> Result<Value, FuncError> {
    with_state(args, |state| {
        state.cur += 1;
        Value::Bool((state.cur as usize) < state.len)
    })
}

pub fn key(args: &[Value]) -> Result<Value, FuncError> {
    with_state(args, |state| {
        if !state.with_key || state.cur < 0 {
            return Value::Null;
        }
        state.keys.get(state.cur as usize).cloned().unwrap_or(Value::Null)
    })
}

pub fn value(args: &[Value]) -> Result<Value, FuncError> {
    with_state(args, |state| {
        if !state.with_val || state.cur < 0 {
            return Value::Null;
        }
        state
            .values
            .get(state.cur as usize)
            .cloned()
            .unwrap_or(Value::Null)
    })
}
