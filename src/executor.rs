//! The virtual machine: a flat instruction-pointer loop over resolved
//! bytecode.
//!
//! # Design
//!
//! - Two data regions: the template's shared constants and a
//!   per-execution variable vector.
//! - `Call` gathers argument values, coerces each to its declared
//!   parameter kind, runs the handler inside a panic guard, and writes
//!   the result into the target slot.
//! - Any failure becomes a [`RuntimeError`] carrying the instruction's
//!   source position.

use crate::bytecode::{DataRef, Instr, Op, Region};
use crate::error::RuntimeError;
use crate::funcs::{coerce, FuncDef, FuncError};
use crate::value::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::trace;

pub(crate) struct Vm<'t> {
    pub consts: &'t [Value],
    pub vars: Vec<Value>,
    pub functions: &'t [Arc<FuncDef>],
    pub code: &'t [Instr],
}

impl Vm<'_> {
    /// Execute to completion and return the value left in `result`.
    pub fn run(mut self) -> Result<Value, RuntimeError> {
        let code = self.code;
        let mut ip = 0;
        while let Some(instr) = code.get(ip) {
            match &instr.op {
                Op::Jmp { target } => {
                    ip = *target;
                    continue;
                }
                Op::JmpIfEmpty { target, cond } => {
                    if self.read(*cond).is_empty() {
                        ip = *target;
                        continue;
                    }
                }
                Op::JmpIfNotEmpty { target, cond } => {
                    if !self.read(*cond).is_empty() {
                        ip = *target;
                        continue;
                    }
                }
                Op::Call { target, func, args } => {
                    let value = self
                        .call(*func, args)
                        .map_err(|e| RuntimeError::new(e.to_string(), instr.pos))?;
                    self.vars[*target] = value;
                }
            }
            ip += 1;
        }
        Ok(std::mem::take(&mut self.vars[0]))
    }

    fn call(&self, func: usize, args: &[DataRef]) -> Result<Value, FuncError> {
        let def = &self.functions[func];
        trace!(func = def.name(), args = args.len(), "call");

        let mut values = Vec::with_capacity(args.len());
        for (i, r) in args.iter().enumerate() {
            let value = self.read(*r).clone();
            values.push(coerce(value, def.param_kind(i)).map_err(|e| {
                FuncError::new(format!("{}: {}", def.name(), e))
            })?);
        }

        match catch_unwind(AssertUnwindSafe(|| def.call(&values))) {
            Ok(result) => result,
            Err(payload) => Err(FuncError::new(format!(
                "function {} panicked: {}",
                def.name(),
                panic_message(&payload)
            ))),
        }
    }

    fn read(&self, r: DataRef) -> &Value {
        match r.region {
            Region::Const => &self.consts[r.slot],
            Region::Var => &self.vars[r.slot],
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
