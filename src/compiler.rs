//! Resolution from symbolic op-codes to executable bytecode.
//!
//! # Design
//!
//! Two passes over the op-code list:
//!
//! 1. **Resolve** — bind every name to a (region, slot), intern labels
//!    to the index of the next real instruction, intern inline JSON
//!    constants by their literal text, resolve function names, and run
//!    the temp-slot free list.
//! 2. **Emit** — translate every surviving instruction to numeric
//!    operands and validate call arity against the resolved signature.
//!
//! Slots 0 and 1 of the variable region are pre-bound to `result` and
//! `args`. A configured prototype seeds the program with
//! `call result = @clone(<proto>)` before any user code, and the label
//! counter accounts for it.

use crate::bytecode::{DataRef, Instr, Op, Region};
use crate::error::{CompileError, CompileErrorKind, Error};
use crate::funcs::{self, FuncDef};
use crate::lexer::tokenize;
use crate::opcode::{lower, OpCode, OpKind};
use crate::parser::parse;
use crate::position::Position;
use crate::strtpl::StrTemplate;
use crate::template::Options;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Everything a `Template` needs to execute.
#[derive(Debug)]
pub(crate) struct Compiled {
    pub functions: Vec<Arc<FuncDef>>,
    pub const_data: Vec<Value>,
    pub var_data_size: usize,
    pub code: Vec<Instr>,
}

/// Run the full pipeline: tokenize, parse, lower, resolve, emit.
pub(crate) fn compile(options: &Options, source: &str) -> Result<Compiled, Error> {
    let tokens = tokenize(source)?;
    let ast = parse(&tokens)?;
    let ops = lower(&ast);

    let mut compiler = Compiler::new(options);
    compiler.init()?;
    compiler.resolve(&ops)?;
    compiler.emit(&ops)?;

    debug!(
        instructions = compiler.code.len(),
        constants = compiler.const_data.len(),
        var_slots = compiler.var_data_size,
        "template compiled"
    );
    Ok(Compiled {
        functions: compiler.functions,
        const_data: compiler.const_data,
        var_data_size: compiler.var_data_size,
        code: compiler.code,
    })
}

struct Compiler<'opts> {
    options: &'opts Options,
    code: Vec<Instr>,
    name_refs: HashMap<String, DataRef>,
    const_data: Vec<Value>,
    functions: Vec<Arc<FuncDef>>,
    fn_ids: HashMap<String, usize>,
    labels: HashMap<String, usize>,
    var_data_size: usize,
    /// Free-list state, indexed by temp id.
    tmp_free: Vec<bool>,
    /// Temp id -> variable slot.
    tmp_slots: Vec<usize>,
    /// Variable slot -> temp id, for slots that belong to temps.
    slot_tmps: HashMap<usize, usize>,
    /// Inline literal text -> constant slot.
    inline_consts: HashMap<String, usize>,
}

impl<'opts> Compiler<'opts> {
    fn new(options: &'opts Options) -> Self {
        Compiler {
            options,
            code: Vec::new(),
            name_refs: HashMap::new(),
            const_data: Vec::new(),
            functions: Vec::new(),
            fn_ids: HashMap::new(),
            labels: HashMap::new(),
            var_data_size: 0,
            tmp_free: Vec::new(),
            tmp_slots: Vec::new(),
            slot_tmps: HashMap::new(),
            inline_consts: HashMap::new(),
        }
    }

    /// Pre-bind the named slots and register everything the options
    /// carry: prototype, constants, compiled sub-templates.
    fn init(&mut self) -> Result<(), Error> {
        self.name_refs
            .insert("result".to_string(), DataRef::var(0));
        self.name_refs.insert("args".to_string(), DataRef::var(1));
        self.var_data_size = 2;

        let options = self.options;

        if let Some(proto) = &options.prototype {
            let cid = self.push_const(proto.clone());
            let func = self
                .function_id("@clone")
                .map_err(|kind| CompileError::new(kind, Position::default()))?;
            self.code.push(Instr {
                op: Op::Call {
                    target: 0,
                    func,
                    args: vec![DataRef::constant(cid)],
                },
                pos: Position::default(),
            });
        }

        for (name, value) in &options.constants {
            let cid = self.push_const(value.clone());
            self.name_refs
                .insert(name.clone(), DataRef::constant(cid));
        }

        for (name, source) in &options.templates {
            let template = StrTemplate::compile(name, source, &options.str_funcs)
                .map_err(|message| Error::StringTemplate {
                    name: name.clone(),
                    message,
                })?;
            let cid = self.push_const(Value::Tmpl(Arc::new(template)));
            self.name_refs
                .insert(format!("%{name}"), DataRef::constant(cid));
        }

        Ok(())
    }

    fn push_const(&mut self, value: Value) -> usize {
        self.const_data.push(value);
        self.const_data.len() - 1
    }

    /// Pass 1: walk the op-codes, assigning slots and interning labels
    /// and constants. Pseudo-ops do not advance the instruction index.
    fn resolve(&mut self, ops: &[OpCode]) -> Result<(), CompileError> {
        let mut next_index = self.code.len();
        for op in ops {
            if matches!(
                op.kind,
                OpKind::Call | OpKind::Jmp | OpKind::JmpIfEmpty | OpKind::JmpIfNotEmpty
            ) {
                next_index += 1;
            }
            let result = match op.kind {
                OpKind::Call => self
                    .bind_target(&op.target)
                    .and_then(|_| self.function_id(&op.func).map(|_| ())),
                OpKind::Label => {
                    self.labels.insert(op.target.clone(), next_index);
                    Ok(())
                }
                OpKind::FreeTemp => self.free_temp(&op.target),
                OpKind::Const => self.intern_inline(&op.target, &op.args[0]),
                _ => Ok(()),
            };
            result.map_err(|kind| CompileError::new(kind, op.pos))?;
        }
        Ok(())
    }

    /// Resolve a function name: user functions first, then built-ins.
    fn function_id(&mut self, name: &str) -> Result<usize, CompileErrorKind> {
        if let Some(&id) = self.fn_ids.get(name) {
            return Ok(id);
        }
        let def = self
            .options
            .functions
            .get(name)
            .cloned()
            .or_else(|| funcs::builtin(name))
            .ok_or_else(|| CompileErrorKind::FunctionNotFound(name.to_string()))?;
        let id = self.functions.len();
        self.functions.push(def);
        self.fn_ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Ensure a call target has a variable slot: named variables get a
    /// fresh slot once, temporaries reuse the lowest free temp slot.
    fn bind_target(&mut self, name: &str) -> Result<(), CompileErrorKind> {
        if let Some(r) = self.name_refs.get(name) {
            if r.region == Region::Const {
                return Err(CompileErrorKind::AssignToConst(name.to_string()));
            }
            return Ok(());
        }

        if !name.starts_with('@') {
            let slot = self.var_data_size;
            self.var_data_size += 1;
            self.name_refs.insert(name.to_string(), DataRef::var(slot));
            return Ok(());
        }

        if let Some(tmp) = self.tmp_free.iter().position(|&free| free) {
            self.tmp_free[tmp] = false;
            self.name_refs
                .insert(name.to_string(), DataRef::var(self.tmp_slots[tmp]));
            return Ok(());
        }

        let slot = self.var_data_size;
        self.var_data_size += 1;
        let tmp = self.tmp_slots.len();
        self.tmp_free.push(false);
        self.tmp_slots.push(slot);
        self.slot_tmps.insert(slot, tmp);
        self.name_refs.insert(name.to_string(), DataRef::var(slot));
        Ok(())
    }

    fn free_temp(&mut self, name: &str) -> Result<(), CompileErrorKind> {
        let r = self
            .name_refs
            .get(name)
            .ok_or_else(|| CompileErrorKind::UnknownReference(name.to_string()))?;
        if r.region == Region::Const {
            return Ok(());
        }
        if let Some(&tmp) = self.slot_tmps.get(&r.slot) {
            self.tmp_free[tmp] = true;
        }
        Ok(())
    }

    /// Bind an inline literal, interning byte-identical text to one
    /// constant slot. Scalars decode to scalar values; composite
    /// literals stay raw for lazy structural use.
    fn intern_inline(&mut self, name: &str, text: &str) -> Result<(), CompileErrorKind> {
        if let Some(&cid) = self.inline_consts.get(text) {
            self.name_refs
                .insert(name.to_string(), DataRef::constant(cid));
            return Ok(());
        }
        let parsed: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| CompileErrorKind::InvalidJson(e.to_string()))?;
        let value = match &parsed {
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Value::raw(text),
            _ => Value::from(parsed),
        };
        let cid = self.push_const(value);
        self.inline_consts.insert(text.to_string(), cid);
        self.name_refs
            .insert(name.to_string(), DataRef::constant(cid));
        Ok(())
    }

    /// Pass 2: emit bytecode with numeric operands, validating arity.
    fn emit(&mut self, ops: &[OpCode]) -> Result<(), CompileError> {
        for op in ops {
            let instr = match op.kind {
                OpKind::Call => self.emit_call(op)?,
                OpKind::Jmp => Op::Jmp {
                    target: self.label_index(&op.target, op.pos)?,
                },
                OpKind::JmpIfEmpty => Op::JmpIfEmpty {
                    target: self.label_index(&op.target, op.pos)?,
                    cond: self.data_ref(&op.args[0], op.pos)?,
                },
                OpKind::JmpIfNotEmpty => Op::JmpIfNotEmpty {
                    target: self.label_index(&op.target, op.pos)?,
                    cond: self.data_ref(&op.args[0], op.pos)?,
                },
                _ => continue,
            };
            self.code.push(Instr {
                op: instr,
                pos: op.pos,
            });
        }
        Ok(())
    }

    fn emit_call(&mut self, op: &OpCode) -> Result<Op, CompileError> {
        let func = self
            .fn_ids
            .get(&op.func)
            .copied()
            .ok_or_else(|| {
                CompileError::new(
                    CompileErrorKind::FunctionNotFound(op.func.clone()),
                    op.pos,
                )
            })?;

        let mut args = Vec::with_capacity(op.args.len());
        for name in &op.args {
            args.push(self.data_ref(name, op.pos)?);
        }

        let def = &self.functions[func];
        if def.is_variadic() {
            let want = def.param_count() - 1;
            if args.len() < want {
                return Err(CompileError::new(
                    CompileErrorKind::VariadicArityMismatch {
                        name: def.name().to_string(),
                        want,
                        got: args.len(),
                    },
                    op.pos,
                ));
            }
        } else if args.len() != def.param_count() {
            return Err(CompileError::new(
                CompileErrorKind::ArityMismatch {
                    name: def.name().to_string(),
                    want: def.param_count(),
                    got: args.len(),
                },
                op.pos,
            ));
        }

        let target = self.data_ref(&op.target, op.pos)?;
        Ok(Op::Call {
            target: target.slot,
            func,
            args,
        })
    }

    fn data_ref(&self, name: &str, pos: Position) -> Result<DataRef, CompileError> {
        self.name_refs.get(name).copied().ok_or_else(|| {
            CompileError::new(CompileErrorKind::UnknownReference(name.to_string()), pos)
        })
    }

    fn label_index(&self, name: &str, pos: Position) -> Result<usize, CompileError> {
        self.labels.get(name).copied().ok_or_else(|| {
            CompileError::new(CompileErrorKind::UnknownLabel(name.to_string()), pos)
        })
    }
}
