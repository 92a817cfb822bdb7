//! Lowering from the AST to a linear, symbolic pseudo-instruction list.
//!
//! # Design
//!
//! - Names starting with `@` are temporaries (and labels — the shared
//!   counter keeps them unique); `%name` is a sub-template constant;
//!   everything else is a user or built-in variable.
//! - Pseudo-ops `Label`, `FreeTemp`, and `Const` exist only in this
//!   representation; the compiler consumes them while resolving.
//! - A `FreeTemp` is emitted as soon as a temporary's last reader has
//!   been scheduled, which lets the compiler's free-list hand the same
//!   slot to the very next allocation — including the consuming call's
//!   own target.

use crate::ast::{Node, NodeKind};
use crate::position::Position;

/// Pseudo-instruction kind. The first four survive into bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Call,
    Jmp,
    JmpIfEmpty,
    JmpIfNotEmpty,
    Label,
    FreeTemp,
    Const,
}

/// One symbolic pseudo-instruction.
///
/// `target` is a variable name for `Call`, a label name for jumps and
/// `Label`, and a temp name for `FreeTemp`/`Const`. `args` holds
/// argument names for `Call`, the condition name for conditional jumps,
/// and the literal JSON text for `Const`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpCode {
    pub kind: OpKind,
    pub target: String,
    pub func: String,
    pub args: Vec<String>,
    pub pos: Position,
}

impl OpCode {
    fn call(target: impl Into<String>, func: &str, args: Vec<String>, pos: Position) -> Self {
        OpCode {
            kind: OpKind::Call,
            target: target.into(),
            func: func.to_string(),
            args,
            pos,
        }
    }

    fn label(name: &str) -> Self {
        OpCode {
            kind: OpKind::Label,
            target: name.to_string(),
            func: String::new(),
            args: Vec::new(),
            pos: Position::default(),
        }
    }
}

/// Lower a parsed code block to pseudo-instructions.
pub fn lower(root: &Node) -> Vec<OpCode> {
    let mut builder = OpBuilder { last_id: 0 };
    builder.build(Some(root))
}

struct OpBuilder {
    last_id: usize,
}

impl OpBuilder {
    fn new_id(&mut self) -> String {
        self.last_id += 1;
        format!("@{}", self.last_id)
    }

    fn build(&mut self, node: Option<&Node>) -> Vec<OpCode> {
        let node = match node {
            Some(n) => n,
            None => return Vec::new(),
        };
        match node.kind {
            NodeKind::CodeBlock => self.build_code_block(node),
            NodeKind::If => self.build_if(node),
            NodeKind::For => self.build_for(node),
            NodeKind::Foreach => self.build_foreach(node),
            NodeKind::SetVar => self.build_set_var(node),
            NodeKind::JsonSet => self.build_json_op("@jsonSet", node),
            NodeKind::Append => self.build_json_op("@append", node),
            // The parser never places other kinds in statement position.
            other => unreachable!("statement lowering on {:?}", other),
        }
    }

    fn build_code_block(&mut self, node: &Node) -> Vec<OpCode> {
        let mut code = Vec::new();
        for child in &node.children {
            code.extend(self.build(child.as_ref()));
        }
        code
    }

    fn build_if(&mut self, node: &Node) -> Vec<OpCode> {
        let cond = node.child(0).expect("if condition");
        let pos = cond.start;
        let (cond_var, mut code) = self.build_data_primitive(cond);
        code.extend(self.free_temps(&[cond_var.clone()]));

        let then_code = self.build(node.child(1));
        let else_code = self.build(node.child(2));

        let tail = match (then_code.is_empty(), else_code.is_empty()) {
            (true, true) => return Vec::new(),
            (false, true) => self.make_if_then(&cond_var, then_code, pos),
            (true, false) => self.make_if_else(&cond_var, else_code, pos),
            (false, false) => self.make_if_then_else(&cond_var, then_code, else_code, pos),
        };
        code.extend(tail);
        code
    }

    /// if var { then }:
    /// ```text
    /// jmpIfEmpty var -> @end
    /// then
    /// @end
    /// ```
    fn make_if_then(&mut self, cond: &str, then_code: Vec<OpCode>, pos: Position) -> Vec<OpCode> {
        let lbl_end = self.new_id();
        let mut code = Vec::with_capacity(then_code.len() + 2);
        code.push(OpCode {
            kind: OpKind::JmpIfEmpty,
            target: lbl_end.clone(),
            func: String::new(),
            args: vec![cond.to_string()],
            pos,
        });
        code.extend(then_code);
        code.push(OpCode::label(&lbl_end));
        code
    }

    /// if var {} else { else }:
    /// ```text
    /// jmpIfNotEmpty var -> @end
    /// else
    /// @end
    /// ```
    fn make_if_else(&mut self, cond: &str, else_code: Vec<OpCode>, pos: Position) -> Vec<OpCode> {
        let lbl_end = self.new_id();
        let mut code = Vec::with_capacity(else_code.len() + 2);
        code.push(OpCode {
            kind: OpKind::JmpIfNotEmpty,
            target: lbl_end.clone(),
            func: String::new(),
            args: vec![cond.to_string()],
            pos,
        });
        code.extend(else_code);
        code.push(OpCode::label(&lbl_end));
        code
    }

    /// if var { then } else { else }:
    /// ```text
    /// jmpIfEmpty var -> @else
    /// then
    /// jmp @end
    /// @else
    /// else
    /// @end
    /// ```
    fn make_if_then_else(
        &mut self,
        cond: &str,
        then_code: Vec<OpCode>,
        else_code: Vec<OpCode>,
        pos: Position,
    ) -> Vec<OpCode> {
        let lbl_else = self.new_id();
        let lbl_end = self.new_id();
        let mut code = Vec::with_capacity(then_code.len() + else_code.len() + 4);
        code.push(OpCode {
            kind: OpKind::JmpIfEmpty,
            target: lbl_else.clone(),
            func: String::new(),
            args: vec![cond.to_string()],
            pos,
        });
        code.extend(then_code);
        code.push(OpCode {
            kind: OpKind::Jmp,
            target: lbl_end.clone(),
            func: String::new(),
            args: Vec::new(),
            pos,
        });
        code.push(OpCode::label(&lbl_else));
        code.extend(else_code);
        code.push(OpCode::label(&lbl_end));
        code
    }

    /// C-style condition loop:
    /// ```text
    /// @head
    /// <condition code>
    /// jmpIfEmpty cond -> @end
    /// body
    /// jmp @head
    /// @end
    /// ```
    fn build_for(&mut self, node: &Node) -> Vec<OpCode> {
        let (cond_var, cond_code) = self.build_data_primitive(node.child(0).expect("for cond"));
        let body_code = self.build(node.child(1));
        let clear_tmp = self.free_temps(&[cond_var.clone()]);
        let lbl_head = self.new_id();
        let lbl_end = self.new_id();

        let mut code = Vec::with_capacity(cond_code.len() + body_code.len() + 4);
        code.push(OpCode::label(&lbl_head));
        code.extend(cond_code);
        code.extend(clear_tmp);
        code.push(OpCode {
            kind: OpKind::JmpIfEmpty,
            target: lbl_end.clone(),
            func: String::new(),
            args: vec![cond_var],
            pos: node.start,
        });
        code.extend(body_code);
        code.push(OpCode {
            kind: OpKind::Jmp,
            target: lbl_head.clone(),
            func: String::new(),
            args: Vec::new(),
            pos: node.start,
        });
        code.push(OpCode::label(&lbl_end));
        code
    }

    /// Key/value iteration:
    /// ```text
    /// <source code>
    /// call @it = @initIterator[K|V|KV](source)
    /// @head
    /// call @cond = @iteratorStep(@it)
    /// jmpIfEmpty @cond -> @end
    /// call k = @iteratorKey(@it)     ; if key used
    /// call v = @iteratorVal(@it)     ; if value used
    /// body
    /// jmp @head
    /// @end
    /// ```
    fn build_foreach(&mut self, node: &Node) -> Vec<OpCode> {
        let key_name = node.child(0).map(|n| n.data.clone());
        let val_name = node.child(1).map(|n| n.data.clone());

        let lbl_head = self.new_id();
        let lbl_end = self.new_id();
        let var_iter = self.new_id();
        let var_cond = self.new_id();

        let (src_var, mut code) = self.build_data_primitive(node.child(2).expect("foreach source"));
        code.extend(self.free_temps(&[src_var.clone()]));

        let init_fn = match (&key_name, &val_name) {
            (Some(_), Some(_)) => "@initIteratorKV",
            (Some(_), None) => "@initIteratorK",
            (None, Some(_)) => "@initIteratorV",
            (None, None) => "@initIterator",
        };
        code.push(OpCode::call(
            var_iter.clone(),
            init_fn,
            vec![src_var],
            node.start,
        ));

        code.push(OpCode::label(&lbl_head));
        code.push(OpCode::call(
            var_cond.clone(),
            "@iteratorStep",
            vec![var_iter.clone()],
            node.start,
        ));
        code.extend(self.free_temps(&[var_cond.clone()]));
        code.push(OpCode {
            kind: OpKind::JmpIfEmpty,
            target: lbl_end.clone(),
            func: String::new(),
            args: vec![var_cond],
            pos: node.start,
        });

        if let Some(key) = key_name {
            code.push(OpCode::call(
                key,
                "@iteratorKey",
                vec![var_iter.clone()],
                node.start,
            ));
        }
        if let Some(val) = val_name {
            code.push(OpCode::call(
                val,
                "@iteratorVal",
                vec![var_iter.clone()],
                node.start,
            ));
        }

        code.extend(self.build(node.child(3)));

        code.push(OpCode {
            kind: OpKind::Jmp,
            target: lbl_head,
            func: String::new(),
            args: Vec::new(),
            pos: node.start,
        });
        code.push(OpCode::label(&lbl_end));
        code.extend(self.free_temps(&[var_iter]));
        code
    }

    /// `v = e` — by-value: the clone built-in turns composites into
    /// raw JSON blobs before they land in the slot.
    fn build_set_var(&mut self, node: &Node) -> Vec<OpCode> {
        let (data_var, mut code) = self.build_data_primitive(node.child(1).expect("setvar data"));
        code.extend(self.free_temps(&[data_var.clone()]));

        let var_name = node.child(0).expect("setvar target").data.clone();
        code.push(OpCode::call(
            var_name,
            "@clone",
            vec![data_var],
            node.start,
        ));
        code
    }

    /// `path = e` and `path[] = e`, as one shape:
    /// `call v = fn(v, data, k1, …, kn)`.
    fn build_json_op(&mut self, func: &str, node: &Node) -> Vec<OpCode> {
        let (data_var, mut code) = self.build_data_primitive(node.child(1).expect("data"));

        let path = node.child(0).expect("path");
        let var_name = path.child(0).expect("path head").data.clone();
        let mut keys = Vec::new();
        for key_node in path.children[1..].iter().flatten() {
            let (key_var, key_code) = self.build_data_primitive(key_node);
            code.extend(key_code);
            keys.push(key_var);
        }

        let mut args = vec![var_name.clone(), data_var.clone()];
        args.extend(keys.iter().cloned());
        code.push(OpCode::call(var_name, func, args, node.start));
        code.extend(self.free_temps(&[data_var]));
        code.extend(self.free_temps(&keys));
        code
    }

    /// Lower an expression; returns the name its value lives in plus
    /// the code that computes it. A bare variable name emits no code.
    fn build_data_primitive(&mut self, node: &Node) -> (String, Vec<OpCode>) {
        match node.kind {
            NodeKind::Const => {
                let name = self.new_id();
                let op = OpCode {
                    kind: OpKind::Const,
                    target: name.clone(),
                    func: String::new(),
                    args: vec![node.data.clone()],
                    pos: node.start,
                };
                (name, vec![op])
            }
            NodeKind::StrTemplate => {
                let template_name = format!("%{}", node.child(0).expect("template name").data);
                let (arg_name, mut code) =
                    self.build_data_primitive(node.child(1).expect("template param"));
                code.extend(self.free_temps(&[arg_name.clone()]));
                let target = self.new_id();
                code.push(OpCode::call(
                    target.clone(),
                    "@strTemplate",
                    vec![template_name, arg_name],
                    node.start,
                ));
                (target, code)
            }
            NodeKind::Function => {
                let fn_name = node.child(0).expect("function name").data.clone();
                let mut args = Vec::new();
                let mut code = Vec::new();
                for arg_node in node.children[1..].iter().flatten() {
                    let (arg_name, arg_code) = self.build_data_primitive(arg_node);
                    code.extend(arg_code);
                    args.push(arg_name);
                }
                code.extend(self.free_temps(&args));
                let target = self.new_id();
                code.push(OpCode::call(target.clone(), &fn_name, args, node.start));
                (target, code)
            }
            NodeKind::VarPath => {
                let var_name = node.child(0).expect("path head").data.clone();
                let mut path = vec![var_name];
                let mut code = Vec::new();
                for key_node in node.children[1..].iter().flatten() {
                    let (key_name, key_code) = self.build_data_primitive(key_node);
                    code.extend(key_code);
                    path.push(key_name);
                }
                code.extend(self.free_temps(&path));
                let target = self.new_id();
                code.push(OpCode::call(target.clone(), "@get", path, node.start));
                (target, code)
            }
            NodeKind::VarName => (node.data.clone(), Vec::new()),
            other => unreachable!("expression lowering on {:?}", other),
        }
    }

    /// Free pseudo-ops for every temporary in `names`; non-`@` names
    /// are named variables or constants and are skipped.
    fn free_temps(&mut self, names: &[String]) -> Vec<OpCode> {
        names
            .iter()
            .filter(|name| name.starts_with('@'))
            .map(|name| OpCode {
                kind: OpKind::FreeTemp,
                target: name.clone(),
                func: String::new(),
                args: Vec::new(),
                pos: Position::default(),
            })
            .collect()
    }
}
