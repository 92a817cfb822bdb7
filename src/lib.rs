//! # json-template
//!
//! A small domain-specific language for constructing JSON documents.
//! A template is parsed and compiled once, then executed any number of
//! times against a parameter value:
//!
//! ```
//! use json_template::{parse, Options, Value};
//! use serde_json::json;
//!
//! let template = parse(
//!     Options::new(),
//!     r#"
//!     result = ``{"items": []}``
//!     for _ v in args
//!         result.items[] = v
//!     end
//!     "#,
//! )
//! .unwrap();
//!
//! let out = template.execute(Value::from(json!([1, 2]))).unwrap();
//! assert_eq!(out.to_json().unwrap(), json!({"items": [1, 2]}));
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! lexer    — source bytes to tokens (FSM with a 256-entry class table)
//!    ↓
//! parser   — tokens to AST (recursive descent, one-token lookahead)
//!    ↓
//! opcode   — AST to symbolic pseudo-instructions (temps, labels)
//!    ↓
//! compiler — slots, labels, interned constants; emits bytecode
//!    ↓
//! executor — stack-less VM over two data regions
//! ```
//!
//! The language has variables, conditionals, two loop forms, deep
//! path assignment with array auto-extension, array append, inline raw
//! JSON literals, built-in and user functions, and named string
//! sub-templates.

mod compiler;
mod executor;
mod template;

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod funcs;
pub mod lexer;
pub mod opcode;
pub mod parser;
pub mod position;
pub mod strtpl;
pub mod value;

pub use error::{CompileError, Error, ParseError, ParseErrorKind, RuntimeError};
pub use funcs::{FuncDef, FuncError, ParamKind};
pub use position::Position;
pub use strtpl::{HelperFn, HelperMap};
pub use template::{parse, Options, Template};
pub use value::Value;
