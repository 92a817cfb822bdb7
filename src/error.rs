//! Error types for the three pipeline stages.
//!
//! # Design
//!
//! - [`ParseError`] — tokenizer and AST parser failures, with a fixed
//!   message set
//! - [`CompileError`] — resolution failures while lowering op-codes to
//!   bytecode
//! - [`RuntimeError`] — failures raised while executing a template
//!
//! All three carry the [`Position`] of the offending source and render
//! as `[line:offset] message`.

use crate::position::Position;
use thiserror::Error;

/// Fixed message set for tokenizer and parser failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A numeric token that does not parse as a number (`12..34`).
    #[error("error in numeric token")]
    InvalidNumber,
    /// A byte with no meaning at this point in the source.
    #[error("unexpected symbol")]
    UnexpectedSymbol,
    /// A well-formed token in a position the grammar does not allow.
    #[error("unexpected token")]
    UnexpectedToken,
    /// EOF inside a raw JSON literal.
    #[error("unexpected end on parse object declaration")]
    UnterminatedObject,
    /// EOF inside a string literal.
    #[error("unexpected end on parse string declaration")]
    UnterminatedString,
    /// A non-identifier byte inside a raw JSON literal's opening quote.
    #[error("illegal character in object declaration")]
    IllegalObjectChar,
    /// An `if` block with no matching `end`.
    #[error("unexpected end in `if` block")]
    UnterminatedIf,
    /// Source ran out in the middle of a statement or expression.
    #[error("unexpected construction end")]
    UnexpectedConstructionEnd,
    /// A `for` block with no matching `end`.
    #[error("unexpected end in `for` block")]
    UnterminatedFor,
    /// A token that cannot serve as a variable name.
    #[error("inadmissible var name")]
    InvalidVarName,
}

/// Parse failure with the position of the offending token or byte.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}:{}] {kind}", .pos.line, .pos.offset)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub pos: Position,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, pos: Position) -> Self {
        ParseError { kind, pos }
    }
}

/// Resolution failures raised while turning op-codes into bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("function {0} not found")]
    FunctionNotFound(String),
    #[error("wrong number of args for {name}: want {want} got {got}")]
    ArityMismatch {
        name: String,
        want: usize,
        got: usize,
    },
    #[error("wrong number of args for {name}: want at least {want} got {got}")]
    VariadicArityMismatch {
        name: String,
        want: usize,
        got: usize,
    },
    #[error("`{0}` declared as const")]
    AssignToConst(String),
    #[error("unknown label `{0}`")]
    UnknownLabel(String),
    #[error("unexpected reference `{0}`")]
    UnknownReference(String),
    #[error("invalid JSON literal: {0}")]
    InvalidJson(String),
}

/// Compile failure, anchored at the source position of the op-code that
/// could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}:{}] {kind}", .pos.line, .pos.offset)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub pos: Position,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, pos: Position) -> Self {
        CompileError { kind, pos }
    }
}

/// Execution failure: a function error return, a captured panic, an
/// argument coercion failure, or a render failure, with the position of
/// the instruction that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}:{}] {message}", .pos.line, .pos.offset)]
pub struct RuntimeError {
    pub message: String,
    pub pos: Position,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, pos: Position) -> Self {
        RuntimeError {
            message: message.into(),
            pos,
        }
    }
}

/// Any failure `parse` can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// A name passed to the options builder that is not a valid
    /// identifier, or collides with a reserved word.
    #[error("incorrect name `{0}`")]
    InvalidName(String),
    /// A registered string sub-template whose source does not compile.
    #[error("string template `{name}`: {message}")]
    StringTemplate { name: String, message: String },
}
