//! Statement parsing: code blocks, `if`/`for` constructs, and the three
//! assignment forms.

use super::expr::{parse_data_primitive, parse_var_path, var_name_node};
use super::stream::TokenStream;
use crate::ast::{Node, NodeKind};
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind};

/// Parse statements until EOF, `end`, or `else`.
pub(super) fn parse_code_block(s: &mut TokenStream) -> Result<Node, ParseError> {
    let mut node = Node::new(NodeKind::CodeBlock, Default::default());
    while let Some(stmt) = next_statement(s)? {
        node.children.push(Some(stmt));
    }
    if let Some(Some(first)) = node.children.first() {
        node.start = first.start;
    }
    if let Some(Some(last)) = node.children.last() {
        node.end = last.end;
    }
    Ok(node)
}

fn next_statement(s: &mut TokenStream) -> Result<Option<Node>, ParseError> {
    let t = match s.peek(0) {
        Some(t) => t,
        None => return Ok(None),
    };
    match t.kind {
        TokenKind::KwEnd | TokenKind::KwElse => Ok(None),
        TokenKind::KwFor => parse_for(s).map(Some),
        TokenKind::KwIf => parse_if(s).map(Some),
        TokenKind::Word => parse_assign(s).map(Some),
        _ => Err(ParseError::new(ParseErrorKind::UnexpectedSymbol, t.start)),
    }
}

fn parse_if(s: &mut TokenStream) -> Result<Node, ParseError> {
    let mut node = Node::new(NodeKind::If, s.current().start);
    s.skip(1);

    let cond = parse_data_primitive(s)?;

    let then_block = parse_code_block(s)?;
    let then_child = (!then_block.children.is_empty()).then_some(then_block);

    if s.at_end() {
        return Err(ParseError::new(ParseErrorKind::UnterminatedIf, node.start));
    }
    let mut else_child = None;
    if s.peek_kind(0) == Some(TokenKind::KwElse) {
        s.skip(1);
        let else_block = parse_code_block(s)?;
        else_child = (!else_block.children.is_empty()).then_some(else_block);
    }

    if s.at_end() {
        return Err(ParseError::new(ParseErrorKind::UnterminatedIf, node.start));
    }
    let t = s.current();
    if t.kind != TokenKind::KwEnd {
        return Err(ParseError::new(ParseErrorKind::UnexpectedToken, t.start));
    }
    node.end = t.end;
    s.skip(1);

    node.children = vec![Some(cond), then_child, else_child];
    Ok(node)
}

fn parse_for(s: &mut TokenStream) -> Result<Node, ParseError> {
    let mut node = Node::new(NodeKind::For, s.current().start);
    s.skip(1);

    // A `for` header is iteration when `in` shows up as the second or
    // third token; otherwise the whole header is a condition expression.
    if s.remaining() >= 3 {
        let in_at_1 = s.peek_kind(1) == Some(TokenKind::KwIn);
        let in_at_2 = s.peek_kind(2) == Some(TokenKind::KwIn);
        if in_at_1 || in_at_2 {
            node.kind = NodeKind::Foreach;
            let key = foreach_slot(s.peek(0).expect("bounds checked"))?;
            let val = if in_at_1 {
                None
            } else {
                foreach_slot(s.peek(1).expect("bounds checked"))?
            };
            node.children.push(key);
            node.children.push(val);
            s.skip(if in_at_1 { 2 } else { 3 });
        }
    }

    let source = parse_data_primitive(s)?;
    node.children.push(Some(source));

    let body = parse_code_block(s)?;
    node.children.push(Some(body));

    if s.at_end() {
        return Err(ParseError::new(ParseErrorKind::UnterminatedFor, node.start));
    }
    let t = s.current();
    if t.kind != TokenKind::KwEnd {
        return Err(ParseError::new(ParseErrorKind::UnexpectedToken, t.start));
    }
    node.end = t.end;
    s.skip(1);

    Ok(node)
}

/// An iteration-variable slot: a word, with `_` meaning "unused".
fn foreach_slot(t: &Token<'_>) -> Result<Option<Node>, ParseError> {
    if t.kind != TokenKind::Word {
        return Err(ParseError::new(ParseErrorKind::InvalidVarName, t.start));
    }
    Ok((t.text != "_").then(|| var_name_node(t)))
}

fn parse_assign(s: &mut TokenStream) -> Result<Node, ParseError> {
    let start = s.current().start;
    if s.remaining() < 3 {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedConstructionEnd,
            start,
        ));
    }
    if s.peek_kind(1) == Some(TokenKind::Equal) {
        return parse_set_var(s);
    }

    let path = parse_var_path(s)?;

    if s.remaining() < 2 {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedConstructionEnd,
            start,
        ));
    }
    if s.peek_kind(0) == Some(TokenKind::Equal) {
        s.skip(1);
        let data = parse_data_primitive(s)?;
        let mut node = Node::new(NodeKind::JsonSet, path.start);
        node.end = data.end;
        node.children = vec![Some(path), Some(data)];
        return Ok(node);
    }
    parse_append(s, path)
}

fn parse_set_var(s: &mut TokenStream) -> Result<Node, ParseError> {
    let target = var_name_node(s.current());
    let mut node = Node::new(NodeKind::SetVar, target.start);
    s.skip(2);

    let data = parse_data_primitive(s)?;
    node.end = data.end;
    node.children = vec![Some(target), Some(data)];
    Ok(node)
}

fn parse_append(s: &mut TokenStream, path: Node) -> Result<Node, ParseError> {
    if s.remaining() < 4 {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedConstructionEnd,
            path.start,
        ));
    }
    for expected in [
        TokenKind::BracketOpen,
        TokenKind::BracketClose,
        TokenKind::Equal,
    ] {
        let t = s.current();
        if t.kind != expected {
            return Err(ParseError::new(ParseErrorKind::UnexpectedToken, t.start));
        }
        s.skip(1);
    }

    let data = parse_data_primitive(s)?;
    let mut node = Node::new(NodeKind::Append, path.start);
    node.end = data.end;
    node.children = vec![Some(path), Some(data)];
    Ok(node)
}
