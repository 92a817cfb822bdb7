//! Data primitives: constants, variable paths, function calls, and
//! sub-template invocations.

use super::stream::TokenStream;
use crate::ast::{Node, NodeKind};
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind};

/// Parse one data primitive, dispatching on up to three tokens:
///
/// ```text
/// number | string | object   -> Const
/// dot, word, (               -> StrTemplate
/// word, (                    -> Function
/// word, dot | [              -> VarPath
/// word                       -> VarName
/// ```
pub(super) fn parse_data_primitive(s: &mut TokenStream) -> Result<Node, ParseError> {
    if s.at_end() {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedConstructionEnd,
            s.last_end(),
        ));
    }
    let t = *s.current();
    let t2 = s.peek_kind(1);
    let t3 = s.peek_kind(2);

    match t.kind {
        TokenKind::Num | TokenKind::Str | TokenKind::Object => {
            s.skip(1);
            Ok(Node::leaf(NodeKind::Const, t.text, t.start, t.end))
        }
        TokenKind::Dot
            if t2 == Some(TokenKind::Word) && t3 == Some(TokenKind::ParenOpen) =>
        {
            parse_str_template(s)
        }
        TokenKind::Word if t2 == Some(TokenKind::ParenOpen) => parse_function(s),
        TokenKind::Word
            if t2 == Some(TokenKind::Dot) || t2 == Some(TokenKind::BracketOpen) =>
        {
            parse_var_path(s)
        }
        TokenKind::Word => {
            s.skip(1);
            Ok(var_name_node(&t))
        }
        _ => Err(ParseError::new(ParseErrorKind::UnexpectedToken, t.start)),
    }
}

/// Parse a variable path: a head name followed by `.word` and
/// `[primitive]` suffixes. Stops (without consuming) at `[` `]`, which
/// belongs to the append form.
///
/// A `.word` suffix is stored as a `Const` child holding the JSON
/// string of the word, so path lookups uniformly receive JSON keys.
pub(super) fn parse_var_path(s: &mut TokenStream) -> Result<Node, ParseError> {
    let head = *s.current();
    let mut node = Node::new(NodeKind::VarPath, head.start);
    node.end = head.end;
    node.children.push(Some(var_name_node(&head)));
    s.skip(1);

    loop {
        match s.peek_kind(0) {
            Some(TokenKind::Dot) => {
                let t = match s.peek(1) {
                    Some(t) => *t,
                    None => {
                        return Err(ParseError::new(
                            ParseErrorKind::UnexpectedConstructionEnd,
                            head.start,
                        ));
                    }
                };
                if t.kind != TokenKind::Word {
                    return Err(ParseError::new(ParseErrorKind::UnexpectedToken, t.start));
                }
                node.children.push(Some(Node::leaf(
                    NodeKind::Const,
                    format!("\"{}\"", t.text),
                    t.start,
                    t.end,
                )));
                node.end = t.end;
                s.skip(2);
            }
            Some(TokenKind::BracketOpen) => {
                let open = *s.current();
                match s.peek_kind(1) {
                    Some(TokenKind::BracketClose) => break,
                    None => {
                        return Err(ParseError::new(
                            ParseErrorKind::UnexpectedConstructionEnd,
                            head.start,
                        ));
                    }
                    _ => {}
                }
                s.skip(1);
                let key = parse_data_primitive(s)?;
                node.children.push(Some(key));

                if s.at_end() {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedConstructionEnd,
                        open.start,
                    ));
                }
                let t = s.current();
                if t.kind != TokenKind::BracketClose {
                    return Err(ParseError::new(ParseErrorKind::UnexpectedToken, t.start));
                }
                node.end = t.end;
                s.skip(1);
            }
            _ => break,
        }
    }

    Ok(node)
}

/// Parse `.name(primitive)` — a string sub-template invocation.
fn parse_str_template(s: &mut TokenStream) -> Result<Node, ParseError> {
    let mut node = Node::new(NodeKind::StrTemplate, s.current().start);
    let name = var_name_node(s.peek(1).expect("lookahead checked"));
    s.skip(3);

    let param = parse_data_primitive(s)?;

    if s.at_end() {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedConstructionEnd,
            node.start,
        ));
    }
    let t = s.current();
    if t.kind != TokenKind::ParenClose {
        return Err(ParseError::new(ParseErrorKind::UnexpectedToken, t.start));
    }
    node.end = t.end;
    s.skip(1);

    node.children = vec![Some(name), Some(param)];
    Ok(node)
}

/// Parse `name(arg, arg, …)` — at least one argument.
fn parse_function(s: &mut TokenStream) -> Result<Node, ParseError> {
    let head = *s.current();
    let mut node = Node::new(NodeKind::Function, head.start);
    node.children.push(Some(var_name_node(&head)));
    s.skip(2);

    loop {
        let arg = parse_data_primitive(s)?;
        node.children.push(Some(arg));

        if s.at_end() {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedConstructionEnd,
                node.start,
            ));
        }
        let t = *s.current();
        s.skip(1);
        match t.kind {
            TokenKind::ParenClose => {
                node.end = t.end;
                return Ok(node);
            }
            TokenKind::Comma => {}
            _ => return Err(ParseError::new(ParseErrorKind::UnexpectedToken, t.start)),
        }
    }
}

pub(super) fn var_name_node(t: &Token<'_>) -> Node {
    Node::leaf(NodeKind::VarName, t.text, t.start, t.end)
}
