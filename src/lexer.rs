//! Lexical analysis for template source.
//!
//! A deterministic finite-state scanner over the raw source bytes.
//!
//! # Design
//!
//! - Bytes are classified through a 256-entry table built at compile
//!   time; the scanner dispatches on the class, never the byte itself
//!   (except for the two context-sensitive closers: the unescaped `"`
//!   and the raw-literal quote run).
//! - States: `None`, `Word`, `Number`, `Str`, `Object`. Word and Number
//!   close on the first byte that does not extend them, without
//!   consuming it.
//! - Raw JSON literals are delimited by a backtick, an optional run of
//!   identifier bytes, and a closing backtick (e.g. `` ` `` or
//!   `` `xyz` ``); the body runs until the exact opening quote repeats.
//! - Words shorter than five bytes are rewritten to keyword tokens when
//!   they match one of `if`, `for`, `in`, `else`, `end`.

use crate::error::{ParseError, ParseErrorKind};
use crate::position::Position;
use tracing::debug;

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword candidate.
    Word,
    Dot,
    Comma,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Equal,
    /// Numeric literal; payload is the source digits.
    Num,
    /// String literal; payload includes both quotes.
    Str,
    /// Raw JSON literal; payload is the body without the quotes.
    Object,
    KwIf,
    KwFor,
    KwIn,
    KwElse,
    KwEnd,
}

/// A token with its payload slice and source extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    /// Payload text; empty for punctuation and delimiters.
    pub text: &'src str,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    /// Bytes with no role in the language; an error outside literals.
    Other,
    Dot,
    Comma,
    Digit,
    Letter,
    Minus,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Backslash,
    Quote,
    BackQuote,
    Newline,
    Space,
    Equal,
    Percent,
}

const fn char_classes() -> [Class; 256] {
    let mut table = [Class::Other; 256];
    let mut b = b'0';
    while b <= b'9' {
        table[b as usize] = Class::Digit;
        b += 1;
    }
    let mut b = b'a';
    while b <= b'z' {
        table[b as usize] = Class::Letter;
        b += 1;
    }
    let mut b = b'A';
    while b <= b'Z' {
        table[b as usize] = Class::Letter;
        b += 1;
    }
    table[b'_' as usize] = Class::Letter;

    table[b'.' as usize] = Class::Dot;
    table[b',' as usize] = Class::Comma;
    table[b'-' as usize] = Class::Minus;
    table[b'(' as usize] = Class::ParenOpen;
    table[b')' as usize] = Class::ParenClose;
    table[b'[' as usize] = Class::BracketOpen;
    table[b']' as usize] = Class::BracketClose;
    table[b'\\' as usize] = Class::Backslash;
    table[b'"' as usize] = Class::Quote;
    table[b'`' as usize] = Class::BackQuote;
    table[b'\n' as usize] = Class::Newline;
    table[b'=' as usize] = Class::Equal;
    table[b'%' as usize] = Class::Percent;

    // Whitespace: space, TAB, VT, FF, CR, NEL, NBSP.
    table[b' ' as usize] = Class::Space;
    table[0x09] = Class::Space;
    table[0x0b] = Class::Space;
    table[0x0c] = Class::Space;
    table[0x0d] = Class::Space;
    table[0x85] = Class::Space;
    table[0xa0] = Class::Space;

    table
}

static CHAR_CLASS: [Class; 256] = char_classes();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    Word,
    Number,
    Str,
    Object,
}

/// Tokenize template source into an ordered token list.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut lx = Lexer {
        src: source,
        bytes: source.as_bytes(),
        state: State::None,
        cur: Position::start(),
        token_start: Position::start(),
        body_start: Position::start(),
        obj_quote: &[],
        tokens: Vec::new(),
    };
    while lx.cur.offset < lx.bytes.len() {
        match lx.state {
            State::None => lx.scan_none()?,
            State::Word => lx.scan_word(),
            State::Number => lx.scan_number()?,
            State::Str => lx.scan_string(),
            State::Object => lx.scan_object(),
        }
    }
    lx.finish()?;
    debug!(tokens = lx.tokens.len(), "tokenized template");
    Ok(lx.tokens)
}

struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    state: State,
    cur: Position,
    /// Start of the token being scanned.
    token_start: Position,
    /// Start of a raw literal's body (just past its opening quote).
    body_start: Position,
    /// The opening quote run of the raw literal being scanned.
    obj_quote: &'src [u8],
    tokens: Vec<Token<'src>>,
}

impl<'src> Lexer<'src> {
    fn class_at(&self, offset: usize) -> Class {
        CHAR_CLASS[self.bytes[offset] as usize]
    }

    fn scan_none(&mut self) -> Result<(), ParseError> {
        match self.class_at(self.cur.offset) {
            Class::Other | Class::Backslash => {
                return Err(ParseError::new(ParseErrorKind::UnexpectedSymbol, self.cur));
            }
            Class::Letter => {
                self.token_start = self.cur;
                self.state = State::Word;
            }
            Class::Minus | Class::Digit => {
                self.token_start = self.cur;
                self.state = State::Number;
            }
            Class::Quote => {
                self.token_start = self.cur;
                self.state = State::Str;
            }
            Class::BackQuote => return self.open_object(),
            Class::Dot => self.push_mark(TokenKind::Dot),
            Class::Comma => self.push_mark(TokenKind::Comma),
            Class::Equal => self.push_mark(TokenKind::Equal),
            Class::ParenOpen => self.push_mark(TokenKind::ParenOpen),
            Class::ParenClose => self.push_mark(TokenKind::ParenClose),
            Class::BracketOpen => self.push_mark(TokenKind::BracketOpen),
            Class::BracketClose => self.push_mark(TokenKind::BracketClose),
            Class::Newline => self.cur.newline(),
            Class::Space | Class::Percent => {}
        }
        self.cur.advance(1);
        Ok(())
    }

    /// Emit a single-byte punctuation token at the current position.
    fn push_mark(&mut self, kind: TokenKind) {
        let start = self.cur;
        let mut end = start;
        end.advance(1);
        self.tokens.push(Token {
            kind,
            text: "",
            start,
            end,
        });
    }

    fn scan_word(&mut self) {
        match self.class_at(self.cur.offset) {
            Class::Letter | Class::Digit => self.cur.advance(1),
            _ => self.close_word(),
        }
    }

    fn close_word(&mut self) {
        let text = &self.src[self.token_start.offset..self.cur.offset];
        let kind = if text.len() < 5 {
            match text {
                "if" => TokenKind::KwIf,
                "for" => TokenKind::KwFor,
                "in" => TokenKind::KwIn,
                "else" => TokenKind::KwElse,
                "end" => TokenKind::KwEnd,
                _ => TokenKind::Word,
            }
        } else {
            TokenKind::Word
        };
        self.tokens.push(Token {
            kind,
            text,
            start: self.token_start,
            end: self.cur,
        });
        self.state = State::None;
    }

    fn scan_number(&mut self) -> Result<(), ParseError> {
        match self.class_at(self.cur.offset) {
            Class::Dot | Class::Digit => {
                self.cur.advance(1);
                Ok(())
            }
            _ => self.close_number(),
        }
    }

    fn close_number(&mut self) -> Result<(), ParseError> {
        let text = &self.src[self.token_start.offset..self.cur.offset];
        if text.parse::<f64>().is_err() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidNumber,
                self.token_start,
            ));
        }
        self.tokens.push(Token {
            kind: TokenKind::Num,
            text,
            start: self.token_start,
            end: self.cur,
        });
        self.state = State::None;
        Ok(())
    }

    fn scan_string(&mut self) {
        let b = self.bytes[self.cur.offset];
        if b == b'"' && self.bytes[self.cur.offset - 1] != b'\\' {
            self.tokens.push(Token {
                kind: TokenKind::Str,
                text: &self.src[self.token_start.offset..self.cur.offset + 1],
                start: self.token_start,
                end: self.cur,
            });
            self.state = State::None;
        }
        if self.class_at(self.cur.offset) == Class::Newline {
            self.cur.newline();
        }
        self.cur.advance(1);
    }

    /// Consume the opening quote of a raw JSON literal: a backtick, a
    /// run of identifier bytes, and a closing backtick.
    fn open_object(&mut self) -> Result<(), ParseError> {
        self.token_start = self.cur;
        self.state = State::Object;
        let rest = &self.bytes[self.cur.offset..];
        let mut i = 1;
        loop {
            if i >= rest.len() {
                return Err(ParseError::new(ParseErrorKind::UnterminatedObject, self.cur));
            }
            let b = rest[i];
            if b == b'`' {
                break;
            }
            match CHAR_CLASS[b as usize] {
                Class::Letter | Class::Digit => i += 1,
                _ => {
                    let mut pos = self.cur;
                    pos.advance(i);
                    return Err(ParseError::new(ParseErrorKind::IllegalObjectChar, pos));
                }
            }
        }
        i += 1;
        self.obj_quote = &rest[..i];
        self.cur.advance(i);
        self.body_start = self.cur;
        Ok(())
    }

    fn scan_object(&mut self) {
        let b = self.bytes[self.cur.offset];
        if b == b'`' && self.bytes[self.cur.offset..].starts_with(self.obj_quote) {
            let text = &self.src[self.body_start.offset..self.cur.offset];
            self.cur.advance(self.obj_quote.len());
            self.tokens.push(Token {
                kind: TokenKind::Object,
                text,
                start: self.token_start,
                end: self.cur,
            });
            self.state = State::None;
            return;
        }
        if self.class_at(self.cur.offset) == Class::Newline {
            self.cur.newline();
        }
        self.cur.advance(1);
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        match self.state {
            State::None => Ok(()),
            State::Word => {
                self.close_word();
                Ok(())
            }
            State::Number => self.close_number(),
            State::Str => Err(ParseError::new(
                ParseErrorKind::UnterminatedString,
                self.token_start,
            )),
            State::Object => Err(ParseError::new(
                ParseErrorKind::UnterminatedObject,
                self.token_start,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token<'_>]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn words_punctuation_and_strings() {
        let tokens = tokenize("\n\t\tx = args[\"str\"]\n\t").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Word,
                TokenKind::Equal,
                TokenKind::Word,
                TokenKind::BracketOpen,
                TokenKind::Str,
                TokenKind::BracketClose,
            ]
        );
        assert_eq!(tokens[0].text, "x");
        assert_eq!(tokens[2].text, "args");
        assert_eq!(tokens[4].text, "\"str\"");
    }

    #[test]
    fn raw_literal_and_negative_number() {
        let tokens = tokenize("``{dddddd}``-1.34").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Object, TokenKind::Num]);
        assert_eq!(tokens[0].text, "{dddddd}");
        assert_eq!(tokens[1].text, "-1.34");
    }

    #[test]
    fn named_raw_literal_may_contain_backticks() {
        let tokens = tokenize("32 xx()`x`{\"s\":\"``\"}`x`").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Num,
                TokenKind::Word,
                TokenKind::ParenOpen,
                TokenKind::ParenClose,
                TokenKind::Object,
            ]
        );
        assert_eq!(tokens[0].text, "32");
        assert_eq!(tokens[1].text, "xx");
        assert_eq!(tokens[4].text, "{\"s\":\"``\"}");
    }

    #[test]
    fn escaped_quote_stays_inside_string() {
        let tokens = tokenize(r#"ss.dd("x\"x")"#).unwrap();
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[1].kind, TokenKind::Dot);
        assert_eq!(tokens[4].kind, TokenKind::Str);
        assert_eq!(tokens[4].text, r#""x\"x""#);
    }

    #[test]
    fn unexpected_symbol_carries_position() {
        let err = tokenize("res = xx\n\tif x()\n\t\t@\n\tend").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedSymbol);
        assert_eq!(err.pos.line, 3);
        assert_eq!(err.pos.column, 2);
    }

    #[test]
    fn double_dot_is_not_a_number() {
        let err = tokenize("12..34").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidNumber);
    }

    #[test]
    fn unterminated_raw_literal_quote() {
        let err = tokenize("xx = `y").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedObject);
    }

    #[test]
    fn unterminated_raw_literal_body() {
        let err = tokenize("xx = ``{}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedObject);
    }

    #[test]
    fn unterminated_string() {
        let err = tokenize("d=\"xx").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
    }

    #[test]
    fn illegal_byte_in_raw_literal_quote() {
        let err = tokenize("`@`{}`@`").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::IllegalObjectChar);
    }

    #[test]
    fn keywords_are_rewritten() {
        let tokens = tokenize("if x y=x else y=z end").unwrap();
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[0].kind, TokenKind::KwIf);
        assert_eq!(tokens[5].kind, TokenKind::KwElse);
        assert_eq!(tokens[9].kind, TokenKind::KwEnd);
    }

    #[test]
    fn long_words_are_never_keywords() {
        let tokens = tokenize("endif elses").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Word, TokenKind::Word]);
    }

    #[test]
    fn underscore_is_a_word() {
        let tokens = tokenize("for _ x in args").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].kind, TokenKind::KwFor);
        assert_eq!(tokens[1].kind, TokenKind::Word);
        assert_eq!(tokens[1].text, "_");
        assert_eq!(tokens[3].kind, TokenKind::KwIn);
    }

    #[test]
    fn call_argument_list() {
        let tokens = tokenize("fn(x,y)").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Word,
                TokenKind::ParenOpen,
                TokenKind::Word,
                TokenKind::Comma,
                TokenKind::Word,
                TokenKind::ParenClose,
            ]
        );
    }

    #[test]
    fn positions_across_multiline_raw_literal() {
        let src = "\n    result = ``{\n\t\t\t\"obj\":{}, \n\t\t\t\"arr\":[], \n\t\t\t\"info\": \"test template\"\n\t\t}``\n    x\n\t";
        let tokens = tokenize(src).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[2].kind, TokenKind::Object);
        assert_eq!(tokens[2].start.line, 2);
        assert_eq!(tokens[2].start.column, 13);
        assert_eq!(tokens[3].start.line, 7);
        assert_eq!(tokens[3].start.column, 4);
    }

    #[test]
    fn percent_bytes_are_skipped() {
        let tokens = tokenize("x = 1 %% y = 2").unwrap();
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0].text, "x");
        assert_eq!(tokens[3].text, "y");
    }

    #[test]
    fn token_extents_match_source() {
        let src = "xx = 1.5";
        let tokens = tokenize(src).unwrap();
        assert_eq!(&src[tokens[0].start.offset..tokens[0].end.offset], "xx");
        assert_eq!(&src[tokens[1].start.offset..tokens[1].end.offset], "=");
        assert_eq!(&src[tokens[2].start.offset..tokens[2].end.offset], "1.5");
    }
}
