//! Hand-written recursive-descent parser for type strings.
//!
//! Grammar sketch:
//!
//! ```text
//! type       := IDENT ("(" args ")")?
//! args       := arg ("," arg)*
//! arg        := named_type | type | literal
//! named_type := IDENT WS type          (only under Tuple / Nested)
//! literal    := INT | QUOTED | QUOTED "=" INT
//! ```
//!
//! Identifiers begin with a letter or underscore; quoted strings use
//! `'...'` with `''` as the escape for a single quote. Truncated input,
//! mismatched parentheses, and a non-literal where a parameter is expected
//! all fail with [`Error::MalformedType`].

use super::{TypeNode, TypeParameter};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    Quoted(String),
    LPar,
    RPar,
    Comma,
    Eq,
    Eos,
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, bytes: input.as_bytes(), pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r')
        {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let Some(&b) = self.bytes.get(self.pos) else {
            return Ok(Token::Eos);
        };
        match b {
            b'(' => {
                self.pos += 1;
                Ok(Token::LPar)
            }
            b')' => {
                self.pos += 1;
                Ok(Token::RPar)
            }
            b',' => {
                self.pos += 1;
                Ok(Token::Comma)
            }
            b'=' => {
                self.pos += 1;
                Ok(Token::Eq)
            }
            b'\'' => self.quoted(),
            b'-' | b'0'..=b'9' => self.number(),
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => Ok(self.ident()),
            other => Err(Error::MalformedType(format!(
                "unexpected character '{}' at offset {} in '{}'",
                other as char, self.pos, self.input
            ))),
        }
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos],
                b'_' | b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9')
        {
            self.pos += 1;
        }
        Token::Ident(self.input[start..self.pos].to_string())
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        if self.bytes[self.pos] == b'-' {
            self.pos += 1;
        }
        while self.pos < self.bytes.len()
            && self.bytes[self.pos].is_ascii_digit()
        {
            self.pos += 1;
        }
        let text = &self.input[start..self.pos];
        text.parse::<i64>().map(Token::Int).map_err(|_| {
            Error::MalformedType(format!(
                "invalid integer literal '{}' in '{}'",
                text, self.input
            ))
        })
    }

    fn quoted(&mut self) -> Result<Token> {
        self.pos += 1; // opening quote
        let mut value = String::new();
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'\'' {
                // '' escapes a single quote.
                if self.bytes.get(self.pos + 1) == Some(&b'\'') {
                    value.push('\'');
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                return Ok(Token::Quoted(value));
            }
            let rest = &self.input[self.pos..];
            let ch = rest.chars().next().unwrap_or('\0');
            value.push(ch);
            self.pos += ch.len_utf8();
        }
        Err(Error::MalformedType(format!(
            "unterminated quoted string in '{}'",
            self.input
        )))
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let lookahead = lexer.next_token()?;
        Ok(Self { lexer, lookahead, input })
    }

    fn bump(&mut self) -> Result<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::MalformedType(format!("{} in '{}'", message, self.input))
    }

    fn parse_type(&mut self) -> Result<TypeNode> {
        let text_start = self.text_position();
        let base_name = match self.bump()? {
            Token::Ident(name) => name,
            Token::Eos => {
                return Err(self.error("truncated type expression"))
            }
            other => {
                return Err(
                    self.error(format_args!("expected identifier, got {:?}", other))
                )
            }
        };

        let mut node = TypeNode {
            base_name,
            type_arguments: Vec::new(),
            parameters: Vec::new(),
            field_names: Vec::new(),
            original_text: String::new(),
        };

        if self.lookahead == Token::LPar {
            self.bump()?;
            self.parse_args(&mut node)?;
            match self.bump()? {
                Token::RPar => {}
                Token::Eos => {
                    return Err(self.error("missing closing parenthesis"))
                }
                other => {
                    return Err(self.error(format_args!(
                        "expected ')' or ',', got {:?}",
                        other
                    )))
                }
            }
        }

        node.original_text =
            self.input[text_start..self.consumed_end()].trim().to_string();
        Ok(node)
    }

    fn parse_args(&mut self, node: &mut TypeNode) -> Result<()> {
        let named_allowed =
            matches!(node.base_name.as_str(), "Tuple" | "Nested");
        loop {
            self.parse_arg(node, named_allowed)?;
            if self.lookahead == Token::Comma {
                self.bump()?;
                continue;
            }
            return Ok(());
        }
    }

    fn parse_arg(
        &mut self,
        node: &mut TypeNode,
        named_allowed: bool,
    ) -> Result<()> {
        match &self.lookahead {
            Token::Int(_) => {
                let Token::Int(value) = self.bump()? else {
                    unreachable!()
                };
                node.parameters.push(TypeParameter::Int(value));
                Ok(())
            }
            Token::Quoted(_) => {
                let Token::Quoted(text) = self.bump()? else {
                    unreachable!()
                };
                if self.lookahead == Token::Eq {
                    self.bump()?;
                    match self.bump()? {
                        Token::Int(value) => {
                            node.parameters.push(TypeParameter::EnumEntry {
                                name: text,
                                value,
                            });
                            Ok(())
                        }
                        other => Err(self.error(format_args!(
                            "expected integer after '=', got {:?}",
                            other
                        ))),
                    }
                } else {
                    node.parameters.push(TypeParameter::Quoted(text));
                    Ok(())
                }
            }
            Token::Ident(_) => {
                let child = self.parse_type()?;
                // Two consecutive identifiers form a named field:
                // `id UInt64`. The first parse consumed only the name when
                // the lookahead is another identifier.
                if matches!(self.lookahead, Token::Ident(_)) {
                    if !named_allowed {
                        return Err(self.error(format_args!(
                            "named type argument '{}' outside Tuple/Nested",
                            child.original_text
                        )));
                    }
                    if !child.type_arguments.is_empty()
                        || !child.parameters.is_empty()
                    {
                        return Err(self.error(format_args!(
                            "field name '{}' must be a bare identifier",
                            child.original_text
                        )));
                    }
                    let field_name = child.base_name;
                    let field_type = self.parse_type()?;
                    if node.field_names.len() != node.type_arguments.len() {
                        return Err(self.error(
                            "cannot mix named and unnamed tuple fields",
                        ));
                    }
                    node.field_names.push(field_name);
                    node.type_arguments.push(field_type);
                } else {
                    if !node.field_names.is_empty() {
                        return Err(self.error(
                            "cannot mix named and unnamed tuple fields",
                        ));
                    }
                    node.type_arguments.push(child);
                }
                Ok(())
            }
            Token::Eos => Err(self.error("truncated type expression")),
            other => Err(self.error(format_args!(
                "expected a type, literal, or field name, got {:?}",
                other
            ))),
        }
    }

    /// Offset where the lookahead token begins.
    fn text_position(&self) -> usize {
        let mut probe = Lexer {
            input: self.input,
            bytes: self.input.as_bytes(),
            pos: self.consumed_end(),
        };
        probe.skip_whitespace();
        probe.pos
    }

    /// Offset just past the last consumed token: the lexer position minus
    /// the pending lookahead's width.
    fn consumed_end(&self) -> usize {
        match &self.lookahead {
            Token::Eos => self.lexer.pos,
            _ => self.lookahead_start(),
        }
    }

    fn lookahead_start(&self) -> usize {
        // Walk back from the lexer position over the lookahead's text.
        let width = match &self.lookahead {
            Token::Ident(name) => name.len(),
            Token::Int(value) => value.to_string().len(),
            Token::Quoted(text) => {
                // Opening + closing quote, plus doubled escapes.
                text.len() + 2 + text.matches('\'').count()
            }
            Token::LPar | Token::RPar | Token::Comma | Token::Eq => 1,
            Token::Eos => 0,
        };
        self.lexer.pos - width
    }
}

/// Parse a type string into a validated [`TypeNode`].
pub fn parse_type(input: &str) -> Result<TypeNode> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::MalformedType("empty type string".to_string()));
    }
    let mut parser = Parser::new(trimmed)?;
    let node = parser.parse_type()?;
    match parser.bump()? {
        Token::Eos => {}
        Token::RPar => {
            return Err(Error::MalformedType(format!(
                "mismatched parentheses in '{}'",
                trimmed
            )))
        }
        other => {
            return Err(Error::MalformedType(format!(
                "trailing {:?} after type in '{}'",
                other, trimmed
            )))
        }
    }
    node.validate()?;
    Ok(node)
}
