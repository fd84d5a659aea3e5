//! Recursive-descent parser over the token stream
//!
//! ```text
//! target ::= expr EOF
//! expr   ::= TRUE | FALSE | NUMBER | STRING | IDENTIFIER
//!          | IDENTIFIER? '{' vals '}' postfix     -- group series
//!          | (FUNC | IDENTIFIER) '(' args ')'
//! args   ::= expr (',' expr)*
//! vals   ::= ident (',' ident)*
//! ident  ::= IDENTIFIER | NUMBER
//! ```
//!
//! An identifier followed by `(` is parsed as a call even when the name is
//! not in the function table; the evaluator reports it as unsupported.
//!
//! A group's prefix and postfix must touch the braces: `a{1,2}.b` is one
//! group, `a{1,2} b` is a group followed by a stray token. A top-level
//! comma list such as `a.x,a.y` is rejected; use braces instead.

use super::ast::Expr;
use super::lexer::{tokenize, Token, TokenKind};
use crate::error::{Error, Result};

/// Parse one render target
pub fn parse_target(target: &str) -> Result<Expr> {
    let tokens = tokenize(target)?;
    let mut parser = Parser {
        target,
        tokens,
        pos: 0,
    };
    let expr = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error_at(
            token.column,
            format!("unexpected {:?} after expression", token.text),
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    target: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Whether the next token starts exactly where the previous one ended
    fn next_is_adjacent(&self) -> bool {
        let previous = self.pos.checked_sub(1).and_then(|i| self.tokens.get(i));
        match (previous, self.peek()) {
            (Some(prev), Some(next)) => prev.column + prev.text.len() == next.column,
            _ => false,
        }
    }

    fn end_column(&self) -> usize {
        self.target.len() + 1
    }

    fn error_at(&self, column: usize, message: impl Into<String>) -> Error {
        Error::Parser {
            target: self.target.to_string(),
            message: message.into(),
            column,
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        match self.peek() {
            Some(token) => self.error_at(
                token.column,
                format!("expected {expected}, found {:?}", token.text),
            ),
            None => self.error_at(
                self.end_column(),
                format!("unexpected end of input, expected {expected}"),
            ),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                let token = token.clone();
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let Some(token) = self.advance() else {
            return Err(self.unexpected("an expression"));
        };

        match token.kind {
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::String => Ok(Expr::String(token.text)),
            TokenKind::Func => self.call(token.text),
            TokenKind::Identifier => match self.peek_kind() {
                Some(TokenKind::LParen) => self.call(token.text),
                Some(TokenKind::LBrace) if self.next_is_adjacent() => self.group(token.text),
                _ => Ok(Expr::SeriesList(token.text)),
            },
            TokenKind::LBrace => {
                self.pos -= 1;
                self.group(String::new())
            }
            _ => Err(self.error_at(
                token.column,
                format!("expected an expression, found {:?}", token.text),
            )),
        }
    }

    fn call(&mut self, name: String) -> Result<Expr> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = vec![self.expr()?];
        while self.peek_kind() == Some(&TokenKind::Comma) {
            self.pos += 1;
            args.push(self.expr()?);
        }
        self.expect(TokenKind::RParen, "',' or ')'")?;
        Ok(Expr::Func { name, args })
    }

    fn group(&mut self, prefix: String) -> Result<Expr> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut values = vec![self.ident()?];
        while self.peek_kind() == Some(&TokenKind::Comma) {
            self.pos += 1;
            values.push(self.ident()?);
        }
        self.expect(TokenKind::RBrace, "',' or '}'")?;
        let postfix = self.postfix()?;
        Ok(Expr::GroupSeries {
            prefix,
            values,
            postfix,
        })
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek_kind() {
            Some(TokenKind::Identifier | TokenKind::Number(_) | TokenKind::Func) => {
                Ok(self.advance().map(|t| t.text).unwrap_or_default())
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    /// Text after a group: path segments and further raw brace groups
    fn postfix(&mut self) -> Result<String> {
        let mut postfix = String::new();
        loop {
            if !self.next_is_adjacent() {
                return Ok(postfix);
            }
            match self.peek_kind() {
                Some(TokenKind::Identifier | TokenKind::Number(_) | TokenKind::Func) => {
                    if let Some(token) = self.advance() {
                        postfix.push_str(&token.text);
                    }
                }
                Some(TokenKind::LBrace) => postfix.push_str(&self.raw_group()?),
                _ => return Ok(postfix),
            }
        }
    }

    fn raw_group(&mut self) -> Result<String> {
        let mut raw = String::new();
        let mut depth = 0usize;
        loop {
            let Some(token) = self.advance() else {
                return Err(self.unexpected("'}'"));
            };
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                TokenKind::Comma | TokenKind::Identifier | TokenKind::Number(_) => {}
                TokenKind::Func => {}
                _ => {
                    return Err(self.error_at(
                        token.column,
                        format!("unexpected {:?} inside braces", token.text),
                    ))
                }
            }
            raw.push_str(&token.text);
            if depth == 0 {
                return Ok(raw);
            }
        }
    }
}
