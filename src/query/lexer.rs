//! Target tokenizer
//!
//! Splits a render target into tokens, each tagged with its 1-based column.
//! Identifier characters are letters, digits and `_ . : - * [ ] %`, so a
//! metric path like `servers.web-1.cpu[0]` is a single token.

use super::functions;
use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, one_of},
    combinator::{map, recognize},
    sequence::delimited,
    IResult, Parser,
};

/// Token category
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal
    Number(f64),
    /// Quoted string
    String,
    /// `true`
    True,
    /// `false`
    False,
    /// Metric path or unknown word
    Identifier,
    /// Name present in the function table
    Func,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
}

/// A lexed token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Category
    pub kind: TokenKind,
    /// Source text; quotes stripped for strings
    pub text: String,
    /// 1-based column of the first character
    pub column: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '-' | '*' | '[' | ']' | '%')
}

fn classify(word: &str) -> TokenKind {
    if word.eq_ignore_ascii_case("true") {
        return TokenKind::True;
    }
    if word.eq_ignore_ascii_case("false") {
        return TokenKind::False;
    }
    let numeric_start = word
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    if numeric_start {
        if let Ok(n) = word.parse::<f64>() {
            return TokenKind::Number(n);
        }
    }
    if functions::is_function(word) {
        TokenKind::Func
    } else {
        TokenKind::Identifier
    }
}

fn punctuation(input: &str) -> IResult<&str, (TokenKind, &str)> {
    map(recognize(one_of("(){},")), |s: &str| {
        let kind = match s {
            "(" => TokenKind::LParen,
            ")" => TokenKind::RParen,
            "{" => TokenKind::LBrace,
            "}" => TokenKind::RBrace,
            _ => TokenKind::Comma,
        };
        (kind, s)
    })
    .parse(input)
}

fn quoted(input: &str) -> IResult<&str, (TokenKind, &str)> {
    map(
        alt((
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        )),
        |s: &str| (TokenKind::String, s),
    )
    .parse(input)
}

fn word(input: &str) -> IResult<&str, (TokenKind, &str)> {
    map(take_while1(is_ident_char), |s: &str| (classify(s), s)).parse(input)
}

fn token(input: &str) -> IResult<&str, (TokenKind, &str)> {
    alt((punctuation, quoted, word)).parse(input)
}

/// Tokenize a whole target
pub fn tokenize(target: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = target.trim_start();

    while !rest.is_empty() {
        let column = target.len() - rest.len() + 1;
        match token(rest) {
            Ok((remaining, (kind, text))) => {
                tokens.push(Token {
                    kind,
                    text: text.to_string(),
                    column,
                });
                rest = remaining.trim_start();
            }
            Err(_) => {
                let message = match rest.chars().next() {
                    Some(q @ ('"' | '\'')) => format!("unterminated string starting with {q}"),
                    Some(c) => format!("unexpected character {c:?}"),
                    None => "unexpected end of input".to_string(),
                };
                return Err(Error::Parser {
                    target: target.to_string(),
                    message,
                    column,
                });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(target: &str) -> Vec<TokenKind> {
        tokenize(target)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            kinds("alias(a.b, \"X\")"),
            vec![
                TokenKind::Func,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::String,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds("true FALSE 1.5 -2 .5 'str'"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Number(1.5),
                TokenKind::Number(-2.0),
                TokenKind::Number(0.5),
                TokenKind::String,
            ]
        );
    }

    #[test]
    fn test_numeric_looking_paths_are_identifiers() {
        assert_eq!(kinds("1.2.3"), vec![TokenKind::Identifier]);
        assert_eq!(kinds("inf"), vec![TokenKind::Identifier]);
        assert_eq!(kinds("unknownFn"), vec![TokenKind::Identifier]);
    }

    #[test]
    fn test_identifier_charset() {
        let tokens = tokenize("servers.web-1.cpu[0]:*%_x").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "servers.web-1.cpu[0]:*%_x");
    }

    #[test]
    fn test_columns() {
        let tokens = tokenize("scale( a , 2)").unwrap();
        let columns: Vec<usize> = tokens.iter().map(|t| t.column).collect();
        assert_eq!(columns, vec![1, 6, 8, 10, 12, 13]);
    }

    #[test]
    fn test_string_strips_quotes() {
        let tokens = tokenize("'a b'").unwrap();
        assert_eq!(tokens[0].text, "a b");
    }

    #[test]
    fn test_errors() {
        match tokenize("a = b").unwrap_err() {
            Error::Parser { column, .. } => assert_eq!(column, 3),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(tokenize("alias(a, \"open").is_err());
    }
}
