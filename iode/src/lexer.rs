//! The lexer (spec.md §4.1).
//!
//! Grounded on the shape of the teacher's `compiler::lex::Lexer` (an index
//! into the source, a `tokens` accumulator, a `strip`-then-`next_token`
//! loop), simplified from its `Peekable<Chars>` span-tracking machinery
//! down to the flat line/column model spec.md calls for.

use crate::common::{
    error::{IodeError, Location},
    token::{Token, TokenKind, KEYWORDS},
};

pub struct Lexer {
    chars:  Vec<char>,
    pos:    usize,
    line:   usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Lexer {
        Lexer { chars: source.chars().collect(), pos: 0, line: 1, column: 1 }
    }

    fn is_at_end(&self) -> bool { self.pos >= self.chars.len() }

    fn peek(&self) -> Option<char> { self.chars.get(self.pos).copied() }

    fn peek_next(&self) -> Option<char> { self.chars.get(self.pos + 1).copied() }

    fn advance(&mut self) -> char {
        let c = self.chars[self.pos];
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn here(&self) -> Location { Location::new(self.line, self.column) }

    /// Skips whitespace (space, tab, CR, newline) and `//` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                },
                Some('/') if self.peek_next() == Some('/') => {
                    while !self.is_at_end() && self.peek() != Some('\n') {
                        self.advance();
                    }
                },
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, IodeError> {
        let start = self.here();
        let c = self.advance();

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '#' => TokenKind::Pound,
            '@' => TokenKind::At,
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => TokenKind::Equal,
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    return Ok(Token::new(TokenKind::Arrow, "->", start.line, start.column));
                }
                TokenKind::Minus
            },
            '"' => return self.string(start),
            c if c.is_ascii_digit() => return self.number(start),
            c if c.is_alphabetic() || c == '_' => return self.identifier(start),
            other => {
                return Err(IodeError::lexer(format!("unexpected character '{}'", other), start));
            },
        };

        Ok(Token::new(kind, c.to_string(), start.line, start.column))
    }

    fn string(&mut self, start: Location) -> Result<Token, IodeError> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(IodeError::lexer("unterminated string", start)),
                Some('"') => {
                    self.advance();
                    break;
                },
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        None => return Err(IodeError::lexer("unterminated string", start)),
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        },
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        },
                        Some('\\') => {
                            self.advance();
                            value.push('\\');
                        },
                        Some('"') => {
                            self.advance();
                            value.push('"');
                        },
                        Some(other) => {
                            self.advance();
                            value.push('\\');
                            value.push(other);
                        },
                    }
                },
                Some(c) => {
                    self.advance();
                    value.push(c);
                },
            }
        }
        Ok(Token::new(TokenKind::StringLit, value, start.line, start.column))
    }

    fn number(&mut self, start: Location) -> Result<Token, IodeError> {
        let mut text = String::new();
        text.push(self.chars[self.pos - 1]);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        Ok(Token::new(TokenKind::NumberLit, text, start.line, start.column))
    }

    fn identifier(&mut self, start: Location) -> Result<Token, IodeError> {
        let mut text = String::new();
        text.push(self.chars[self.pos - 1]);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == text)
            .map(|(_, kind)| *kind)
            .unwrap_or(TokenKind::Identifier);
        Ok(Token::new(kind, text, start.line, start.column))
    }
}

/// Lexes `source` into a token stream terminated by a single `Eof` token.
pub fn lex(source: &str) -> Result<Vec<Token>, IodeError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    lexer.skip_trivia();
    while !lexer.is_at_end() {
        tokens.push(lexer.next_token()?);
        lexer.skip_trivia();
    }
    tokens.push(Token::new(TokenKind::Eof, "", lexer.line, lexer.column));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_punctuation() {
        assert_eq!(
            kinds("def f(x: Int): Int { return x }"),
            vec![
                TokenKind::Def,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::Identifier,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn arrow_vs_minus() {
        assert_eq!(kinds("->"), vec![TokenKind::Arrow, TokenKind::Eof]);
        assert_eq!(kinds("- >"), vec![TokenKind::Minus, TokenKind::Eof]);
    }

    #[test]
    fn string_escapes() {
        let tokens = lex(r#""a\nb\tc\\d\"e\qf""#).unwrap();
        assert_eq!(tokens[0].lexeme, "a\nb\tc\\d\"e\\qf");
    }

    #[test]
    fn unterminated_string_reports_opening_quote() {
        let err = lex("\"abc").unwrap_err();
        match err {
            IodeError::Lexer { location, .. } => assert_eq!(location, Location::new(1, 1)),
            other => panic!("expected lexer error, got {other:?}"),
        }
    }

    #[test]
    fn line_and_column_after_newline() {
        let tokens = lex("def\nfoo").unwrap();
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[1].column, 1);
    }

    #[test]
    fn line_comment_discarded() {
        assert_eq!(kinds("def // hello\nvar"), vec![TokenKind::Def, TokenKind::Var, TokenKind::Eof]);
    }

    proptest::proptest! {
        /// spec.md §8: "For every source program `S` that compiles,
        /// `parse(lex(S))` is deterministic" — narrowed here to the lexer
        /// alone, since an arbitrary byte string need not parse at all.
        /// Re-lexing the same source twice must always produce the same
        /// token stream.
        #[test]
        fn retokenization_is_deterministic(source in "[a-zA-Z0-9_ \n\t():{},=+\\-*/\"-]{0,200}") {
            let first = lex(&source);
            let second = lex(&source);
            match (first, second) {
                (Ok(a), Ok(b)) => proptest::prop_assert_eq!(a, b),
                (Err(_), Err(_)) => {},
                _ => proptest::prop_assert!(false, "lexing the same source twice disagreed on success"),
            }
        }
    }
}
