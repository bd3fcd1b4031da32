use std::{iter::Peekable, str::CharIndices};

use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Invalid integer literal '{literal}' at line {line}, column {column}")]
    InvalidIntegerLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 0,
        }
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, ch)) = next {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.peek() {
                Some(&(_, ch)) if ch.is_whitespace() => {
                    self.advance_char();
                }
                Some(&(_, '/')) => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if matches!(lookahead.peek(), Some(&(_, '/'))) {
                        while let Some(&(_, ch)) = self.chars.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance_char();
                        }
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn span_from(&self, start: usize, end: usize, line: usize, column: usize) -> Span {
        Span {
            start,
            end,
            line,
            column,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Option<Token>> {
        self.skip_whitespace_and_comments();

        let (start, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => return Ok(None),
        };
        let line = self.line;
        let column = self.column;

        if ch.is_ascii_digit() {
            return self.scan_integer(start, line, column).map(Some);
        }
        if ch.is_alphabetic() || ch == '_' {
            return Ok(Some(self.scan_word(start, line, column)));
        }
        if ch == '"' {
            return self.scan_string(start, line, column).map(Some);
        }

        self.advance_char();
        let single = |kind: TokenKind, lexer: &Self| {
            Token::new(
                kind,
                &lexer.input[start..start + ch.len_utf8()],
                lexer.span_from(start, start + ch.len_utf8(), line, column),
            )
        };
        let token = match ch {
            '+' => single(TokenKind::Plus, self),
            '-' => single(TokenKind::Minus, self),
            '*' => single(TokenKind::Star, self),
            '/' => single(TokenKind::Slash, self),
            '(' => single(TokenKind::LeftParen, self),
            ')' => single(TokenKind::RightParen, self),
            '{' => single(TokenKind::LeftBrace, self),
            '}' => single(TokenKind::RightBrace, self),
            '[' => single(TokenKind::LeftBracket, self),
            ']' => single(TokenKind::RightBracket, self),
            ',' => single(TokenKind::Comma, self),
            ':' => single(TokenKind::Colon, self),
            '=' => self.with_optional_equals(start, line, column, TokenKind::Equal, TokenKind::EqualEqual),
            '<' => self.with_optional_equals(start, line, column, TokenKind::Less, TokenKind::LessEqual),
            '>' => self.with_optional_equals(
                start,
                line,
                column,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
            ),
            '!' => {
                if matches!(self.chars.peek(), Some(&(_, '='))) {
                    self.advance_char();
                    Token::new(
                        TokenKind::BangEqual,
                        "!=",
                        self.span_from(start, start + 2, line, column),
                    )
                } else {
                    // Bare '!' is the prefix-not operator.
                    Token::new(
                        TokenKind::Not,
                        "!",
                        self.span_from(start, start + 1, line, column),
                    )
                }
            }
            other => {
                return Err(LexError::UnexpectedCharacter {
                    character: other,
                    line,
                    column,
                });
            }
        };
        Ok(Some(token))
    }

    fn with_optional_equals(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
        plain: TokenKind,
        with_equals: TokenKind,
    ) -> Token {
        if matches!(self.chars.peek(), Some(&(_, '='))) {
            self.advance_char();
            Token::new(
                with_equals,
                &self.input[start..start + 2],
                self.span_from(start, start + 2, line, column),
            )
        } else {
            Token::new(
                plain,
                &self.input[start..start + 1],
                self.span_from(start, start + 1, line, column),
            )
        }
    }

    fn scan_integer(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token> {
        let mut end = start;
        while let Some(&(idx, ch)) = self.chars.peek() {
            if ch.is_ascii_digit() {
                end = idx + ch.len_utf8();
                self.advance_char();
            } else {
                break;
            }
        }
        let literal = &self.input[start..end];
        if literal.parse::<i64>().is_err() {
            return Err(LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                line,
                column,
            });
        }
        Ok(Token::new(
            TokenKind::Integer,
            literal,
            self.span_from(start, end, line, column),
        ))
    }

    fn scan_word(&mut self, start: usize, line: usize, column: usize) -> Token {
        let mut end = start;
        while let Some(&(idx, ch)) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                end = idx + ch.len_utf8();
                self.advance_char();
            } else {
                break;
            }
        }
        let word = &self.input[start..end];
        let kind = match word {
            "function" => TokenKind::Function,
            "var" => TokenKind::Var,
            "print" => TokenKind::Print,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "not" => TokenKind::Not,
            _ => TokenKind::Identifier,
        };
        Token::new(kind, word, self.span_from(start, end, line, column))
    }

    fn scan_string(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token> {
        // Consume the opening quote.
        self.advance_char();
        let content_start = start + 1;
        let mut content_end = content_start;
        loop {
            match self.chars.peek() {
                Some(&(idx, '"')) => {
                    self.advance_char();
                    content_end = idx;
                    break;
                }
                Some(&(_, '\n')) | None => {
                    return Err(LexError::UnterminatedString { line, column });
                }
                Some(&(idx, ch)) => {
                    content_end = idx + ch.len_utf8();
                    self.advance_char();
                }
            }
        }
        Ok(Token::new(
            TokenKind::String,
            &self.input[content_start..content_end],
            self.span_from(start, content_end + 1, line, column),
        ))
    }
}

/// Scan the whole input into a token vector (without a trailing `Eof`;
/// `TokenList::new` appends one).
pub fn tokenize(input: &str) -> LexResult<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("tokenize failed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        assert_eq!(
            kinds("var x = frobnicate"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn scans_two_character_operators() {
        assert_eq!(
            kinds("== != <= >= < >"),
            vec![
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::Greater,
            ]
        );
    }

    #[test]
    fn scans_string_literal_without_quotes_in_text() {
        let tokens = tokenize(r#"print("hello world")"#).expect("tokenize failed");
        let string = tokens
            .iter()
            .find(|token| token.kind == TokenKind::String)
            .expect("no string token");
        assert_eq!(string.text, "hello world");
    }

    #[test]
    fn skips_line_comments() {
        let input = indoc! {"
            var x = 1 // trailing note
            // a full-line comment
            print(x)
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Integer,
                TokenKind::Print,
                TokenKind::LeftParen,
                TokenKind::Identifier,
                TokenKind::RightParen,
            ]
        );
    }

    #[test]
    fn reports_unterminated_string() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(
            err,
            LexError::UnterminatedString { line: 1, column: 0 }
        );
    }

    #[test]
    fn reports_unexpected_character() {
        let err = tokenize("var x = @").unwrap_err();
        assert!(matches!(err, LexError::UnexpectedCharacter { character: '@', .. }));
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = tokenize("var x\nprint(x)").expect("tokenize failed");
        let print = tokens
            .iter()
            .find(|token| token.kind == TokenKind::Print)
            .expect("no print token");
        assert_eq!(print.span.line, 2);
        assert_eq!(print.span.column, 0);
    }

    #[test]
    fn rejects_overflowing_integer_literal() {
        let err = tokenize("99999999999999999999").unwrap_err();
        assert!(matches!(err, LexError::InvalidIntegerLiteral { .. }));
    }
}
