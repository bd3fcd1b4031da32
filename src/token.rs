#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        let (line, column) = if self.start <= other.start {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Integer,
    String,

    // Keywords
    Function,
    Var,
    Print,
    For,
    In,
    If,
    Else,
    Return,
    True,
    False,
    Null,
    Not,

    // Operators
    Equal,        // =
    EqualEqual,   // ==
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBrace,    // {
    RightBrace,   // }
    LeftBracket,  // [
    RightBracket, // ]
    Comma,        // ,
    Colon,        // :

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

/// Rewindable cursor over a lexed token stream.
///
/// The final token is always `Eof`; the cursor never runs past it, so peeking
/// is total even on an exhausted stream.
pub struct TokenList {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenList {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(Token::kind) != Some(TokenKind::Eof) {
            let span = tokens.last().map(|token| token.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "<EOF>", span));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn current(&self) -> &Token {
        &self.tokens[self.position]
    }

    pub fn matches(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    pub fn matches_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.current().kind)
    }

    pub fn match_and_consume(&mut self, kind: TokenKind) -> bool {
        if self.matches(kind) {
            self.consume();
            true
        } else {
            false
        }
    }

    pub fn consume(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    /// The token most recently returned by `consume`, or the first token if
    /// nothing has been consumed yet.
    pub fn last_consumed(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub fn has_more(&self) -> bool {
        self.current().kind != TokenKind::Eof
    }

    /// Rewind to the start of the stream.
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind) -> Token {
        Token::new(kind, "", Span::default())
    }

    #[test]
    fn appends_eof_and_stays_on_it() {
        let mut tokens = TokenList::new(vec![token(TokenKind::Plus)]);
        assert!(tokens.has_more());
        assert_eq!(tokens.consume().kind, TokenKind::Plus);
        assert!(!tokens.has_more());
        assert_eq!(tokens.consume().kind, TokenKind::Eof);
        assert_eq!(tokens.consume().kind, TokenKind::Eof);
    }

    #[test]
    fn reset_rewinds_to_start() {
        let mut tokens = TokenList::new(vec![token(TokenKind::Var), token(TokenKind::Identifier)]);
        tokens.consume();
        tokens.consume();
        tokens.reset();
        assert!(tokens.matches(TokenKind::Var));
    }

    #[test]
    fn last_consumed_tracks_cursor() {
        let mut tokens = TokenList::new(vec![token(TokenKind::Var), token(TokenKind::Identifier)]);
        tokens.consume();
        assert_eq!(tokens.last_consumed().kind, TokenKind::Var);
        assert!(tokens.match_and_consume(TokenKind::Identifier));
        assert_eq!(tokens.last_consumed().kind, TokenKind::Identifier);
    }

    #[test]
    fn span_merge_covers_both() {
        let left = Span {
            start: 2,
            end: 5,
            line: 1,
            column: 2,
        };
        let right = Span {
            start: 8,
            end: 12,
            line: 2,
            column: 0,
        };
        let merged = left.merge(right);
        assert_eq!(merged.start, 2);
        assert_eq!(merged.end, 12);
        assert_eq!(merged.line, 1);
        assert_eq!(merged.column, 2);
    }
}
