use crate::error::{self, SourceMetadata, Span, WantedSpec};
use std::fmt;
use thiserror::Error;

pub const KEYWORDS: [&str; 5] = ["fn", "if", "else", "true", "false"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Number,
    /// Names and keywords alike, keywords are told apart by their text
    Identifier,
    Semicolon,
    Colon,
    Comma,
    /// A lone `=`, used by declarations and assignments
    Equals,
    Operator { kind: Operator },
    /// Any character the language has no use for
    Illegal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    DoubleEquals,
    NotEquals,
    AngleLeft,
    AngleLeftEquals,
    AngleRight,
    AngleRightEquals,
}

impl TokenKind {
    pub const fn as_operator(self) -> Option<Operator> {
        match self {
            TokenKind::Operator { kind } => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::OpenBrace => f.write_str("'{'"),
            TokenKind::CloseBrace => f.write_str("'}'"),
            TokenKind::OpenParen => f.write_str("'('"),
            TokenKind::CloseParen => f.write_str("')'"),
            TokenKind::Number => f.write_str("integer literal"),
            TokenKind::Identifier => f.write_str("name"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Equals => f.write_str("'='"),
            TokenKind::Operator { kind } => write!(f, "'{}'", kind),
            TokenKind::Illegal => f.write_str("unknown character"),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::DoubleEquals => "==",
            Operator::NotEquals => "!=",
            Operator::AngleLeft => "<",
            Operator::AngleLeftEquals => "<=",
            Operator::AngleRight => ">",
            Operator::AngleRightEquals => ">=",
        })
    }
}

#[derive(Debug, Error)]
pub enum LexErrorKind {
    #[error("unexpected {found:?}, expected {wanted}")]
    Expected {
        wanted: WantedSpec<char>,
        found: char,
    },
}

pub type LexError = error::Error<LexErrorKind>;

/// The text a token was made from, and where it sits in the source
#[derive(Debug, Clone, Copy)]
pub struct Lexeme<'a> {
    pub span: Span,
    pub text: &'a str,
}

#[derive(Debug)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: Lexeme<'a>,
}

pub struct Lexer<'source> {
    metadata: &'source SourceMetadata<'source>,
    text: &'source str,
    /// Byte offset of the next unread character
    offset: usize,
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

impl<'source> Lexer<'source> {
    pub fn new(metadata: &'source SourceMetadata<'source>) -> Self {
        Self {
            metadata,
            text: metadata.input(),
            offset: 0,
        }
    }

    /// `Ok(None)` at the end of input. Unknown characters come back as
    /// [`TokenKind::Illegal`] tokens so the caller decides how to report them.
    pub fn next_token(&mut self) -> Result<Option<Token<'source>>, LexError> {
        self.skip_trivia();
        let start = self.offset;
        let first = match self.bump() {
            Some(ch) => ch,
            None => return Ok(None),
        };
        let kind = match first {
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '+' | '-' | '*' | '/' | '=' | '!' | '<' | '>' => self.operator(first),
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                self.eat_while(is_name_char);
                TokenKind::Identifier
            }
            ch if ch.is_ascii_digit() => {
                self.eat_while(|ch| ch.is_ascii_digit());
                if let Some(found) = self.peek().filter(|ch| is_name_char(*ch)) {
                    return Err(LexError::new(LexErrorKind::Expected {
                        wanted: WantedSpec::Description("a separator after the number"),
                        found,
                    })
                    .with_source(Span::new(self.offset), self.metadata)
                    .add_context("lexing number"));
                }
                TokenKind::Number
            }
            _ => TokenKind::Illegal,
        };
        Ok(Some(Token {
            kind,
            lexeme: self.lexeme_from(start),
        }))
    }

    // `=` on its own is not an operator, it only shows up in declarations and assignments
    fn operator(&mut self, first: char) -> TokenKind {
        let with_equals = self.peek() == Some('=');
        if with_equals {
            self.bump();
        }
        let kind = match (first, with_equals) {
            ('+', false) => Operator::Plus,
            ('-', false) => Operator::Minus,
            ('*', false) => Operator::Star,
            ('/', false) => Operator::Slash,
            ('=', true) => Operator::DoubleEquals,
            ('!', true) => Operator::NotEquals,
            ('<', false) => Operator::AngleLeft,
            ('<', true) => Operator::AngleLeftEquals,
            ('>', false) => Operator::AngleRight,
            ('>', true) => Operator::AngleRightEquals,
            ('=', false) => return TokenKind::Equals,
            // `+=` and friends, or a lone `!`
            _ => return TokenKind::Illegal,
        };
        TokenKind::Operator { kind }
    }

    // whitespace and `//` comments
    fn skip_trivia(&mut self) {
        loop {
            self.eat_while(char::is_whitespace);
            if !self.rest().starts_with("//") {
                break;
            }
            self.eat_while(|ch| ch != '\n');
        }
    }

    fn rest(&self) -> &'source str {
        &self.text[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        Some(ch)
    }

    fn eat_while(&mut self, keep: impl Fn(char) -> bool) {
        while self.peek().map_or(false, &keep) {
            self.bump();
        }
    }

    fn lexeme_from(&self, start: usize) -> Lexeme<'source> {
        Lexeme {
            span: Span::with_len(start, self.offset - start),
            text: &self.text[start..self.offset],
        }
    }

    /// Empty span at the read position
    pub fn current_span(&self) -> Span {
        Span::with_len(self.offset, 0)
    }

    pub const fn get_metadata(&self) -> &'source SourceMetadata<'source> {
        self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let meta = SourceMetadata::new(source);
        let mut lexer = Lexer::new(&meta);
        let mut kinds = Vec::new();
        while let Some(token) = lexer.next_token().expect("lexing failed") {
            kinds.push(token.kind);
        }
        kinds
    }

    #[test]
    fn declaration_and_comparison() {
        use TokenKind::*;
        assert_eq!(
            kinds("x := a <= 3 // trailing comment\n== b"),
            vec![
                Identifier,
                Colon,
                Equals,
                Identifier,
                Operator {
                    kind: super::Operator::AngleLeftEquals
                },
                Number,
                Operator {
                    kind: super::Operator::DoubleEquals
                },
                Identifier,
            ]
        );
    }

    #[test]
    fn unknown_character_is_illegal_token() {
        assert_eq!(
            kinds("1 $ 2 +="),
            vec![
                TokenKind::Number,
                TokenKind::Illegal,
                TokenKind::Number,
                TokenKind::Illegal
            ]
        );
    }

    #[test]
    fn token_spans_cover_the_text() {
        let meta = SourceMetadata::new("  main");
        let mut lexer = Lexer::new(&meta);
        let token = lexer.next_token().unwrap().unwrap();
        assert_eq!(token.lexeme.span, Span::with_len(2, 4));
        assert_eq!(token.lexeme.text, "main");
        assert!(lexer.next_token().unwrap().is_none());
    }

    #[test]
    fn number_glued_to_identifier_is_an_error() {
        let meta = SourceMetadata::new("12ab");
        let mut lexer = Lexer::new(&meta);
        assert!(lexer.next_token().is_err());
        // lexing resumes after the digits
        let token = lexer.next_token().unwrap().unwrap();
        assert_eq!(token.lexeme.text, "ab");
    }
}
