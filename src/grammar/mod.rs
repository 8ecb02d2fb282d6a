use crate::ast::Program;
use crate::error::*;
use thiserror::Error;

mod expr;
mod function;
pub mod lexer;
mod program;

use lexer::*;

/// Parses a whole program. Syntax errors are sent to `reporter` and replaced by
/// error placeholders, so this always produces a tree; check
/// [`Reporter::error_count`] before trusting it.
pub fn parse_program(source: &SourceMetadata, reporter: &mut Reporter) -> Program {
    let mut parser = Parser::new(source, reporter);
    program::parse_program(&mut parser)
}

pub struct Parser<'source, 'rep, 'cb> {
    lexer: Lexer<'source>,
    current_tok: Option<Token<'source>>,
    last_end: usize,
    reporter: &'rep mut Reporter<'cb>,
}

impl<'source, 'rep, 'cb> Parser<'source, 'rep, 'cb> {
    pub fn new(source: &'source SourceMetadata<'source>, reporter: &'rep mut Reporter<'cb>) -> Self {
        Self {
            lexer: Lexer::new(source),
            current_tok: None,
            last_end: 0,
            reporter,
        }
    }

    pub fn peek_token(&mut self) -> ParseRes<Option<TokenKind>> {
        while self.current_tok.is_none() {
            let next_tok_opt = self
                .lexer
                .next_token()
                .map_err(|e| e.map_kind(ParseErrorKind::LexError))?;
            match next_tok_opt {
                None => break,
                Some(Token {
                    kind: TokenKind::Illegal,
                    lexeme,
                }) => {
                    let error = ParseError::new(ParseErrorKind::IllegalCharacter(
                        lexeme.text.to_string(),
                    ))
                    .with_source(lexeme.span, self.lexer.get_metadata());
                    self.report(error);
                }
                Some(token) => self.current_tok = Some(token),
            }
        }
        Ok(self.current_tok.as_ref().map(|x| x.kind))
    }

    /// Span of the peeked token, or an empty span at the end of input
    pub fn peek_span(&mut self) -> ParseRes<Span> {
        self.peek_token()?;
        Ok(match &self.current_tok {
            Some(tok) => tok.lexeme.span,
            None => self.lexer.current_span(),
        })
    }

    pub fn current_token_span(&self) -> Span {
        self.current_tok
            .as_ref()
            .map(|x| x.lexeme.span)
            .unwrap_or_else(|| crate::ice!("called current_token_span with no token"))
    }

    pub fn current_token_source(&self) -> &'source str {
        self.current_tok
            .as_ref()
            .map(|x| x.lexeme.text)
            .unwrap_or_else(|| crate::ice!("called current_token_source with no token"))
    }

    pub fn accept_current(&mut self) {
        if let Some(tok) = self.current_tok.take() {
            self.last_end = tok.lexeme.span.offset + tok.lexeme.span.len;
        }
    }

    /// Span from `start` to the end of the last accepted token
    pub fn span_since(&self, start: Span) -> Span {
        Span::with_len(start.offset, self.last_end.saturating_sub(start.offset))
    }

    pub fn error_at(&self, span: Span, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind).with_source(span, self.lexer.get_metadata())
    }

    pub fn emit_error_at<T>(&self, span: Span, kind: ParseErrorKind) -> ParseRes<T> {
        Err(self.error_at(span, kind))
    }

    pub fn expect_a_token(&mut self, wanted: WantedSpec<TokenKind>) -> ParseRes<TokenKind> {
        let span = self.peek_span()?;
        self.peek_token()?.map_or_else(
            || self.emit_error_at(span, ParseErrorKind::UnexpectedEOF { wanted }),
            Ok,
        )
    }

    pub fn reject_current_token<T>(&self, reason: ParseErrorKind) -> ParseRes<T> {
        let span = self.current_token_span();
        self.emit_error_at(span, reason)
    }

    pub fn expect_token(&mut self, kind: TokenKind) -> ParseRes<()> {
        self.expect_a_token(WantedSpec::Specific(kind))
            .and_then(|tok| {
                if tok != kind {
                    self.reject_current_token(ParseErrorKind::Expected {
                        wanted: WantedSpec::Specific(kind),
                        found: tok,
                    })
                } else {
                    Ok(())
                }
            })
    }

    /// Expects the token and accepts it
    pub fn eat_token(&mut self, kind: TokenKind) -> ParseRes<()> {
        self.expect_token(kind)?;
        self.accept_current();
        Ok(())
    }

    pub fn is_keyword(&mut self, kw: &'static str) -> ParseRes<bool> {
        Ok(self.peek_token()? == Some(TokenKind::Identifier) && self.current_token_source() == kw)
    }

    pub fn keyword(&mut self, kw: &'static str) -> ParseRes<()> {
        self.expect_token(TokenKind::Identifier)
            .map_err(|e| e.add_context("parsing keyword"))?;
        let src = self.current_token_source();
        if src != kw {
            self.reject_current_token(ParseErrorKind::Expected {
                wanted: WantedSpec::Description(kw),
                found: TokenKind::Identifier,
            })
        } else {
            self.accept_current();
            Ok(())
        }
    }

    pub fn parse<T>(&mut self) -> ParseRes<T>
    where
        T: Parse<'source>,
    {
        T::parse(self)
    }

    pub fn with_context<F, T>(&mut self, context: &'static str, mut cont: F) -> ParseRes<T>
    where
        F: FnMut(&mut Self) -> ParseRes<T>,
    {
        cont(self).map_err(|x| x.add_context(context))
    }

    pub fn report(&mut self, error: ParseError) {
        tracing::debug!(target: "parse", "{}", error);
        let location = error.location().cloned().unwrap_or_default();
        self.reporter.report(&location, format_args!("{}", error.kind));
    }

    /// Skips tokens until one that can end or start an item: `;`, `}`, `fn` or the end of input.
    /// None of those are consumed.
    pub fn synchronize(&mut self) {
        loop {
            match self.peek_token() {
                Ok(None | Some(TokenKind::Semicolon | TokenKind::CloseBrace)) => break,
                Ok(Some(TokenKind::Identifier)) if self.current_token_source() == "fn" => break,
                Ok(Some(_)) => self.accept_current(),
                Err(e) => self.report(e),
            }
        }
    }
}

pub type ParseRes<T> = Result<T, ParseError>;
pub type ParseError = Error<ParseErrorKind>;

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("error while lexing source: {0}")]
    LexError(#[from] LexErrorKind),
    #[error("expected {wanted}, but found instead {found}")]
    Expected {
        wanted: WantedSpec<TokenKind>,
        found: TokenKind,
    },
    #[error("unexpected end of input, expected {wanted}")]
    UnexpectedEOF { wanted: WantedSpec<TokenKind> },
    #[error("unexpected character {0:?}")]
    IllegalCharacter(String),
    #[error("integer literal {0} does not fit in 64 bits")]
    IntegerOutOfRange(String),
    #[error("expected identifier, but found keyword {0:?}")]
    KeywordAsName(String),
}

pub trait Parse<'source>: Sized {
    fn parse(parser: &mut Parser<'source, '_, '_>) -> ParseRes<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;

    fn parse_collecting(source: &str) -> (Program, Vec<String>) {
        let meta = SourceMetadata::new(source);
        let mut messages = Vec::new();
        let program = {
            let mut reporter =
                Reporter::new().with_callback(|loc, args| messages.push(format!("{} {}", loc, args)));
            parse_program(&meta, &mut reporter)
        };
        (program, messages)
    }

    #[test]
    fn equality_chain_is_left_associative() {
        let (program, errors) = parse_collecting("fn main(): bool = true == true == true;");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            program.functions[0].body.to_string(),
            "((true == true) == true)"
        );
    }

    #[test]
    fn precedence_climbing() {
        let (program, errors) = parse_collecting("fn main(): bool = 1 + 2 * 3 - 4 < 5 == 6 / 2 > 1;");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            program.functions[0].body.to_string(),
            "((((1 + (2 * 3)) - 4) < 5) == ((6 / 2) > 1))"
        );
    }

    #[test]
    fn full_function_surface() {
        let source = "
            // adds things
            fn add(a: i64, b: i64): i64 = a + b;
            fn main(): i64 = {
                x: i64 = add(1, 2);
                y := if x == 3 { x } else { 0 };
                y = y * 2;
                y
            };
            fn nothing() = {};
        ";
        let (program, errors) = parse_collecting(source);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(program.functions.len(), 3);
        assert_eq!(
            program.functions[0].to_string(),
            "fn add(a: i64, b: i64): i64 = (a + b);"
        );
        assert_eq!(
            program.functions[1].body.to_string(),
            "{ x: i64 = add(1, 2); y := if (x == 3) { x } else { 0 }; y = (y * 2); y }"
        );
    }

    #[test]
    fn unit_type_annotation() {
        let (program, errors) = parse_collecting("fn f(u: ()) = { 1; };");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(program.functions[0].parameters[0].type_name.name, "()");
        assert!(program.functions[0].return_type.is_none());
        assert!(matches!(
            &program.functions[0].body.kind,
            ExprKind::Block { expressions, tail: None } if expressions.len() == 1
        ));
    }

    #[test]
    fn recovers_and_keeps_parsing() {
        let source = "fn main(): i64 = { x := 1 +; $ x };\nfn other(): i64 = 2;";
        let (program, errors) = parse_collecting(source);
        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert!(errors[0].starts_with("<unknown source>:1:28"));
        assert!(errors[1].contains("unexpected character \"$\""));
        assert_eq!(program.functions.len(), 2);
        assert_eq!(
            program.functions[0].body.to_string(),
            "{ <error>; x }"
        );
        assert_eq!(program.functions[1].name, "other");
    }

    #[test]
    fn keyword_is_not_a_name() {
        let (_, errors) = parse_collecting("fn if() = 1;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("expected identifier, but found keyword \"if\""));
    }
}
