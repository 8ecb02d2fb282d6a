use super::{lexer::TokenKind, ParseErrorKind, Parser};
use crate::ast::Program;
use crate::error::WantedSpec;

pub(super) fn parse_program(parser: &mut Parser) -> Program {
    let mut functions = Vec::new();
    loop {
        match parser.peek_token() {
            Ok(None) => break,
            Ok(Some(_)) if is_fn(parser) => match parser.parse() {
                Ok(function) => functions.push(function),
                Err(e) => {
                    parser.report(e);
                    skip_to_next_function(parser);
                }
            },
            Ok(Some(found)) => {
                let error = parser.error_at(
                    parser.current_token_span(),
                    ParseErrorKind::Expected {
                        wanted: WantedSpec::Description("function declaration"),
                        found,
                    },
                );
                parser.report(error);
                parser.accept_current();
                skip_to_next_function(parser);
            }
            Err(e) => parser.report(e),
        }
    }
    tracing::debug!(target: "parse", "parsed {} functions", functions.len());
    Program { functions }
}

fn is_fn(parser: &mut Parser) -> bool {
    matches!(parser.is_keyword("fn"), Ok(true))
}

fn skip_to_next_function(parser: &mut Parser) {
    loop {
        match parser.peek_token() {
            Ok(None) => break,
            Ok(Some(TokenKind::Identifier)) if is_fn(parser) => break,
            Ok(Some(_)) => parser.accept_current(),
            Err(e) => parser.report(e),
        }
    }
}
