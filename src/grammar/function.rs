use super::expr::{parse_identifier, parse_or_recover};
use super::{lexer::TokenKind, Parse, ParseRes, Parser};
use crate::ast::{FunctionDeclaration, Parameter};
use crate::error::WantedSpec;

impl<'source> Parse<'source> for FunctionDeclaration {
    fn parse(parser: &mut Parser<'source, '_, '_>) -> ParseRes<Self> {
        parser.with_context("parsing function", |parser| {
            parser.keyword("fn")?;
            let (name, span) = parse_identifier(parser)?;
            parser.eat_token(TokenKind::OpenParen)?;

            let mut parameters = Vec::new();
            while parser.expect_a_token(WantedSpec::Description(
                "parameter or ')' to close the parameter list",
            ))? != TokenKind::CloseParen
            {
                parameters.push(parser.parse()?);
                if parser.expect_a_token(WantedSpec::Description("comma or ')'"))?
                    != TokenKind::Comma
                {
                    break;
                }
                parser.accept_current();
            }
            parser.eat_token(TokenKind::CloseParen)?;

            let return_type = if parser.peek_token()? == Some(TokenKind::Colon) {
                parser.accept_current();
                Some(parser.parse()?)
            } else {
                None
            };
            parser.eat_token(TokenKind::Equals)?;

            let body = parse_or_recover(parser);
            // a missing `;` loses nothing, report it and keep the function
            if let Err(e) = parser.eat_token(TokenKind::Semicolon) {
                parser.report(e);
                parser.synchronize();
                if parser.peek_token()? == Some(TokenKind::Semicolon) {
                    parser.accept_current();
                }
            }

            Ok(Self {
                name,
                span,
                parameters,
                return_type,
                body,
            })
        })
    }
}

impl<'source> Parse<'source> for Parameter {
    fn parse(parser: &mut Parser<'source, '_, '_>) -> ParseRes<Self> {
        parser.with_context("parsing parameter", |parser| {
            let (name, span) = parse_identifier(parser)?;
            parser.eat_token(TokenKind::Colon)?;
            let type_name = parser.parse()?;
            Ok(Self {
                name,
                type_name,
                span,
            })
        })
    }
}
