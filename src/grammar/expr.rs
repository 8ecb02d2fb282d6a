use super::lexer::{TokenKind, KEYWORDS};
use super::{Parse, ParseErrorKind, ParseRes, Parser};
use crate::ast::{BinaryOperator, Expr, ExprKind, TypeName};
use crate::error::{Span, WantedSpec};

impl<'source> Parse<'source> for Expr {
    fn parse(parser: &mut Parser<'source, '_, '_>) -> ParseRes<Self> {
        parser.with_context("parsing expression", |parser| {
            // `name :` starts a declaration, which needs a second token of lookahead
            let lhs = if parser.peek_token()? == Some(TokenKind::Identifier)
                && !KEYWORDS.contains(&parser.current_token_source())
            {
                let span = parser.current_token_span();
                let name = parser.current_token_source().to_string();
                parser.accept_current();
                if parser.peek_token()? == Some(TokenKind::Colon) {
                    return parse_declaration(parser, name, span);
                }
                parse_name(parser, name, span)?
            } else {
                parse_primary(parser)?
            };
            let lhs = parse_binary_expression(parser, lhs, 0)
                .map_err(|e| e.add_context("parsing binary expression"))?;
            parse_assignment(parser, lhs)
        })
    }
}

impl<'source> Parse<'source> for TypeName {
    fn parse(parser: &mut Parser<'source, '_, '_>) -> ParseRes<Self> {
        parser.with_context("parsing type", |parser| {
            let span = parser.peek_span()?;
            match parser.expect_a_token(WantedSpec::Description("type"))? {
                TokenKind::Identifier => {
                    let name = parser.current_token_source().to_string();
                    parser.accept_current();
                    Ok(TypeName { name, span })
                }
                TokenKind::OpenParen => {
                    parser.accept_current();
                    parser.eat_token(TokenKind::CloseParen)?;
                    Ok(TypeName {
                        name: "()".to_string(),
                        span: parser.span_since(span),
                    })
                }
                found => parser.reject_current_token(ParseErrorKind::Expected {
                    wanted: WantedSpec::Description("type"),
                    found,
                }),
            }
        })
    }
}

/// Parses an identifier that is not a keyword
pub(super) fn parse_identifier(parser: &mut Parser) -> ParseRes<(String, Span)> {
    parser.expect_token(TokenKind::Identifier)?;
    let source = parser.current_token_source();
    if KEYWORDS.contains(&source) {
        return parser.reject_current_token(ParseErrorKind::KeywordAsName(source.to_string()));
    }
    let span = parser.current_token_span();
    parser.accept_current();
    Ok((source.to_string(), span))
}

/// Parses an expression, reporting and skipping over it if it is malformed.
pub(super) fn parse_or_recover(parser: &mut Parser) -> Expr {
    let start = match parser.peek_span() {
        Ok(span) => span,
        Err(e) => {
            parser.report(e);
            return Expr::error(parser.span_since(Span::default()));
        }
    };
    match parser.parse() {
        Ok(expr) => expr,
        Err(e) => {
            parser.report(e);
            parser.synchronize();
            Expr::error(parser.span_since(start))
        }
    }
}

fn parse_declaration(parser: &mut Parser, name: String, name_span: Span) -> ParseRes<Expr> {
    parser.with_context("parsing variable declaration", |parser| {
        parser.eat_token(TokenKind::Colon)?;
        let type_name = if parser.peek_token()? == Some(TokenKind::Equals) {
            None
        } else {
            Some(parser.parse()?)
        };
        parser.eat_token(TokenKind::Equals)?;
        let initializer: Expr = parser.parse()?;
        let span = name_span.to(initializer.span);
        Ok(Expr::new(
            ExprKind::VariableDeclaration {
                name: name.clone(),
                type_name,
                initializer: Box::new(initializer),
            },
            span,
        ))
    })
}

// right associative: `a = b = c` is `a = (b = c)`
fn parse_assignment(parser: &mut Parser, target: Expr) -> ParseRes<Expr> {
    if parser.peek_token()? != Some(TokenKind::Equals) {
        return Ok(target);
    }
    parser.accept_current();
    let value: Expr = parser.parse()?;
    let span = target.span.to(value.span);
    Ok(Expr::new(
        ExprKind::Assignment {
            target: Box::new(target),
            value: Box::new(value),
        },
        span,
    ))
}

// literals, names, calls, parenthesis, blocks and ifs
fn parse_primary(parser: &mut Parser) -> ParseRes<Expr> {
    parser.with_context("parsing primary expression", |parser| {
        let span = parser.peek_span()?;
        match parser.expect_a_token(WantedSpec::Description("expression"))? {
            TokenKind::Number => {
                let source = parser.current_token_source();
                let value = source.parse::<i64>().or_else(|_| {
                    parser.reject_current_token(ParseErrorKind::IntegerOutOfRange(
                        source.to_string(),
                    ))
                })?;
                parser.accept_current();
                Ok(Expr::new(ExprKind::Integer(value), span))
            }
            TokenKind::Identifier => match parser.current_token_source() {
                "true" | "false" => {
                    let value = parser.current_token_source() == "true";
                    parser.accept_current();
                    Ok(Expr::new(ExprKind::Boolean(value), span))
                }
                "if" => parse_if(parser),
                _ => {
                    let (name, span) = parse_identifier(parser)?;
                    parse_name(parser, name, span)
                }
            },
            TokenKind::OpenParen => {
                parser.accept_current();
                let inner: Expr = parser.parse()?;
                parser
                    .eat_token(TokenKind::CloseParen)
                    .map_err(|x| x.add_context("as the end of the expression"))?;
                Ok(Expr::new(inner.kind, parser.span_since(span)))
            }
            TokenKind::OpenBrace => parse_block(parser),
            found => parser.reject_current_token(ParseErrorKind::Expected {
                found,
                wanted: WantedSpec::Description("expression"),
            }),
        }
    })
}

// an already consumed identifier: either a call or a variable reference
fn parse_name(parser: &mut Parser, name: String, span: Span) -> ParseRes<Expr> {
    if parser.peek_token()? != Some(TokenKind::OpenParen) {
        return Ok(Expr::new(ExprKind::VariableReference(name), span));
    }
    parser.with_context("parsing function call arguments", |parser| {
        parser.accept_current();
        let mut arguments = Vec::new();
        while parser.expect_a_token(WantedSpec::Description("argument or ')'"))?
            != TokenKind::CloseParen
        {
            arguments.push(parser.parse()?);
            if parser.expect_a_token(WantedSpec::Description("comma or ')'"))? != TokenKind::Comma
            {
                break;
            }
            parser.accept_current();
        }
        parser.eat_token(TokenKind::CloseParen)?;
        Ok(Expr::new(
            ExprKind::FunctionCall {
                name: name.clone(),
                arguments,
            },
            parser.span_since(span),
        ))
    })
}

fn parse_if(parser: &mut Parser) -> ParseRes<Expr> {
    parser.with_context("parsing if expression", |parser| {
        let start = parser.peek_span()?;
        parser.keyword("if")?;
        let condition: Expr = parser.parse()?;
        let then: Expr = parser.parse()?;
        let otherwise = if parser.is_keyword("else")? {
            parser.accept_current();
            Some(Box::new(parser.parse::<Expr>()?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise,
            },
            parser.span_since(start),
        ))
    })
}

// `{ a; b; tail }`, a malformed element is replaced by an error placeholder
fn parse_block(parser: &mut Parser) -> ParseRes<Expr> {
    parser.with_context("parsing block", |parser| {
        let start = parser.peek_span()?;
        parser.eat_token(TokenKind::OpenBrace)?;
        let mut expressions = Vec::new();
        let mut tail = None;
        while parser.expect_a_token(WantedSpec::Description("expression or '}'"))?
            != TokenKind::CloseBrace
        {
            let expr = super::expr::parse_or_recover(parser);
            match parser.peek_token()? {
                Some(TokenKind::Semicolon) => {
                    parser.accept_current();
                    expressions.push(expr);
                }
                Some(TokenKind::CloseBrace) => {
                    tail = Some(Box::new(expr));
                    break;
                }
                Some(found) if !parser.is_keyword("fn")? => {
                    let error = parser.error_at(
                        parser.current_token_span(),
                        ParseErrorKind::Expected {
                            wanted: WantedSpec::Description("';' or '}' after expression"),
                            found,
                        },
                    );
                    parser.report(error);
                    parser.synchronize();
                    expressions.push(expr);
                    if parser.peek_token()? == Some(TokenKind::Semicolon) {
                        parser.accept_current();
                    }
                }
                // unterminated block, always an error; the caller recovers
                _ => parser.expect_token(TokenKind::CloseBrace)?,
            }
        }
        parser.eat_token(TokenKind::CloseBrace)?;
        Ok(Expr::new(
            ExprKind::Block {
                expressions,
                tail,
            },
            parser.span_since(start),
        ))
    })
}

/// Precedence climbing, every operator is left associative
fn parse_binary_expression(parser: &mut Parser, mut lhs: Expr, min_precedence: u8) -> ParseRes<Expr> {
    while let Some(op) = next_operator(parser)?.filter(|op| op.precedence() >= min_precedence) {
        parser.accept_current();
        let mut rhs = parse_primary(parser)?;
        while let Some(next) =
            next_operator(parser)?.filter(|next| next.precedence() > op.precedence())
        {
            rhs = parse_binary_expression(parser, rhs, next.precedence())?;
        }
        let span = lhs.span.to(rhs.span);
        lhs = Expr::new(
            ExprKind::Binary {
                operator: op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        );
    }
    Ok(lhs)
}

fn next_operator(parser: &mut Parser) -> ParseRes<Option<BinaryOperator>> {
    Ok(parser
        .peek_token()?
        .and_then(TokenKind::as_operator)
        .map(BinaryOperator::from_operator))
}
