//! 表达式解析
//!
//! 优先级从低到高：`&&`、`<`、`+ -`、`*`、`**`、前缀 `!`、后缀（下标、`.length`、方法调用）。
//! 所有二元运算符都是左结合的。

use crate::ast::*;
use crate::error::{MjResult, Span};
use crate::lexer::Token;
use super::Parser;

/// 解析表达式（入口点）
pub fn parse_expression(parser: &mut Parser) -> MjResult<Expr> {
    parse_and(parser)
}

/// 构造二元表达式节点
fn binary(parser: &mut Parser, op: BinaryOp, op_span: Span, left: Expr, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr {
        id: parser.fresh_id(),
        kind: ExprKind::Binary {
            op,
            op_span,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    }
}

/// 解析逻辑与表达式
pub fn parse_and(parser: &mut Parser) -> MjResult<Expr> {
    let mut left = parse_comparison(parser)?;

    while parser.check(&Token::And) {
        let op_span = parser.advance().span;
        let right = parse_comparison(parser)?;
        left = binary(parser, BinaryOp::And, op_span, left, right);
    }

    Ok(left)
}

/// 解析比较表达式
pub fn parse_comparison(parser: &mut Parser) -> MjResult<Expr> {
    let mut left = parse_additive(parser)?;

    while parser.check(&Token::Lt) {
        let op_span = parser.advance().span;
        let right = parse_additive(parser)?;
        left = binary(parser, BinaryOp::Lt, op_span, left, right);
    }

    Ok(left)
}

/// 解析加减表达式
pub fn parse_additive(parser: &mut Parser) -> MjResult<Expr> {
    let mut left = parse_term(parser)?;

    loop {
        let op = match parser.peek().token {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            _ => break,
        };
        let op_span = parser.advance().span;
        let right = parse_term(parser)?;
        left = binary(parser, op, op_span, left, right);
    }

    Ok(left)
}

/// 解析乘法表达式
pub fn parse_term(parser: &mut Parser) -> MjResult<Expr> {
    let mut left = parse_power(parser)?;

    while parser.check(&Token::Star) {
        let op_span = parser.advance().span;
        let right = parse_power(parser)?;
        left = binary(parser, BinaryOp::Mul, op_span, left, right);
    }

    Ok(left)
}

/// 解析乘方表达式
pub fn parse_power(parser: &mut Parser) -> MjResult<Expr> {
    let mut left = parse_unary(parser)?;

    while parser.check(&Token::Power) {
        let op_span = parser.advance().span;
        let right = parse_unary(parser)?;
        left = binary(parser, BinaryOp::Pow, op_span, left, right);
    }

    Ok(left)
}

/// 解析一元表达式
pub fn parse_unary(parser: &mut Parser) -> MjResult<Expr> {
    if parser.check(&Token::Bang) {
        let start = parser.advance().span;
        let operand = parse_unary(parser)?;
        let span = start.to(operand.span);
        return Ok(Expr {
            id: parser.fresh_id(),
            kind: ExprKind::Not(Box::new(operand)),
            span,
        });
    }

    parse_postfix(parser)
}

/// 解析后缀表达式
pub fn parse_postfix(parser: &mut Parser) -> MjResult<Expr> {
    let mut expr = parse_primary(parser)?;

    loop {
        let token = parser.peek().token.clone();
        match token {
            Token::LBracket => {
                parser.advance();
                let index = parse_expression(parser)?;
                let end = parser.consume(&Token::RBracket, "after array index")?;
                let span = expr.span.to(end);
                expr = Expr {
                    id: parser.fresh_id(),
                    kind: ExprKind::Index {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                };
            }
            Token::Length => {
                let end = parser.advance().span;
                let span = expr.span.to(end);
                expr = Expr {
                    id: parser.fresh_id(),
                    kind: ExprKind::Length(Box::new(expr)),
                    span,
                };
            }
            Token::Dot => {
                parser.advance();
                let method = parser.consume_identifier("for method name")?;
                parser.consume(&Token::LParen, "after method name")?;
                let args = parse_arguments(parser)?;
                let end = parser.consume(&Token::RParen, "after arguments")?;
                let span = expr.span.to(end);
                expr = Expr {
                    id: parser.fresh_id(),
                    kind: ExprKind::Call {
                        receiver: Box::new(expr),
                        method,
                        args,
                    },
                    span,
                };
            }
            _ => break,
        }
    }

    Ok(expr)
}

/// 解析实参列表（不含括号）
pub fn parse_arguments(parser: &mut Parser) -> MjResult<Vec<Expr>> {
    let mut args = Vec::new();
    if parser.check(&Token::RParen) {
        return Ok(args);
    }

    loop {
        args.push(parse_expression(parser)?);
        if !parser.match_token(&Token::Comma) {
            break;
        }
    }

    Ok(args)
}

/// 解析基本表达式
pub fn parse_primary(parser: &mut Parser) -> MjResult<Expr> {
    let current = parser.peek().clone();
    let start = current.span;

    let kind = match current.token {
        Token::IntegerLiteral(value) => {
            parser.advance();
            ExprKind::IntLiteral(value)
        }
        Token::True => {
            parser.advance();
            ExprKind::BoolLiteral(true)
        }
        Token::False => {
            parser.advance();
            ExprKind::BoolLiteral(false)
        }
        Token::This => {
            parser.advance();
            ExprKind::This
        }
        Token::Identifier(name) => {
            parser.advance();
            ExprKind::Identifier(name)
        }
        Token::LParen => {
            parser.advance();
            let inner = parse_expression(parser)?;
            parser.consume(&Token::RParen, "after parenthesized expression")?;
            ExprKind::Paren(Box::new(inner))
        }
        Token::New => {
            parser.advance();
            if parser.match_token(&Token::Int) {
                parser.consume(&Token::LBracket, "in array instantiation")?;
                let size = parse_expression(parser)?;
                parser.consume(&Token::RBracket, "after array size")?;
                ExprKind::NewIntArray(Box::new(size))
            } else {
                let class = parser.consume_identifier("after 'new'")?;
                parser.consume(&Token::LParen, "in object instantiation")?;
                parser.consume(&Token::RParen, "in object instantiation")?;
                ExprKind::NewObject(class)
            }
        }
        other => {
            return Err(parser.error(&format!("Expected expression, found {}", other)));
        }
    };

    let span = start.to(parser.previous_span());
    Ok(Expr { id: parser.fresh_id(), kind, span })
}
