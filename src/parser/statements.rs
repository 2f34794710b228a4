//! 语句解析

use crate::ast::*;
use crate::error::{MjResult, parser_error};
use crate::lexer::Token;
use super::Parser;
use super::expressions::parse_expression;

/// 解析语句
pub fn parse_statement(parser: &mut Parser) -> MjResult<Stmt> {
    let token = parser.peek().token.clone();
    match token {
        Token::LBrace => Ok(Stmt::Block(parse_block(parser)?)),
        Token::If => parse_if_statement(parser),
        Token::While => parse_while_statement(parser),
        Token::Println => parse_print_statement(parser),
        Token::Public if matches!(parser.peek_nth(1), Token::Enum) => parse_enum_statement(parser),
        Token::Identifier(_) => parse_assignment_statement(parser),
        other => Err(parser.error(&format!("Expected statement, found {}", other))),
    }
}

/// 解析语句块
pub fn parse_block(parser: &mut Parser) -> MjResult<Block> {
    let id = parser.fresh_id();
    let start = parser.consume(&Token::LBrace, "to open block")?;

    let mut statements = Vec::new();
    while !parser.check(&Token::RBrace) && !parser.is_at_end() {
        statements.push(parse_statement(parser)?);
    }

    let end = parser.consume(&Token::RBrace, "to close block")?;
    Ok(Block { id, statements, span: start.to(end) })
}

/// 解析带独立作用域的子语句
fn parse_scoped_body(parser: &mut Parser) -> MjResult<ScopedBody> {
    let id = parser.fresh_id();
    let stmt = parse_statement(parser)?;
    Ok(ScopedBody { id, stmt: Box::new(stmt) })
}

/// 解析 if 语句
pub fn parse_if_statement(parser: &mut Parser) -> MjResult<Stmt> {
    let start = parser.consume(&Token::If, "")?;
    parser.consume(&Token::LParen, "after 'if'")?;
    let condition = parse_expression(parser)?;
    parser.consume(&Token::RParen, "after if condition")?;

    let then_branch = parse_scoped_body(parser)?;
    let else_branch = if parser.match_token(&Token::Else) {
        Some(parse_scoped_body(parser)?)
    } else {
        None
    };

    Ok(Stmt::If(IfStmt {
        condition,
        then_branch,
        else_branch,
        span: start.to(parser.previous_span()),
    }))
}

/// 解析 while 语句
pub fn parse_while_statement(parser: &mut Parser) -> MjResult<Stmt> {
    let start = parser.consume(&Token::While, "")?;
    parser.consume(&Token::LParen, "after 'while'")?;
    let condition = parse_expression(parser)?;
    parser.consume(&Token::RParen, "after while condition")?;

    let body = parse_scoped_body(parser)?;

    Ok(Stmt::While(WhileStmt {
        condition,
        body,
        span: start.to(parser.previous_span()),
    }))
}

/// 解析打印语句 `System.out.println(expr);`
pub fn parse_print_statement(parser: &mut Parser) -> MjResult<Stmt> {
    let start = parser.consume(&Token::Println, "")?;
    parser.consume(&Token::LParen, "after 'System.out.println'")?;
    let value = parse_expression(parser)?;
    parser.consume(&Token::RParen, "after print argument")?;
    let end = parser.consume(&Token::Semicolon, "after print statement")?;

    Ok(Stmt::Print(PrintStmt { value, span: start.to(end) }))
}

/// 解析赋值语句：`x = e;` 或 `x[i] = e;`
pub fn parse_assignment_statement(parser: &mut Parser) -> MjResult<Stmt> {
    let target = parser.consume_identifier("as assignment target")?;

    if parser.match_token(&Token::LBracket) {
        let index = parse_expression(parser)?;
        parser.consume(&Token::RBracket, "after array index")?;
        parser.consume(&Token::Assign, "in array assignment")?;
        let value = parse_expression(parser)?;
        parser.consume(&Token::Semicolon, "after assignment")?;
        return Ok(Stmt::ArrayAssign(ArrayAssignStmt { target, index, value }));
    }

    parser.consume(&Token::Assign, "in assignment")?;
    let value = parse_expression(parser)?;
    parser.consume(&Token::Semicolon, "after assignment")?;
    Ok(Stmt::Assign(AssignStmt { target, value }))
}

/// 解析 `public enum Name { A, B }`，随后拒绝：枚举没有语义与代码生成支持
pub fn parse_enum_statement(parser: &mut Parser) -> MjResult<Stmt> {
    let start = parser.consume(&Token::Public, "")?;
    parser.consume(&Token::Enum, "")?;
    let name = parser.consume_identifier("for enum name")?;
    parser.consume(&Token::LBrace, "after enum name")?;
    loop {
        parser.consume_identifier("for enum constant")?;
        if !parser.match_token(&Token::Comma) {
            break;
        }
    }
    let end = parser.consume(&Token::RBrace, "after enum constants")?;

    Err(parser_error(
        start.to(end),
        format!("enum declarations are not supported (enum {})", name.name),
    ))
}
