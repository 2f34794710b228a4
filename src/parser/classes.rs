//! 类相关解析

use crate::ast::*;
use crate::error::MjResult;
use crate::lexer::Token;
use super::Parser;
use super::types::{parse_type, is_var_decl_start};
use super::expressions::parse_expression;
use super::statements::parse_statement;

/// 解析入口类
pub fn parse_main_class(parser: &mut Parser) -> MjResult<MainClass> {
    let id = parser.fresh_id();
    parser.consume(&Token::Class, "at start of program")?;
    let name = parser.consume_identifier("for main class name")?;
    parser.consume(&Token::LBrace, "after main class name")?;

    parser.consume(&Token::Public, "before main method")?;
    parser.consume(&Token::Static, "before main method")?;
    parser.consume(&Token::Void, "before main method")?;
    parser.consume(&Token::Main, "as entry method name")?;
    parser.consume(&Token::LParen, "after 'main'")?;
    parser.consume(&Token::StringKw, "in main parameter")?;
    parser.consume(&Token::LBracket, "in main parameter")?;
    parser.consume(&Token::RBracket, "in main parameter")?;
    let args_name = parser.consume_identifier("for main parameter")?;
    parser.consume(&Token::RParen, "after main parameter")?;

    parser.consume(&Token::LBrace, "before main body")?;
    let body = parse_statement(parser)?;
    parser.consume(&Token::RBrace, "after main body")?;
    parser.consume(&Token::RBrace, "after main class body")?;

    Ok(MainClass { id, name, args_name, body })
}

/// 解析类声明
pub fn parse_class(parser: &mut Parser) -> MjResult<ClassDecl> {
    let id = parser.fresh_id();
    parser.consume(&Token::Class, "before class declaration")?;
    let name = parser.consume_identifier("for class name")?;

    let parent = if parser.match_token(&Token::Extends) {
        Some(parser.consume_identifier("after 'extends'")?)
    } else {
        None
    };

    parser.consume(&Token::LBrace, "after class declaration")?;

    // 字段必须出现在所有方法之前
    let mut fields = Vec::new();
    while is_var_decl_start(parser) {
        fields.push(parse_var_decl(parser)?);
    }

    let mut methods = Vec::new();
    while parser.check(&Token::Public) {
        methods.push(parse_method(parser)?);
    }

    parser.consume(&Token::RBrace, "after class body")?;

    Ok(ClassDecl { id, name, parent, fields, methods })
}

/// 解析变量声明（字段或局部变量）
pub fn parse_var_decl(parser: &mut Parser) -> MjResult<VarDecl> {
    let var_type = parse_type(parser)?;
    let name = parser.consume_identifier("for variable name")?;
    parser.consume(&Token::Semicolon, "after variable declaration")?;
    Ok(VarDecl { var_type, name })
}

/// 解析方法声明
pub fn parse_method(parser: &mut Parser) -> MjResult<MethodDecl> {
    let id = parser.fresh_id();
    parser.consume(&Token::Public, "before method declaration")?;
    let return_type = parse_type(parser)?;
    let name = parser.consume_identifier("for method name")?;

    parser.consume(&Token::LParen, "after method name")?;
    let params = parse_parameters(parser)?;
    parser.consume(&Token::RParen, "after parameters")?;

    parser.consume(&Token::LBrace, "before method body")?;

    let mut locals = Vec::new();
    while is_var_decl_start(parser) {
        locals.push(parse_var_decl(parser)?);
    }

    let mut body = Vec::new();
    while !parser.check(&Token::Return) && !parser.is_at_end() {
        body.push(parse_statement(parser)?);
    }

    let return_span = parser.consume(&Token::Return, "at end of method body")?;
    let return_expr = parse_expression(parser)?;
    parser.consume(&Token::Semicolon, "after return expression")?;
    parser.consume(&Token::RBrace, "after method body")?;

    Ok(MethodDecl {
        id,
        return_type,
        name,
        params,
        locals,
        body,
        return_expr,
        return_span,
    })
}

/// 解析形参列表，保持书写顺序
pub fn parse_parameters(parser: &mut Parser) -> MjResult<Vec<VarDecl>> {
    let mut params = Vec::new();
    if parser.check(&Token::RParen) {
        return Ok(params);
    }

    loop {
        let var_type = parse_type(parser)?;
        let name = parser.consume_identifier("for parameter name")?;
        params.push(VarDecl { var_type, name });
        if !parser.match_token(&Token::Comma) {
            break;
        }
    }

    Ok(params)
}
