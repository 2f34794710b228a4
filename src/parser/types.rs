//! 类型解析

use crate::ast::{TypeName, TypeRef};
use crate::error::MjResult;
use crate::lexer::Token;
use super::Parser;

/// 解析类型：`int[]`、`int`、`boolean` 或类名
pub fn parse_type(parser: &mut Parser) -> MjResult<TypeRef> {
    let start = parser.current_span();
    let name = match parser.peek().token.clone() {
        Token::Int => {
            parser.advance();
            if parser.match_token(&Token::LBracket) {
                parser.consume(&Token::RBracket, "in array type")?;
                TypeName::IntArray
            } else {
                TypeName::Int
            }
        }
        Token::Boolean => {
            parser.advance();
            TypeName::Boolean
        }
        Token::Identifier(name) => {
            parser.advance();
            TypeName::Class(name)
        }
        other => return Err(parser.error(&format!("Expected type, found {}", other))),
    };

    Ok(TypeRef { name, span: start.to(parser.previous_span()) })
}

/// 当前位置是否为变量声明的开头
///
/// `int`/`boolean` 一定开始声明；标识符只有紧跟另一个标识符时才是类类型声明，
/// 否则是赋值语句。
pub fn is_var_decl_start(parser: &Parser) -> bool {
    match parser.peek_nth(0) {
        Token::Int | Token::Boolean => true,
        Token::Identifier(_) => matches!(parser.peek_nth(1), Token::Identifier(_)),
        _ => false,
    }
}
