//! MiniJava 语法分析器
//!
//! 本模块将词法分析器生成的令牌流解析为抽象语法树 (AST)。
//! 按语法类别拆分为多个子模块，`Parser` 只保留游标与辅助方法。

mod classes;
mod types;
mod statements;
mod expressions;

use crate::ast::{Ident, NodeId, Program};
use crate::error::{MjError, MjResult, Span, parser_error};
use crate::lexer::{Token, TokenWithLocation};

/// 语法分析器
pub struct Parser {
    /// 令牌流（以 `Token::Eof` 结尾）
    pub tokens: Vec<TokenWithLocation>,
    /// 当前解析位置
    pub pos: usize,
    /// 下一个可用的节点编号
    next_id: u32,
}

impl Parser {
    /// 创建新的语法分析器
    pub fn new(tokens: Vec<TokenWithLocation>) -> Self {
        Self { tokens, pos: 0, next_id: 0 }
    }

    /// 解析整个程序：入口类后跟任意个类声明
    pub fn parse(&mut self) -> MjResult<Program> {
        let main_class = classes::parse_main_class(self)?;

        let mut classes = Vec::new();
        while !self.is_at_end() {
            if self.check(&Token::Class) {
                classes.push(classes::parse_class(self)?);
            } else {
                return Err(self.error("Expected class declaration"));
            }
        }

        log::debug!("parsed main class and {} class declaration(s)", classes.len());
        Ok(Program { main_class, classes })
    }

    /// 分配新的节点编号
    pub(crate) fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek().token, Token::Eof)
    }

    pub(crate) fn peek(&self) -> &TokenWithLocation {
        // tokens 至少包含 Eof，越界时停在最后一个令牌上
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index].token
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn previous_span(&self) -> Span {
        if self.pos == 0 {
            self.current_span()
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    pub(crate) fn advance(&mut self) -> &TokenWithLocation {
        let index = self.pos.min(self.tokens.len() - 1);
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[index]
    }

    pub(crate) fn check(&self, token: &Token) -> bool {
        &self.peek().token == token
    }

    pub(crate) fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// 消费指定令牌，否则报告期望/实际令牌
    pub(crate) fn consume(&mut self, token: &Token, context: &str) -> MjResult<Span> {
        if self.check(token) {
            Ok(self.advance().span)
        } else {
            Err(self.error(&format!(
                "Expected {} {}, found {}",
                token,
                context,
                self.peek().token
            )))
        }
    }

    pub(crate) fn consume_identifier(&mut self, context: &str) -> MjResult<Ident> {
        let current = self.peek().clone();
        match current.token {
            Token::Identifier(name) => {
                self.advance();
                Ok(Ident { name, span: current.span })
            }
            other => Err(self.error(&format!("Expected identifier {}, found {}", context, other))),
        }
    }

    pub(crate) fn error(&self, message: &str) -> MjError {
        parser_error(self.current_span(), message)
    }
}

pub fn parse(tokens: Vec<TokenWithLocation>) -> MjResult<Program> {
    let mut parser = Parser::new(tokens);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, ExprKind, Stmt, TypeName};
    use crate::lexer::lex;

    fn parse_source(source: &str) -> MjResult<Program> {
        parse(lex(source)?)
    }

    const MAIN: &str = "class Main { public static void main(String[] a) { System.out.println(1); } }";

    #[test]
    fn test_main_only() {
        let program = parse_source(MAIN).unwrap();
        assert_eq!(program.main_class.name.name, "Main");
        assert_eq!(program.main_class.args_name.name, "a");
        assert!(program.classes.is_empty());
    }

    #[test]
    fn test_class_with_members() {
        let source = format!(
            "{MAIN} class B extends A {{ int x; int[] ys; A other; \
             public boolean f(int a, B b) {{ int t; t = a; return t < 3; }} }}"
        );
        let program = parse_source(&source).unwrap();
        let class = &program.classes[0];
        assert_eq!(class.parent.as_ref().map(|p| p.name.as_str()), Some("A"));
        assert_eq!(class.fields.len(), 3);
        assert_eq!(class.fields[1].var_type.name, TypeName::IntArray);
        assert_eq!(class.fields[2].var_type.name, TypeName::Class("A".into()));
        let method = &class.methods[0];
        assert_eq!(method.params.len(), 2);
        assert_eq!(method.locals.len(), 1);
        assert_eq!(method.body.len(), 1);
        assert!(matches!(
            method.return_expr.kind,
            ExprKind::Binary { op: BinaryOp::Lt, .. }
        ));
    }

    #[test]
    fn test_precedence() {
        let source = "class Main { public static void main(String[] a) { \
                      System.out.println(1 + 2 * 3 ** 2); } }";
        let program = parse_source(source).unwrap();
        let Stmt::Print(print) = &program.main_class.body else {
            panic!("expected print");
        };
        let ExprKind::Binary { op: BinaryOp::Add, right, .. } = &print.value.kind else {
            panic!("expected addition at the root");
        };
        let ExprKind::Binary { op: BinaryOp::Mul, right, .. } = &right.kind else {
            panic!("expected multiplication");
        };
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let source = "class Main { public static void main(String[] a) { \
                      System.out.println(9 - 4 - 2); } }";
        let program = parse_source(source).unwrap();
        let Stmt::Print(print) = &program.main_class.body else {
            panic!("expected print");
        };
        let ExprKind::Binary { op: BinaryOp::Sub, left, right, .. } = &print.value.kind else {
            panic!("expected subtraction");
        };
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
        assert!(matches!(right.kind, ExprKind::IntLiteral(2)));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let source = format!(
            "{MAIN} class B {{ public int f() {{ if (true) {{ }} else {{ }} \
             while (false) {{ }} return 1; }} }}"
        );
        let program = parse_source(&source).unwrap();
        let method = &program.classes[0].methods[0];
        let Stmt::If(if_stmt) = &method.body[0] else {
            panic!("expected if");
        };
        let else_branch = if_stmt.else_branch.as_ref().unwrap();
        assert_ne!(if_stmt.then_branch.id, else_branch.id);
        assert_ne!(program.classes[0].id, method.id);
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_source(
            "class Main { public static void main(String[] a) { System.out.println(1) } }",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Expected ';'"));
    }

    #[test]
    fn test_enum_is_rejected() {
        let source = format!(
            "{MAIN} class B {{ public int f() {{ public enum Color {{ RED, GREEN }} return 1; }} }}"
        );
        let err = parse_source(&source).unwrap_err();
        assert!(err.to_string().contains("enum declarations are not supported"));
    }
}
