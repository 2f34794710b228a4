//! 使用前初始化检查
//!
//! 每个方法/块作用域维护一个“离开该作用域时已初始化”的符号集合。
//! if/else 只把两个分支都初始化的变量并入外层；while 循环体可能一次都不执行，
//! 所以不向外传播；普通 `{}` 块总会执行，离开时整体并入外层。

use rustc_hash::FxHashSet;

use crate::ast::*;
use crate::error::{Diagnostics, SemanticError, Span};
use crate::types::{ScopeId, SymbolId, SymbolTable};
use super::ScopeMap;

pub struct InitializationChecker<'a> {
    table: &'a mut SymbolTable,
    scopes: &'a ScopeMap,
    diagnostics: Diagnostics,
    current: ScopeId,
}

impl<'a> InitializationChecker<'a> {
    pub fn new(table: &'a mut SymbolTable, scopes: &'a ScopeMap) -> Self {
        let current = table.int().scope();
        Self {
            table,
            scopes,
            diagnostics: Diagnostics::new(),
            current,
        }
    }

    pub fn check(mut self, program: &Program) -> Diagnostics {
        self.enter(program.main_class.id);
        self.check_statement(&program.main_class.body);

        for class in &program.classes {
            self.enter(class.id);
            for method in &class.methods {
                let previous = self.enter(method.id);
                for stmt in &method.body {
                    self.check_statement(stmt);
                }
                self.check_reads(&method.return_expr);
                self.current = previous;
            }
        }

        self.diagnostics
    }

    fn enter(&mut self, node: NodeId) -> ScopeId {
        let previous = self.current;
        if let Some(&scope) = self.scopes.get(&node) {
            self.current = scope;
        }
        previous
    }

    /// 在分支自己的块作用域中分析，返回该分支内初始化的符号
    fn check_branch(&mut self, body: &ScopedBody) -> FxHashSet<SymbolId> {
        let previous = self.enter(body.id);
        self.check_statement(&body.stmt);
        let initialized = self.table.initialized_set(self.current);
        self.current = previous;
        initialized
    }

    fn check_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                let previous = self.enter(block.id);
                for stmt in &block.statements {
                    self.check_statement(stmt);
                }
                let initialized = self.table.initialized_set(self.current);
                self.current = previous;
                for symbol in initialized {
                    self.table.initialize(self.current, symbol);
                }
            }
            Stmt::If(if_stmt) => {
                self.check_reads(&if_stmt.condition);
                let then_set = self.check_branch(&if_stmt.then_branch);
                let else_set = match &if_stmt.else_branch {
                    Some(else_branch) => self.check_branch(else_branch),
                    None => FxHashSet::default(),
                };
                for &symbol in then_set.intersection(&else_set) {
                    self.table.initialize(self.current, symbol);
                }
            }
            Stmt::While(while_stmt) => {
                self.check_reads(&while_stmt.condition);
                self.check_branch(&while_stmt.body);
            }
            Stmt::Print(print) => self.check_reads(&print.value),
            Stmt::Assign(assign) => {
                self.check_reads(&assign.value);
                if let Some(symbol) = self.table.lookup(self.current, &assign.target.name) {
                    self.table.initialize(self.current, symbol);
                }
            }
            Stmt::ArrayAssign(assign) => {
                self.check_read(&assign.target.name, assign.target.span);
                self.check_reads(&assign.index);
                self.check_reads(&assign.value);
            }
        }
    }

    fn check_read(&mut self, name: &str, span: Span) {
        let Some(symbol) = self.table.lookup(self.current, name) else {
            return;
        };
        if !self.table.is_initialized(self.current, symbol) {
            self.diagnostics.report(SemanticError::MayBeUninitialized {
                name: name.to_string(),
                span: span.into(),
                at: span.loc,
            });
        }
    }

    /// 检查表达式中所有标识符读取
    fn check_reads(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::IntLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::This
            | ExprKind::NewObject(_) => {}
            ExprKind::Identifier(name) => self.check_read(name, expr.span),
            ExprKind::Paren(inner)
            | ExprKind::Not(inner)
            | ExprKind::Length(inner)
            | ExprKind::NewIntArray(inner) => self.check_reads(inner),
            ExprKind::Binary { left, right, .. } => {
                self.check_reads(left);
                self.check_reads(right);
            }
            ExprKind::Index { array, index } => {
                self.check_reads(array);
                self.check_reads(index);
            }
            ExprKind::Call { receiver, args, .. } => {
                self.check_reads(receiver);
                for arg in args {
                    self.check_reads(arg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use crate::lexer::lex;
    use crate::parser::parse;
    use crate::semantic::scope_builder::ScopeBuilder;

    fn check_method(locals: &str, body: &str, ret: &str) -> Vec<DiagnosticKind> {
        let source = format!(
            "class Main {{ public static void main(String[] a) {{ System.out.println(1); }} }} \
             class A {{ int field; public int f(int p, boolean c) {{ {locals} {body} return {ret}; }} }}"
        );
        let program = parse(lex(&source).unwrap()).unwrap();
        let mut build = ScopeBuilder::new().build(&program).unwrap();
        InitializationChecker::new(&mut build.table, &build.scopes)
            .check(&program)
            .kinds()
    }

    #[test]
    fn test_parameters_and_fields_are_initialized() {
        assert!(check_method("", "", "p + field").is_empty());
    }

    #[test]
    fn test_read_before_assignment() {
        assert_eq!(check_method("int x;", "", "x"), vec![DiagnosticKind::MayBeUninitialized]);
    }

    #[test]
    fn test_assignment_initializes() {
        assert!(check_method("int x;", "x = 1;", "x").is_empty());
    }

    #[test]
    fn test_both_arms_initialize() {
        let kinds = check_method("int x;", "if (c) { x = 1; } else { x = 2; }", "x");
        assert!(kinds.is_empty());
    }

    #[test]
    fn test_single_arm_does_not_initialize() {
        let kinds = check_method("int x;", "if (c) { x = 1; } else { p = 2; }", "x");
        assert_eq!(kinds, vec![DiagnosticKind::MayBeUninitialized]);
        let kinds = check_method("int x;", "if (c) { x = 1; }", "x");
        assert_eq!(kinds, vec![DiagnosticKind::MayBeUninitialized]);
    }

    #[test]
    fn test_while_body_does_not_propagate() {
        let kinds = check_method("int x;", "while (c) { x = 1; } System.out.println(x);", "0");
        assert_eq!(kinds, vec![DiagnosticKind::MayBeUninitialized]);
    }

    #[test]
    fn test_reads_inside_branch_see_branch_assignments() {
        let kinds = check_method("int x;", "while (c) { x = 1; System.out.println(x); }", "0");
        assert!(kinds.is_empty());
    }

    #[test]
    fn test_nested_arms_propagate_through_intersection() {
        let kinds = check_method(
            "int x;",
            "if (c) { if (c) { x = 1; } else { x = 2; } } else { x = 3; }",
            "x",
        );
        assert!(kinds.is_empty());
    }

    #[test]
    fn test_plain_block_propagates() {
        assert!(check_method("int x;", "{ x = 1; }", "x").is_empty());
    }

    #[test]
    fn test_array_target_is_read() {
        let kinds = check_method("int[] xs;", "xs[0] = 1;", "0");
        assert_eq!(kinds, vec![DiagnosticKind::MayBeUninitialized]);
    }

    #[test]
    fn test_analysis_continues_after_error() {
        let kinds = check_method("int x; int y;", "System.out.println(x);", "y");
        assert_eq!(
            kinds,
            vec![DiagnosticKind::MayBeUninitialized, DiagnosticKind::MayBeUninitialized]
        );
    }
}
