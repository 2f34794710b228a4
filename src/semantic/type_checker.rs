//! 类型检查
//!
//! 自底向上计算每个表达式的静态类型。已出错的子表达式类型为 None，
//! 依赖它的检查直接跳过，不产生级联诊断。

use crate::ast::*;
use crate::error::{Diagnostics, SemanticError, Span, SymbolKind};
use crate::types::{KlassId, ScopeId, SymbolTable};
use super::{ScopeMap, TypeAnnotations};

pub struct TypeChecker<'a> {
    table: &'a SymbolTable,
    scopes: &'a ScopeMap,
    annotations: TypeAnnotations,
    diagnostics: Diagnostics,
    current: ScopeId,
}

impl<'a> TypeChecker<'a> {
    pub fn new(table: &'a SymbolTable, scopes: &'a ScopeMap) -> Self {
        Self {
            table,
            scopes,
            annotations: TypeAnnotations::default(),
            diagnostics: Diagnostics::new(),
            current: table.int().scope(),
        }
    }

    pub fn check(mut self, program: &Program) -> (TypeAnnotations, Diagnostics) {
        self.enter(program.main_class.id);
        self.check_statement(&program.main_class.body);

        for class in &program.classes {
            self.enter(class.id);
            for method in &class.methods {
                self.check_method(method);
            }
        }

        log::debug!(
            "typed {} expression(s), {} call receiver(s)",
            self.annotations.expr_types.len(),
            self.annotations.receiver_types.len()
        );
        (self.annotations, self.diagnostics)
    }

    /// 切换到语法节点对应的作用域，返回原作用域
    fn enter(&mut self, node: NodeId) -> ScopeId {
        let previous = self.current;
        if let Some(&scope) = self.scopes.get(&node) {
            self.current = scope;
        }
        previous
    }

    fn type_name(&self, ty: Option<KlassId>) -> String {
        self.table.type_name(ty)
    }

    fn mismatch(&mut self, required: KlassId, found: KlassId, span: Span) {
        self.diagnostics.report(SemanticError::TypeMismatch {
            required: self.type_name(Some(required)),
            found: self.type_name(Some(found)),
            span: span.into(),
            at: span.loc,
        });
    }

    /// 要求类型恰好为 `expected`（同一性而非子类型）
    fn expect_exact(&mut self, found: Option<KlassId>, expected: KlassId, span: Span) {
        if let Some(found) = found {
            if found != expected {
                self.mismatch(expected, found, span);
            }
        }
    }

    fn unresolved(&mut self, kind: SymbolKind, name: &str, location: String, span: Span) {
        self.diagnostics.report(SemanticError::UnresolvedSymbol {
            kind,
            name: name.to_string(),
            location,
            span: span.into(),
            at: span.loc,
        });
    }

    fn current_class_name(&self) -> String {
        self.table.klass_name(self.table.enclosing_klass(self.current)).to_string()
    }

    fn check_method(&mut self, decl: &MethodDecl) {
        let table = self.table;
        let previous = self.enter(decl.id);
        let Some(method) = table.method(self.current) else {
            self.current = previous;
            return;
        };

        self.check_override(decl, method.owner, method.return_type);

        for stmt in &decl.body {
            self.check_statement(stmt);
        }

        let actual = self.check_expression(&decl.return_expr);
        if let (Some(actual), Some(formal)) = (actual, method.return_type) {
            if !table.is_instance_of(actual, formal) {
                self.mismatch(formal, actual, decl.return_expr.span);
            }
        }

        self.current = previous;
    }

    /// 覆盖父类方法时返回类型必须完全相同
    fn check_override(&mut self, decl: &MethodDecl, owner: KlassId, return_type: Option<KlassId>) {
        let table = self.table;
        let Some(superclass) = table.klass(owner).superclass else {
            return;
        };
        let Some(overridden) = table.lookup_method(superclass, &decl.name.name) else {
            return;
        };
        let Some(overridden) = table.method(overridden) else {
            return;
        };

        if let (Some(found), Some(required)) = (return_type, overridden.return_type) {
            if found != required {
                self.diagnostics.report(SemanticError::IncompatibleOverrideReturnType {
                    method: format!("{}()", decl.name.name),
                    class: table.klass_name(owner).to_string(),
                    ancestor: table.klass_name(overridden.owner).to_string(),
                    required: self.type_name(Some(required)),
                    found: self.type_name(Some(found)),
                    span: decl.name.span.into(),
                    at: decl.name.span.loc,
                });
            }
        }
    }

    fn check_scoped_body(&mut self, body: &ScopedBody) {
        let previous = self.enter(body.id);
        self.check_statement(&body.stmt);
        self.current = previous;
    }

    fn check_statement(&mut self, stmt: &Stmt) {
        let boolean = self.table.boolean();
        let int = self.table.int();

        match stmt {
            Stmt::Block(block) => {
                let previous = self.enter(block.id);
                for stmt in &block.statements {
                    self.check_statement(stmt);
                }
                self.current = previous;
            }
            Stmt::If(if_stmt) => {
                let condition = self.check_expression(&if_stmt.condition);
                self.expect_exact(condition, boolean, if_stmt.condition.span);
                self.check_scoped_body(&if_stmt.then_branch);
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.check_scoped_body(else_branch);
                }
            }
            Stmt::While(while_stmt) => {
                let condition = self.check_expression(&while_stmt.condition);
                self.expect_exact(condition, boolean, while_stmt.condition.span);
                self.check_scoped_body(&while_stmt.body);
            }
            Stmt::Print(print) => {
                let value = self.check_expression(&print.value);
                self.expect_exact(value, int, print.value.span);
            }
            Stmt::Assign(assign) => {
                let value = self.check_expression(&assign.value);
                match self.table.lookup(self.current, &assign.target.name) {
                    None => {
                        let location = self.current_class_name();
                        self.unresolved(SymbolKind::Variable, &assign.target.name, location, assign.target.span);
                    }
                    Some(symbol) => {
                        let target = self.table.symbol(symbol).ty;
                        if let (Some(value), Some(target)) = (value, target) {
                            if !self.table.is_instance_of(value, target) {
                                self.mismatch(target, value, assign.value.span);
                            }
                        }
                    }
                }
            }
            Stmt::ArrayAssign(assign) => {
                let index = self.check_expression(&assign.index);
                let value = self.check_expression(&assign.value);
                match self.table.lookup(self.current, &assign.target.name) {
                    None => {
                        let location = self.current_class_name();
                        self.unresolved(SymbolKind::Variable, &assign.target.name, location, assign.target.span);
                    }
                    Some(symbol) => {
                        let target = self.table.symbol(symbol).ty;
                        self.expect_exact(target, self.table.int_array(), assign.target.span);
                    }
                }
                self.expect_exact(index, int, assign.index.span);
                self.expect_exact(value, int, assign.value.span);
            }
        }
    }

    /// 计算表达式的静态类型并记录到侧表
    fn check_expression(&mut self, expr: &Expr) -> Option<KlassId> {
        let ty = self.expression_type(expr);
        if let Some(ty) = ty {
            self.annotations.expr_types.insert(expr.id, ty);
        }
        ty
    }

    fn expression_type(&mut self, expr: &Expr) -> Option<KlassId> {
        let int = self.table.int();
        let boolean = self.table.boolean();
        let int_array = self.table.int_array();

        match &expr.kind {
            ExprKind::IntLiteral(_) => Some(int),
            ExprKind::BoolLiteral(_) => Some(boolean),
            ExprKind::This => Some(self.table.enclosing_klass(self.current)),
            ExprKind::Identifier(name) => match self.table.lookup(self.current, name) {
                Some(symbol) => self.table.symbol(symbol).ty,
                None => {
                    let location = self.current_class_name();
                    self.unresolved(SymbolKind::Variable, name, location, expr.span);
                    None
                }
            },
            ExprKind::Paren(inner) => self.check_expression(inner),
            ExprKind::Binary { op, op_span, left, right } => {
                let left = self.check_expression(left);
                let right = self.check_expression(right);
                let (operand, result) = match op {
                    BinaryOp::And => (boolean, boolean),
                    BinaryOp::Lt => (int, boolean),
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Pow => (int, int),
                };
                if let (Some(l), Some(r)) = (left, right) {
                    if l != operand || r != operand {
                        self.diagnostics.report(SemanticError::BinaryOperatorTypeMismatch {
                            op: op.to_string(),
                            left: self.type_name(left),
                            right: self.type_name(right),
                            span: (*op_span).into(),
                            at: op_span.loc,
                        });
                    }
                }
                Some(result)
            }
            ExprKind::Not(operand) => {
                let found = self.check_expression(operand);
                if let Some(found) = found {
                    if found != boolean {
                        self.diagnostics.report(SemanticError::UnaryOperatorTypeMismatch {
                            op: "!".to_string(),
                            operand: self.type_name(Some(found)),
                            span: expr.span.into(),
                            at: expr.span.loc,
                        });
                    }
                }
                Some(boolean)
            }
            ExprKind::Index { array, index } => {
                let array_ty = self.check_expression(array);
                let index_ty = self.check_expression(index);
                self.expect_exact(array_ty, int_array, array.span);
                self.expect_exact(index_ty, int, index.span);
                Some(int)
            }
            ExprKind::Length(array) => {
                let found = self.check_expression(array);
                if let Some(found) = found {
                    if found != int_array {
                        self.diagnostics.report(SemanticError::UnaryOperatorTypeMismatch {
                            op: ".length".to_string(),
                            operand: self.type_name(Some(found)),
                            span: expr.span.into(),
                            at: expr.span.loc,
                        });
                    }
                }
                Some(int)
            }
            ExprKind::Call { receiver, method, args } => self.check_call(expr, receiver, method, args),
            ExprKind::NewObject(class) => {
                let found = self.table.class(&class.name);
                if found.is_none() {
                    let location = self.current_class_name();
                    self.unresolved(SymbolKind::Class, &class.name, location, class.span);
                }
                found
            }
            ExprKind::NewIntArray(size) => {
                let found = self.check_expression(size);
                self.expect_exact(found, int, size.span);
                Some(int_array)
            }
        }
    }

    /// 方法调用：记录接收者静态类型，沿父类链按名字解析，检查实参
    fn check_call(&mut self, call: &Expr, receiver: &Expr, name: &Ident, args: &[Expr]) -> Option<KlassId> {
        let receiver_ty = self.check_expression(receiver);
        let arg_types: Vec<Option<KlassId>> = args.iter().map(|arg| self.check_expression(arg)).collect();

        let receiver_ty = receiver_ty?;
        self.annotations.receiver_types.insert(call.id, receiver_ty);

        let table = self.table;
        let Some(method) = table
            .lookup_method(receiver_ty, &name.name)
            .and_then(|scope| table.method(scope))
        else {
            let location = self.type_name(Some(receiver_ty));
            self.unresolved(SymbolKind::Method, &name.name, location, name.span);
            return None;
        };

        let params: Vec<Option<KlassId>> = method
            .params()
            .iter()
            .map(|&param| table.symbol(param).ty)
            .collect();

        let compatible = params.len() == arg_types.len()
            && params.iter().zip(&arg_types).all(|(param, arg)| match (param, arg) {
                (Some(param), Some(arg)) => table.is_instance_of(*arg, *param),
                _ => true,
            });

        if !compatible {
            let join = |types: &[Option<KlassId>]| {
                types.iter().map(|&ty| table.type_name(ty)).collect::<Vec<_>>().join(", ")
            };
            let required = join(&params);
            let found = join(&arg_types);
            self.diagnostics.report(SemanticError::ArgumentCountOrTypeMismatch {
                method: format!("{}()", name.name),
                required: format!("({})", required),
                found: format!("({})", found),
                span: call.span.into(),
                at: call.span.loc,
            });
        }

        method.return_type
    }
}
