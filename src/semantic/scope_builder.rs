//! 作用域构建：类收集、继承链接、成员与块作用域
//!
//! 分三步完成：先登记所有类（含入口类），再按声明顺序链接父类并检测循环继承，
//! 最后为字段、方法、形参、局部变量和各级块建立作用域。
//! 循环继承是致命错误，构建立即停止；其余命名错误累积后继续。

use crate::ast::*;
use crate::error::{Diagnostics, SemanticError, SymbolKind};
use crate::types::{KlassId, Scope, ScopeId, SymbolTable};
use super::ScopeMap;

/// 作用域构建结果
#[derive(Debug)]
pub struct ScopeBuild {
    pub table: SymbolTable,
    pub scopes: ScopeMap,
    pub diagnostics: Diagnostics,
}

pub struct ScopeBuilder {
    table: SymbolTable,
    scopes: ScopeMap,
    diagnostics: Diagnostics,
}

impl ScopeBuilder {
    pub fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            scopes: ScopeMap::default(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// 构建符号模型。遇到循环继承时返回 Err，其中包含此前累积的全部诊断
    pub fn build(mut self, program: &Program) -> Result<ScopeBuild, Diagnostics> {
        let main = self.register_class(&program.main_class.name, program.main_class.id);
        let klasses: Vec<KlassId> = program
            .classes
            .iter()
            .map(|class| self.register_class(&class.name, class.id))
            .collect();
        log::debug!("registered {} class(es)", klasses.len() + 1);

        for (class, &klass) in program.classes.iter().zip(&klasses) {
            if let Err(cyclic) = self.link_superclass(class, klass) {
                self.diagnostics.report(cyclic);
                return Err(self.diagnostics);
            }
        }

        self.build_statement(&program.main_class.body, main.scope());
        for (class, &klass) in program.classes.iter().zip(&klasses) {
            self.build_class(class, klass);
        }

        Ok(ScopeBuild {
            table: self.table,
            scopes: self.scopes,
            diagnostics: self.diagnostics,
        })
    }

    /// 登记类；重名时报告并让该声明落到一个游离的类上
    fn register_class(&mut self, name: &Ident, node: NodeId) -> KlassId {
        let klass = match self.table.declare_class(&name.name, name.span) {
            Ok(klass) => klass,
            Err(_) => {
                self.diagnostics.report(SemanticError::DuplicateClass {
                    name: name.name.clone(),
                    span: name.span.into(),
                    at: name.span.loc,
                });
                self.table.detached_class(&name.name, name.span)
            }
        };
        self.scopes.insert(node, klass.scope());
        klass
    }

    /// 链接父类；找不到父类时报告并按无父类处理。形成环时返回致命错误
    fn link_superclass(&mut self, class: &ClassDecl, klass: KlassId) -> Result<(), SemanticError> {
        let Some(parent) = &class.parent else {
            return Ok(());
        };

        match self.table.class(&parent.name) {
            Some(superclass) => {
                self.table.set_superclass(klass, Some(superclass));
                if self.table.is_cyclic(klass) {
                    return Err(SemanticError::CyclicInheritance {
                        class: class.name.name.clone(),
                        span: parent.span.into(),
                        at: parent.span.loc,
                    });
                }
            }
            None => {
                self.diagnostics.report(SemanticError::UnresolvedSymbol {
                    kind: SymbolKind::Class,
                    name: parent.name.clone(),
                    location: class.name.name.clone(),
                    span: parent.span.into(),
                    at: parent.span.loc,
                });
            }
        }
        Ok(())
    }

    /// 按名字解析声明类型
    fn resolve_type(&mut self, type_ref: &TypeRef, location: KlassId) -> Option<KlassId> {
        let resolved = self.table.class(type_ref.name.lookup_name());
        if resolved.is_none() {
            self.diagnostics.report(SemanticError::UnresolvedSymbol {
                kind: SymbolKind::Class,
                name: type_ref.name.to_string(),
                location: self.table.klass_name(location).to_string(),
                span: type_ref.span.into(),
                at: type_ref.span.loc,
            });
        }
        resolved
    }

    /// 诊断中的作用域描述；块归到外层的方法
    fn scope_description(&self, scope: ScopeId) -> String {
        let scope = self.table.scope(scope);
        match scope {
            Scope::Klass(_) => format!("class {}", scope.name()),
            Scope::Method(_) => format!("method {}", scope.name()),
            Scope::Block(_) => match scope.enclosing() {
                Some(enclosing) => self.scope_description(enclosing),
                None => scope.name().to_string(),
            },
        }
    }

    fn report_redefinition(&mut self, kind: SymbolKind, name: &Ident, scope: ScopeId) {
        let scope = self.scope_description(scope);
        self.diagnostics.report(SemanticError::SymbolAlreadyDefined {
            kind,
            name: name.name.clone(),
            scope,
            span: name.span.into(),
            at: name.span.loc,
        });
    }

    /// 在作用域中定义变量（字段或局部变量）
    fn define_variable(&mut self, decl: &VarDecl, scope: ScopeId) {
        let location = self.table.enclosing_klass(scope);
        let ty = self.resolve_type(&decl.var_type, location);
        if self.table.define(scope, &decl.name.name, ty, decl.name.span).is_err() {
            self.report_redefinition(SymbolKind::Variable, &decl.name, scope);
        }
    }

    fn build_class(&mut self, class: &ClassDecl, klass: KlassId) {
        for field in &class.fields {
            self.define_variable(field, klass.scope());
        }
        for method in &class.methods {
            self.build_method(method, klass);
        }
    }

    fn build_method(&mut self, decl: &MethodDecl, klass: KlassId) {
        let return_type = self.resolve_type(&decl.return_type, klass);
        let method = match self
            .table
            .declare_method(klass, &decl.name.name, return_type, decl.name.span)
        {
            Ok(method) => method,
            Err(_) => {
                self.report_redefinition(SymbolKind::Method, &decl.name, klass.scope());
                self.table
                    .detached_method(klass, &decl.name.name, return_type, decl.name.span)
            }
        };
        self.scopes.insert(decl.id, method);

        for param in &decl.params {
            let ty = self.resolve_type(&param.var_type, klass);
            if self
                .table
                .define_parameter(method, &param.name.name, ty, param.name.span)
                .is_err()
            {
                self.report_redefinition(SymbolKind::Variable, &param.name, method);
            }
        }
        for local in &decl.locals {
            self.define_variable(local, method);
        }
        for stmt in &decl.body {
            self.build_statement(stmt, method);
        }
    }

    /// 为嵌套语句体建立新的块作用域
    fn build_scoped_body(&mut self, body: &ScopedBody, enclosing: ScopeId) {
        let block = self.table.new_block(enclosing);
        self.scopes.insert(body.id, block);
        self.build_statement(&body.stmt, block);
    }

    fn build_statement(&mut self, stmt: &Stmt, current: ScopeId) {
        match stmt {
            Stmt::Block(block) => {
                let scope = self.table.new_block(current);
                self.scopes.insert(block.id, scope);
                for stmt in &block.statements {
                    self.build_statement(stmt, scope);
                }
            }
            Stmt::If(if_stmt) => {
                self.build_scoped_body(&if_stmt.then_branch, current);
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.build_scoped_body(else_branch, current);
                }
            }
            Stmt::While(while_stmt) => self.build_scoped_body(&while_stmt.body, current),
            Stmt::Print(_) | Stmt::Assign(_) | Stmt::ArrayAssign(_) => {}
        }
    }
}

impl Default for ScopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use crate::lexer::lex;
    use crate::parser::parse;

    const MAIN: &str = "class Main { public static void main(String[] a) { System.out.println(1); } }";

    fn build(classes: &str) -> Result<ScopeBuild, Diagnostics> {
        let program = parse(lex(&format!("{MAIN} {classes}")).unwrap()).unwrap();
        ScopeBuilder::new().build(&program)
    }

    #[test]
    fn test_builds_class_table() {
        let build = build("class A { int x; } class B extends A { boolean y; }").unwrap();
        assert!(build.diagnostics.is_empty());
        let a = build.table.class("A").unwrap();
        let b = build.table.class("B").unwrap();
        assert_eq!(build.table.klass(b).superclass, Some(a));
        assert!(build.table.class("Main").is_some());
        assert!(build.table.lookup(b.scope(), "x").is_some());
    }

    #[test]
    fn test_duplicate_class_reported_once() {
        let build = build("class A { } class A { int x; }").unwrap();
        assert_eq!(build.diagnostics.kinds(), vec![DiagnosticKind::DuplicateClass]);
    }

    #[test]
    fn test_unresolved_superclass_is_not_fatal() {
        let build = build("class A extends Missing { int x; int x; }").unwrap();
        assert_eq!(
            build.diagnostics.kinds(),
            vec![DiagnosticKind::UnresolvedSymbol, DiagnosticKind::SymbolAlreadyDefined]
        );
        let a = build.table.class("A").unwrap();
        assert_eq!(build.table.klass(a).superclass, None);
    }

    #[test]
    fn test_cyclic_inheritance_is_fatal() {
        let diagnostics = build("class A extends B { } class B extends A { }").unwrap_err();
        assert_eq!(diagnostics.kinds(), vec![DiagnosticKind::CyclicInheritance]);
    }

    #[test]
    fn test_self_inheritance_is_cyclic() {
        let diagnostics = build("class A extends A { }").unwrap_err();
        assert_eq!(diagnostics.kinds(), vec![DiagnosticKind::CyclicInheritance]);
    }

    #[test]
    fn test_method_redefinition() {
        let build = build(
            "class A { public int f() { return 1; } public boolean f(int x) { return true; } }",
        )
        .unwrap();
        assert_eq!(build.diagnostics.kinds(), vec![DiagnosticKind::SymbolAlreadyDefined]);
    }

    #[test]
    fn test_local_cannot_redefine_parameter() {
        let build = build("class A { public int f(int x) { int x; return x; } }").unwrap();
        assert_eq!(build.diagnostics.kinds(), vec![DiagnosticKind::SymbolAlreadyDefined]);
        let message = build.diagnostics.iter().next().unwrap().to_string();
        assert_eq!(message, "variable x is already defined in method f");
    }

    #[test]
    fn test_redefinition_names_enclosing_scope() {
        let build = build("class A { int n; boolean n; }").unwrap();
        let message = build.diagnostics.iter().next().unwrap().to_string();
        assert_eq!(message, "variable n is already defined in class A");
    }

    #[test]
    fn test_parameters_keep_order() {
        let build = build("class A { public int f(int b, boolean a, A c) { return b; } }").unwrap();
        let a = build.table.class("A").unwrap();
        let f = build.table.lookup_method(a, "f").unwrap();
        let names: Vec<&str> = build.table.method(f).unwrap().params().iter()
            .map(|&p| build.table.symbol(p).name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_unresolved_field_type() {
        let build = build("class A { Ghost g; }").unwrap();
        assert_eq!(build.diagnostics.kinds(), vec![DiagnosticKind::UnresolvedSymbol]);
    }

    #[test]
    fn test_every_block_gets_a_scope() {
        let program = parse(lex(&format!(
            "{MAIN} class A {{ public int f() {{ if (true) {{ }} else {{ }} while (true) {{ }} return 1; }} }}"
        )).unwrap()).unwrap();
        let build = ScopeBuilder::new().build(&program).unwrap();
        let method = &program.classes[0].methods[0];
        let Stmt::If(if_stmt) = &method.body[0] else { panic!("expected if") };
        assert!(build.scopes.contains_key(&if_stmt.then_branch.id));
        assert!(build.scopes.contains_key(&if_stmt.else_branch.as_ref().unwrap().id));
        assert!(build.scopes.contains_key(&method.id));
        assert!(build.scopes.contains_key(&program.classes[0].id));
    }
}
