//! 语义分析器核心实现

use crate::ast::Program;
use crate::error::{MjError, MjResult};
use crate::types::SymbolTable;
use super::init_check::InitializationChecker;
use super::scope_builder::ScopeBuilder;
use super::type_checker::TypeChecker;
use super::{ScopeMap, TypeAnnotations};

/// 通过全部检查后的程序信息，供代码生成使用
#[derive(Debug)]
pub struct Analysis {
    pub table: SymbolTable,
    pub scopes: ScopeMap,
    pub types: TypeAnnotations,
}

/// 语义分析器
#[derive(Debug, Default)]
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, program: &Program) -> MjResult<Analysis> {
        // 第一遍：作用域构建（循环继承在此直接中止）
        let build = ScopeBuilder::new().build(program).map_err(MjError::from)?;
        if !build.diagnostics.is_empty() {
            return Err(build.diagnostics.into());
        }
        let mut table = build.table;
        let scopes = build.scopes;
        log::info!("scope building finished: {} user class(es)", table.user_classes().len());

        // 第二遍：类型检查
        let (types, diagnostics) = TypeChecker::new(&table, &scopes).check(program);
        if !diagnostics.is_empty() {
            return Err(diagnostics.into());
        }
        log::info!("type checking finished");

        // 第三遍：初始化检查
        let diagnostics = InitializationChecker::new(&mut table, &scopes).check(program);
        if !diagnostics.is_empty() {
            return Err(diagnostics.into());
        }
        log::info!("initialization analysis finished");

        Ok(Analysis { table, scopes, types })
    }
}
