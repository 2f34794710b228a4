//! 语义分析
//!
//! 四个阶段严格按顺序执行：作用域构建、类型检查、初始化检查，之后才进入代码生成。
//! 每个阶段内部累积诊断，阶段之间只要有诊断就停止。

mod analyzer;
pub mod scope_builder;
pub mod type_checker;
pub mod init_check;

use rustc_hash::FxHashMap;

use crate::ast::NodeId;
use crate::types::{KlassId, ScopeId};

pub use analyzer::{Analysis, SemanticAnalyzer};

/// 引入作用域的语法节点到作用域的映射
pub type ScopeMap = FxHashMap<NodeId, ScopeId>;

/// 类型检查阶段产生的侧表
#[derive(Debug, Default)]
pub struct TypeAnnotations {
    /// 每个表达式的静态类型（出错的表达式不在表中）
    pub expr_types: FxHashMap<NodeId, KlassId>,
    /// 每个方法调用表达式的接收者静态类型
    pub receiver_types: FxHashMap<NodeId, KlassId>,
}
