//! 代码生成上下文和状态管理
use crate::ast::NodeId;
use crate::semantic::Analysis;
use crate::types::{ScopeId, SymbolTable};
use super::instructions::{Instruction, Label, MethodBody, MethodDescriptor};

/// 单个方法的指令缓冲区、标签计数与局部变量槽位分配
#[derive(Debug, Default)]
pub struct MethodContext {
    code: Vec<Instruction>,
    next_label: u32,
    next_local: u16,
}

impl MethodContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配新标签（方法内唯一）
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    pub fn mark(&mut self, label: Label) {
        self.code.push(Instruction::Mark(label));
    }

    /// 从方法的局部变量空间分配一个新槽位
    pub fn allocate_local(&mut self) -> u16 {
        let slot = self.next_local;
        self.next_local += 1;
        slot
    }

    /// 占用已分配过的槽位，之后的分配从它后面开始
    pub fn reserve_local(&mut self, slot: u16) {
        self.next_local = self.next_local.max(slot.saturating_add(1));
    }

    pub fn finish(self, name: &str, descriptor: MethodDescriptor, is_static: bool) -> MethodBody {
        MethodBody {
            name: name.to_string(),
            descriptor,
            is_static,
            max_locals: self.next_local,
            code: self.code,
        }
    }
}

/// 代码生成器
pub struct CodeGenerator<'a> {
    pub(super) analysis: &'a Analysis,
    /// 当前用于名字查找的作用域
    pub(super) current: ScopeId,
    pub(super) method: MethodContext,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self {
            analysis,
            current: analysis.table.int().scope(),
            method: MethodContext::new(),
        }
    }

    pub(super) fn table(&self) -> &'a SymbolTable {
        &self.analysis.table
    }

    /// 切换到语法节点对应的作用域，返回原作用域
    pub(super) fn enter(&mut self, node: NodeId) -> ScopeId {
        let previous = self.current;
        if let Some(&scope) = self.analysis.scopes.get(&node) {
            self.current = scope;
        }
        previous
    }

    pub(super) fn emit(&mut self, instruction: Instruction) {
        self.method.emit(instruction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_slots_are_sequential() {
        let mut context = MethodContext::new();
        assert_eq!(context.new_label(), Label(0));
        assert_eq!(context.new_label(), Label(1));
        assert_eq!(context.allocate_local(), 0);
        assert_eq!(context.allocate_local(), 1);
        context.emit(Instruction::Return);
        let body = context.finish("f", MethodDescriptor::void(), false);
        assert_eq!(body.max_locals, 2);
        assert_eq!(body.code, vec![Instruction::Return]);
    }

    #[test]
    fn test_reserved_slots_are_skipped() {
        let mut context = MethodContext::new();
        context.reserve_local(2);
        assert_eq!(context.allocate_local(), 3);
        context.reserve_local(0);
        assert_eq!(context.allocate_local(), 4);
    }
}
