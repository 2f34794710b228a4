//! 语句代码生成（包含所有控制流结构）
use crate::ast::*;
use crate::error::MjResult;
use super::context::CodeGenerator;
use super::expressions::Variable;
use super::instructions::Instruction;

impl<'a> CodeGenerator<'a> {
    /// 生成单个语句代码
    pub fn generate_statement(&mut self, stmt: &Stmt) -> MjResult<()> {
        match stmt {
            Stmt::Block(block) => {
                let previous = self.enter(block.id);
                for stmt in &block.statements {
                    self.generate_statement(stmt)?;
                }
                self.current = previous;
            }
            Stmt::If(if_stmt) => self.generate_if_statement(if_stmt)?,
            Stmt::While(while_stmt) => self.generate_while_statement(while_stmt)?,
            Stmt::Print(print) => {
                self.generate_expression(&print.value)?;
                self.emit(Instruction::Print);
            }
            Stmt::Assign(assign) => self.generate_assignment(assign)?,
            Stmt::ArrayAssign(assign) => {
                let array = self.variable(&assign.target.name)?;
                self.load_variable(array);
                self.generate_expression(&assign.index)?;
                self.generate_expression(&assign.value)?;
                self.emit(Instruction::ArrayStore);
            }
        }
        Ok(())
    }

    fn generate_scoped_body(&mut self, body: &ScopedBody) -> MjResult<()> {
        let previous = self.enter(body.id);
        let result = self.generate_statement(&body.stmt);
        self.current = previous;
        result
    }

    /// cond; if_zero else; then; goto end; else: [else]; end:
    fn generate_if_statement(&mut self, if_stmt: &IfStmt) -> MjResult<()> {
        let else_label = self.method.new_label();
        let end_label = self.method.new_label();

        self.generate_expression(&if_stmt.condition)?;
        self.emit(Instruction::IfZero(else_label));
        self.generate_scoped_body(&if_stmt.then_branch)?;
        self.emit(Instruction::Goto(end_label));
        self.method.mark(else_label);
        if let Some(else_branch) = &if_stmt.else_branch {
            self.generate_scoped_body(else_branch)?;
        }
        self.method.mark(end_label);
        Ok(())
    }

    /// head: cond; if_zero end; body; goto head; end:
    fn generate_while_statement(&mut self, while_stmt: &WhileStmt) -> MjResult<()> {
        let head_label = self.method.new_label();
        let end_label = self.method.new_label();

        self.method.mark(head_label);
        self.generate_expression(&while_stmt.condition)?;
        self.emit(Instruction::IfZero(end_label));
        self.generate_scoped_body(&while_stmt.body)?;
        self.emit(Instruction::Goto(head_label));
        self.method.mark(end_label);
        Ok(())
    }

    fn generate_assignment(&mut self, assign: &AssignStmt) -> MjResult<()> {
        match self.variable(&assign.target.name)? {
            Variable::Field { owner, name, descriptor } => {
                self.emit(Instruction::LoadThis);
                self.generate_expression(&assign.value)?;
                self.emit(Instruction::PutField { owner, name, descriptor });
            }
            Variable::Argument(index) => {
                self.generate_expression(&assign.value)?;
                self.emit(Instruction::StoreArg(index));
            }
            Variable::Local(slot) => {
                self.generate_expression(&assign.value)?;
                self.emit(Instruction::StoreLocal(slot));
            }
        }
        Ok(())
    }
}
