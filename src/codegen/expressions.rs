//! 表达式代码生成
//!
//! 每个表达式求值后在栈顶留下恰好一个值。
use crate::ast::*;
use crate::error::{MjResult, codegen_error};
use crate::types::Storage;
use super::context::CodeGenerator;
use super::instructions::{CONSTRUCTOR, Instruction, MethodDescriptor, TypeDescriptor};

/// 变量名解析后的访问方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Variable {
    /// 通过 `this` 访问的字段，owner 为当前类
    Field { owner: String, name: String, descriptor: TypeDescriptor },
    Argument(u16),
    Local(u16),
}

impl<'a> CodeGenerator<'a> {
    /// 解析变量；局部变量在第一次用到时分配槽位
    pub(super) fn variable(&mut self, name: &str) -> MjResult<Variable> {
        let table = self.table();
        let symbol = table
            .lookup(self.current, name)
            .map(|id| table.symbol(id))
            .ok_or_else(|| codegen_error(format!("unresolved variable {} reached code generation", name)))?;

        if symbol.is_field {
            let owner = table.klass_name(table.enclosing_klass(self.current)).to_string();
            return Ok(Variable::Field {
                owner,
                name: symbol.name.clone(),
                descriptor: self.descriptor(symbol.ty)?,
            });
        }

        let method = &mut self.method;
        Ok(match symbol.storage_or_assign(|| Storage::Local(method.allocate_local())) {
            Storage::Parameter(index) => Variable::Argument(index),
            Storage::Local(slot) => {
                // 槽位可能来自之前的一次生成
                self.method.reserve_local(slot);
                Variable::Local(slot)
            }
        })
    }

    pub(super) fn load_variable(&mut self, variable: Variable) {
        match variable {
            Variable::Field { owner, name, descriptor } => {
                self.emit(Instruction::LoadThis);
                self.emit(Instruction::GetField { owner, name, descriptor });
            }
            Variable::Argument(index) => self.emit(Instruction::LoadArg(index)),
            Variable::Local(slot) => self.emit(Instruction::LoadLocal(slot)),
        }
    }

    /// 生成表达式代码
    pub fn generate_expression(&mut self, expr: &Expr) -> MjResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral(value) => self.emit(Instruction::PushInt(*value)),
            ExprKind::BoolLiteral(value) => self.emit(Instruction::PushInt(i32::from(*value))),
            ExprKind::Identifier(name) => {
                let variable = self.variable(name)?;
                self.load_variable(variable);
            }
            ExprKind::This => self.emit(Instruction::LoadThis),
            ExprKind::Paren(inner) => self.generate_expression(inner)?,
            ExprKind::Binary { op, left, right, .. } => {
                self.generate_expression(left)?;
                self.generate_expression(right)?;
                self.generate_binary_operator(*op);
            }
            ExprKind::Not(inner) => {
                self.generate_expression(inner)?;
                self.emit(Instruction::PushInt(1));
                self.emit(Instruction::Xor);
            }
            ExprKind::Index { array, index } => {
                self.generate_expression(array)?;
                self.generate_expression(index)?;
                self.emit(Instruction::ArrayLoad);
            }
            ExprKind::Length(array) => {
                self.generate_expression(array)?;
                self.emit(Instruction::ArrayLength);
            }
            ExprKind::Call { receiver, method, args } => {
                self.generate_expression(receiver)?;
                for arg in args {
                    self.generate_expression(arg)?;
                }
                let instruction = self.virtual_call(expr.id, &method.name)?;
                self.emit(instruction);
            }
            ExprKind::NewObject(class) => {
                self.emit(Instruction::New(class.name.clone()));
                self.emit(Instruction::Dup);
                self.emit(Instruction::InvokeSpecial {
                    owner: class.name.clone(),
                    name: CONSTRUCTOR.to_string(),
                    descriptor: MethodDescriptor::void(),
                });
            }
            ExprKind::NewIntArray(size) => {
                self.generate_expression(size)?;
                self.emit(Instruction::NewIntArray);
            }
        }
        Ok(())
    }

    /// 两个操作数已在栈上
    fn generate_binary_operator(&mut self, op: BinaryOp) {
        match op {
            BinaryOp::And => self.emit(Instruction::And),
            BinaryOp::Add => self.emit(Instruction::Add),
            BinaryOp::Sub => self.emit(Instruction::Sub),
            BinaryOp::Mul => self.emit(Instruction::Mul),
            BinaryOp::Lt => {
                let true_label = self.method.new_label();
                let end_label = self.method.new_label();
                self.emit(Instruction::IfCmpLt(true_label));
                self.emit(Instruction::PushInt(0));
                self.emit(Instruction::Goto(end_label));
                self.method.mark(true_label);
                self.emit(Instruction::PushInt(1));
                self.method.mark(end_label);
            }
            BinaryOp::Pow => self.generate_power(),
        }
    }

    /// 栈上依次为底数和指数，循环相乘；指数为 0 时结果为 1
    fn generate_power(&mut self) {
        let pow = self.method.allocate_local();
        let base = self.method.allocate_local();
        let loop_label = self.method.new_label();
        let end_label = self.method.new_label();

        self.emit(Instruction::StoreLocal(pow));
        self.emit(Instruction::StoreLocal(base));
        self.emit(Instruction::PushInt(1));
        self.method.mark(loop_label);
        self.emit(Instruction::LoadLocal(pow));
        self.emit(Instruction::IfZero(end_label));
        self.emit(Instruction::LoadLocal(base));
        self.emit(Instruction::Mul);
        self.emit(Instruction::LoadLocal(pow));
        self.emit(Instruction::PushInt(1));
        self.emit(Instruction::Sub);
        self.emit(Instruction::StoreLocal(pow));
        self.emit(Instruction::Goto(loop_label));
        self.method.mark(end_label);
    }

    /// 按接收者静态类型解析签名
    fn virtual_call(&self, call: NodeId, name: &str) -> MjResult<Instruction> {
        let table = self.table();
        let receiver = self
            .analysis
            .types
            .receiver_types
            .get(&call)
            .copied()
            .ok_or_else(|| codegen_error(format!("no receiver type recorded for call {}", call)))?;
        let method = table
            .lookup_method(receiver, name)
            .ok_or_else(|| codegen_error(format!("method {} not found in {}", name, table.klass_name(receiver))))?;
        Ok(Instruction::InvokeVirtual {
            owner: table.klass_name(receiver).to_string(),
            name: name.to_string(),
            descriptor: self.method_descriptor(method)?,
        })
    }
}
