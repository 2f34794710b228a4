//! 代码生成器主模块
//!
//! 每个类生成一个模块：构造器（链到父类构造器）、字段声明、每个方法一个例程。
//! 入口类额外生成静态入口例程，执行程序的顶层语句。

use crate::ast::*;
use crate::error::{MjResult, codegen_error};
use crate::types::{KlassId, Storage};
use super::context::{CodeGenerator, MethodContext};
use super::instructions::*;

impl<'a> CodeGenerator<'a> {
    /// 主入口：为入口类和每个声明的类生成模块
    pub fn generate(&mut self, program: &Program) -> MjResult<Vec<ClassModule>> {
        let mut modules = Vec::with_capacity(program.classes.len() + 1);
        modules.push(self.generate_main_class(&program.main_class)?);
        for class in &program.classes {
            modules.push(self.generate_class(class)?);
        }
        Ok(modules)
    }

    fn super_name(&self, klass: KlassId) -> String {
        let table = self.table();
        table
            .klass(klass)
            .superclass
            .map_or_else(|| ROOT_CLASS.to_string(), |superclass| table.klass_name(superclass).to_string())
    }

    /// 无参构造器：调用父类构造器后返回
    fn constructor(&self, super_name: &str) -> MethodBody {
        let mut context = MethodContext::new();
        context.emit(Instruction::LoadThis);
        context.emit(Instruction::InvokeSpecial {
            owner: super_name.to_string(),
            name: CONSTRUCTOR.to_string(),
            descriptor: MethodDescriptor::void(),
        });
        context.emit(Instruction::Return);
        context.finish(CONSTRUCTOR, MethodDescriptor::void(), false)
    }

    fn generate_main_class(&mut self, main: &MainClass) -> MjResult<ClassModule> {
        self.enter(main.id);
        let klass = self.table().enclosing_klass(self.current);
        let super_name = self.super_name(klass);

        self.method = MethodContext::new();
        self.generate_statement(&main.body)?;
        self.emit(Instruction::Return);
        let entry = std::mem::take(&mut self.method).finish(ENTRY_METHOD, MethodDescriptor::entry(), true);

        log::debug!("generated entry class {}", main.name.name);
        Ok(ClassModule {
            name: main.name.name.clone(),
            methods: vec![self.constructor(&super_name), entry],
            super_name,
            fields: Vec::new(),
        })
    }

    fn generate_class(&mut self, class: &ClassDecl) -> MjResult<ClassModule> {
        self.enter(class.id);
        let table = self.table();
        let klass = table.enclosing_klass(self.current);
        let super_name = self.super_name(klass);

        let fields = table
            .klass(klass)
            .fields()
            .iter()
            .map(|&field| {
                let symbol = table.symbol(field);
                Ok(FieldDecl {
                    name: symbol.name.clone(),
                    descriptor: self.descriptor(symbol.ty)?,
                })
            })
            .collect::<MjResult<Vec<_>>>()?;

        let mut methods = vec![self.constructor(&super_name)];
        for method in &class.methods {
            methods.push(self.generate_method(method)?);
        }

        log::debug!("generated class {} ({} method(s))", class.name.name, methods.len());
        Ok(ClassModule {
            name: class.name.name.clone(),
            super_name,
            fields,
            methods,
        })
    }

    fn generate_method(&mut self, decl: &MethodDecl) -> MjResult<MethodBody> {
        let previous = self.enter(decl.id);
        let scope = self.current;
        let table = self.table();
        let method = table
            .method(scope)
            .ok_or_else(|| codegen_error(format!("no scope for method {}", decl.name.name)))?;

        // 形参按调用顺序编号
        for (index, &param) in method.params().iter().enumerate() {
            let index = u16::try_from(index)
                .map_err(|_| codegen_error(format!("too many parameters in {}", decl.name.name)))?;
            let storage = Storage::Parameter(index);
            if let Err(existing) = table.symbol(param).assign_storage(storage) {
                if existing != storage {
                    return Err(codegen_error(format!(
                        "parameter {} already stored as {}",
                        table.symbol(param).name,
                        existing
                    )));
                }
            }
        }

        self.method = MethodContext::new();
        for stmt in &decl.body {
            self.generate_statement(stmt)?;
        }
        self.generate_expression(&decl.return_expr)?;
        self.emit(Instruction::ReturnValue);

        let descriptor = self.method_descriptor(scope)?;
        let body = std::mem::take(&mut self.method).finish(&decl.name.name, descriptor, false);
        self.current = previous;
        Ok(body)
    }
}
