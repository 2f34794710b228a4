//! MiniJava 栈机代码生成器
//!
//! 把通过全部语义检查的程序翻译为每类一个的 [`ClassModule`]。
//! 生成器只读取分析结果；变量存储分类在这里第一次写入符号。

pub mod instructions;
mod context;
mod types;
mod generator;
mod statements;
mod expressions;

use crate::ast::Program;
use crate::error::MjResult;
use crate::semantic::Analysis;

pub use context::{CodeGenerator, MethodContext};
pub use instructions::{
    ClassModule, FieldDecl, Instruction, Label, MethodBody, MethodDescriptor, TypeDescriptor,
};

/// 为已分析的程序生成全部类模块，入口类在最前
pub fn generate(program: &Program, analysis: &Analysis) -> MjResult<Vec<ClassModule>> {
    let modules = CodeGenerator::new(analysis).generate(program)?;
    log::info!("code generation finished: {} module(s)", modules.len());
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use crate::semantic::SemanticAnalyzer;
    use super::instructions::{CONSTRUCTOR, ENTRY_METHOD, ROOT_CLASS};

    const MAIN: &str = "class Main { public static void main(String[] a) { System.out.println(new A().f()); } }";

    fn compile(classes: &str) -> Vec<ClassModule> {
        let program = parse(lex(&format!("{MAIN} {classes}")).unwrap()).unwrap();
        let analysis = SemanticAnalyzer::new().analyze(&program).unwrap();
        generate(&program, &analysis).unwrap()
    }

    fn method_code(modules: &[ClassModule], class: &str, method: &str) -> Vec<Instruction> {
        modules
            .iter()
            .find(|module| module.name == class)
            .and_then(|module| module.method(method))
            .map(|body| body.code.clone())
            .unwrap()
    }

    #[test]
    fn test_entry_module() {
        let modules = compile("class A { public int f() { return 1; } }");
        let main = &modules[0];
        assert_eq!(main.name, "Main");
        assert_eq!(main.super_name, ROOT_CLASS);
        let entry = main.method(ENTRY_METHOD).unwrap();
        assert!(entry.is_static);
        assert_eq!(entry.descriptor, MethodDescriptor::entry());
        assert_eq!(
            entry.code,
            vec![
                Instruction::New("A".into()),
                Instruction::Dup,
                Instruction::InvokeSpecial {
                    owner: "A".into(),
                    name: CONSTRUCTOR.into(),
                    descriptor: MethodDescriptor::void(),
                },
                Instruction::InvokeVirtual {
                    owner: "A".into(),
                    name: "f".into(),
                    descriptor: MethodDescriptor { params: vec![], ret: Some(TypeDescriptor::Int) },
                },
                Instruction::Print,
                Instruction::Return,
            ]
        );
    }

    #[test]
    fn test_constructor_chains_to_superclass() {
        let modules = compile("class A { public int f() { return 1; } } class B extends A { }");
        let code = method_code(&modules, "B", CONSTRUCTOR);
        assert_eq!(
            code,
            vec![
                Instruction::LoadThis,
                Instruction::InvokeSpecial {
                    owner: "A".into(),
                    name: CONSTRUCTOR.into(),
                    descriptor: MethodDescriptor::void(),
                },
                Instruction::Return,
            ]
        );
    }

    #[test]
    fn test_fields_are_declared() {
        let modules = compile("class A { int n; boolean b; A next; public int f() { return 1; } }");
        let descriptors: Vec<String> = modules[1]
            .fields
            .iter()
            .map(|field| format!("{} {}", field.name, field.descriptor))
            .collect();
        assert_eq!(descriptors, vec!["n I", "b Z", "next LA;"]);
    }

    #[test]
    fn test_storage_classes() {
        let modules = compile(
            "class A { int n; public int f() { return this.g(2); } \
             public int g(int p) { int x; x = p; p = x; n = x; return n; } }",
        );
        let code = method_code(&modules, "A", "g");
        assert_eq!(
            code,
            vec![
                Instruction::LoadArg(0),
                Instruction::StoreLocal(0),
                Instruction::LoadLocal(0),
                Instruction::StoreArg(0),
                Instruction::LoadThis,
                Instruction::LoadLocal(0),
                Instruction::PutField { owner: "A".into(), name: "n".into(), descriptor: TypeDescriptor::Int },
                Instruction::LoadThis,
                Instruction::GetField { owner: "A".into(), name: "n".into(), descriptor: TypeDescriptor::Int },
                Instruction::ReturnValue,
            ]
        );
    }

    #[test]
    fn test_less_than_produces_boolean() {
        let modules = compile("class A { public int f() { return 0; } public boolean g() { return 1 < 2; } }");
        let code = method_code(&modules, "A", "g");
        assert_eq!(
            code,
            vec![
                Instruction::PushInt(1),
                Instruction::PushInt(2),
                Instruction::IfCmpLt(Label(0)),
                Instruction::PushInt(0),
                Instruction::Goto(Label(1)),
                Instruction::Mark(Label(0)),
                Instruction::PushInt(1),
                Instruction::Mark(Label(1)),
                Instruction::ReturnValue,
            ]
        );
    }

    #[test]
    fn test_not_and_conjunction() {
        let modules = compile("class A { public int f() { return 0; } public boolean g() { return !true && false; } }");
        let code = method_code(&modules, "A", "g");
        assert_eq!(
            code,
            vec![
                Instruction::PushInt(1),
                Instruction::PushInt(1),
                Instruction::Xor,
                Instruction::PushInt(0),
                Instruction::And,
                Instruction::ReturnValue,
            ]
        );
    }

    #[test]
    fn test_power_uses_fresh_slots() {
        let modules = compile("class A { public int f() { int x; x = 3; return x ** 2; } }");
        let body = modules[1].method("f").unwrap();
        assert_eq!(body.max_locals, 3);
        assert!(body.code.contains(&Instruction::StoreLocal(1)));
        assert!(body.code.contains(&Instruction::StoreLocal(2)));
    }

    #[test]
    fn test_regeneration_keeps_slot_layout() {
        let source = format!(
            "{MAIN} class A {{ public int f() {{ return this.g(3); }} \
             public int g(int n) {{ int x; x = n; return x ** 2; }} }}"
        );
        let program = parse(lex(&source).unwrap()).unwrap();
        let analysis = SemanticAnalyzer::new().analyze(&program).unwrap();
        let first = generate(&program, &analysis).unwrap();
        let second = generate(&program, &analysis).unwrap();
        assert_eq!(first[1].method("g").unwrap().max_locals, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_call_owner_is_static_receiver_type() {
        let modules = compile(
            "class A { public int f() { return 1; } } \
             class B extends A { public int g(B b) { return b.f(); } }",
        );
        let code = method_code(&modules, "B", "g");
        assert!(code.contains(&Instruction::InvokeVirtual {
            owner: "B".into(),
            name: "f".into(),
            descriptor: MethodDescriptor { params: vec![], ret: Some(TypeDescriptor::Int) },
        }));
    }

    #[test]
    fn test_labels_are_unique_per_method() {
        let modules = compile(
            "class A { public int f() { int i; i = 0; while (i < 3) { if (i < 1) { i = i + 1; } else { i = i + 2; } } return i; } }",
        );
        let code = method_code(&modules, "A", "f");
        let mut marks: Vec<u32> = code
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Mark(label) => Some(label.0),
                _ => None,
            })
            .collect();
        let count = marks.len();
        marks.sort_unstable();
        marks.dedup();
        assert_eq!(marks.len(), count);
        assert_eq!(count, 8);
    }
}
