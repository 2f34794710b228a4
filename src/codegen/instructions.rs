//! 栈机指令与类模块
//!
//! 布尔值在栈上表示为 int：true 为 1，false 为 0。

use std::fmt;

/// 所有类的根父类
pub const ROOT_CLASS: &str = "java/lang/Object";
pub const CONSTRUCTOR: &str = "<init>";
pub const ENTRY_METHOD: &str = "main";
pub const STRING_CLASS: &str = "java/lang/String";

/// 方法内的跳转目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// 字段或值的类型描述符
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Int,
    Boolean,
    IntArray,
    Object(String),
    /// 对象数组，仅用于入口方法的 `String[]` 形参
    ObjectArray(String),
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Int => write!(f, "I"),
            TypeDescriptor::Boolean => write!(f, "Z"),
            TypeDescriptor::IntArray => write!(f, "[I"),
            TypeDescriptor::Object(name) => write!(f, "L{};", name),
            TypeDescriptor::ObjectArray(name) => write!(f, "[L{};", name),
        }
    }
}

/// 方法描述符 `(参数)返回值`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<TypeDescriptor>,
    /// None 表示 void
    pub ret: Option<TypeDescriptor>,
}

impl MethodDescriptor {
    pub fn void() -> Self {
        Self { params: Vec::new(), ret: None }
    }

    /// 入口方法 `main(String[])V`
    pub fn entry() -> Self {
        Self {
            params: vec![TypeDescriptor::ObjectArray(STRING_CLASS.to_string())],
            ret: None,
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for param in &self.params {
            write!(f, "{}", param)?;
        }
        write!(f, ")")?;
        match &self.ret {
            Some(ret) => write!(f, "{}", ret),
            None => write!(f, "V"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// 压入整数常量
    PushInt(i32),
    /// 压入当前接收者
    LoadThis,
    LoadArg(u16),
    StoreArg(u16),
    LoadLocal(u16),
    StoreLocal(u16),
    /// 弹出对象，压入其字段值
    GetField { owner: String, name: String, descriptor: TypeDescriptor },
    /// 弹出值和对象，写入字段
    PutField { owner: String, name: String, descriptor: TypeDescriptor },
    Add,
    Sub,
    Mul,
    /// 按位与，两个操作数都会求值
    And,
    Xor,
    /// 弹出一个值，为 0 时跳转
    IfZero(Label),
    /// 弹出两个 int，次栈顶小于栈顶时跳转
    IfCmpLt(Label),
    Goto(Label),
    /// 放置标签，不产生运行时动作
    Mark(Label),
    New(String),
    Dup,
    /// 非虚调用（只用于构造器链）
    InvokeSpecial { owner: String, name: String, descriptor: MethodDescriptor },
    /// 弹出长度，压入新的零值 int 数组
    NewIntArray,
    ArrayLoad,
    ArrayStore,
    ArrayLength,
    /// 按 owner 中解析出的签名做虚调用
    InvokeVirtual { owner: String, name: String, descriptor: MethodDescriptor },
    /// 弹出 int 并打印一行
    Print,
    Return,
    ReturnValue,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::PushInt(value) => write!(f, "push {}", value),
            Instruction::LoadThis => write!(f, "load_this"),
            Instruction::LoadArg(index) => write!(f, "load_arg {}", index),
            Instruction::StoreArg(index) => write!(f, "store_arg {}", index),
            Instruction::LoadLocal(slot) => write!(f, "load_local {}", slot),
            Instruction::StoreLocal(slot) => write!(f, "store_local {}", slot),
            Instruction::GetField { owner, name, descriptor } => {
                write!(f, "get_field {}.{} {}", owner, name, descriptor)
            }
            Instruction::PutField { owner, name, descriptor } => {
                write!(f, "put_field {}.{} {}", owner, name, descriptor)
            }
            Instruction::Add => write!(f, "add"),
            Instruction::Sub => write!(f, "sub"),
            Instruction::Mul => write!(f, "mul"),
            Instruction::And => write!(f, "and"),
            Instruction::Xor => write!(f, "xor"),
            Instruction::IfZero(label) => write!(f, "if_zero {}", label),
            Instruction::IfCmpLt(label) => write!(f, "if_cmp_lt {}", label),
            Instruction::Goto(label) => write!(f, "goto {}", label),
            Instruction::Mark(label) => write!(f, "{}:", label),
            Instruction::New(class) => write!(f, "new {}", class),
            Instruction::Dup => write!(f, "dup"),
            Instruction::InvokeSpecial { owner, name, descriptor } => {
                write!(f, "invoke_special {}.{}{}", owner, name, descriptor)
            }
            Instruction::NewIntArray => write!(f, "new_int_array"),
            Instruction::ArrayLoad => write!(f, "array_load"),
            Instruction::ArrayStore => write!(f, "array_store"),
            Instruction::ArrayLength => write!(f, "array_length"),
            Instruction::InvokeVirtual { owner, name, descriptor } => {
                write!(f, "invoke_virtual {}.{}{}", owner, name, descriptor)
            }
            Instruction::Print => write!(f, "print"),
            Instruction::Return => write!(f, "return"),
            Instruction::ReturnValue => write!(f, "return_value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub descriptor: TypeDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub is_static: bool,
    /// 局部变量槽位数（不含形参）
    pub max_locals: u16,
    pub code: Vec<Instruction>,
}

/// 每个类一个模块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassModule {
    pub name: String,
    pub super_name: String,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodBody>,
}

impl ClassModule {
    pub fn method(&self, name: &str) -> Option<&MethodBody> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// 文本形式的汇编清单
    pub fn listing(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ClassModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {} extends {}", self.name, self.super_name)?;
        for field in &self.fields {
            writeln!(f, "  field {} {}", field.name, field.descriptor)?;
        }
        for method in &self.methods {
            let modifier = if method.is_static { "static " } else { "" };
            writeln!(
                f,
                "  {}method {}{} locals={}",
                modifier, method.name, method.descriptor, method.max_locals
            )?;
            for instruction in &method.code {
                match instruction {
                    Instruction::Mark(_) => writeln!(f, "   {}", instruction)?,
                    _ => writeln!(f, "    {}", instruction)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors() {
        let descriptor = MethodDescriptor {
            params: vec![
                TypeDescriptor::Int,
                TypeDescriptor::IntArray,
                TypeDescriptor::Object("Tree".into()),
            ],
            ret: Some(TypeDescriptor::Boolean),
        };
        assert_eq!(descriptor.to_string(), "(I[ILTree;)Z");
        assert_eq!(MethodDescriptor::void().to_string(), "()V");
        assert_eq!(MethodDescriptor::entry().to_string(), "([Ljava/lang/String;)V");
    }

    #[test]
    fn test_listing_layout() {
        let module = ClassModule {
            name: "A".into(),
            super_name: ROOT_CLASS.into(),
            fields: vec![FieldDecl { name: "n".into(), descriptor: TypeDescriptor::Int }],
            methods: vec![MethodBody {
                name: "f".into(),
                descriptor: MethodDescriptor { params: vec![], ret: Some(TypeDescriptor::Int) },
                is_static: false,
                max_locals: 0,
                code: vec![
                    Instruction::Mark(Label(0)),
                    Instruction::PushInt(1),
                    Instruction::ReturnValue,
                ],
            }],
        };
        assert_eq!(
            module.listing(),
            "class A extends java/lang/Object\n  field n I\n  method f()I locals=0\n   L0:\n    push 1\n    return_value\n"
        );
    }
}
