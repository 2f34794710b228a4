//! MiniJava 抽象语法树
//!
//! 语法树在解析后不再修改。后续各阶段的注解（作用域、静态类型、
//! 调用者类型）都以 [`NodeId`] 为键存放在各自的侧表中。

use crate::error::Span;
use std::fmt;

/// 语法树节点的稳定编号，由解析器按出现顺序分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub main_class: MainClass,
    pub classes: Vec<ClassDecl>,
}

/// 入口类：`class Main { public static void main(String[] args) { ... } }`
#[derive(Debug, Clone)]
pub struct MainClass {
    pub id: NodeId,
    pub name: Ident,
    pub args_name: Ident,
    pub body: Stmt,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub id: NodeId,
    pub name: Ident,
    pub parent: Option<Ident>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub var_type: TypeRef,
    pub name: Ident,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub id: NodeId,
    pub return_type: TypeRef,
    pub name: Ident,
    pub params: Vec<VarDecl>,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Stmt>,
    pub return_expr: Expr,
    /// `return` 关键字的位置
    pub return_span: Span,
}

/// 源码中书写的类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Boolean,
    IntArray,
    Class(String),
}

impl TypeName {
    /// 类表中的查找名
    pub fn lookup_name(&self) -> &str {
        match self {
            TypeName::Int => "int",
            TypeName::Boolean => "boolean",
            TypeName::IntArray => "int[]",
            TypeName::Class(name) => name,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lookup_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: TypeName,
    pub span: Span,
}

/// 引入独立块作用域的语句体（if 分支、else 分支、while 循环体）
#[derive(Debug, Clone)]
pub struct ScopedBody {
    pub id: NodeId,
    pub stmt: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Block),
    If(IfStmt),
    While(WhileStmt),
    Print(PrintStmt),
    Assign(AssignStmt),
    ArrayAssign(ArrayAssignStmt),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: ScopedBody,
    /// 没有 else 时按空分支处理
    pub else_branch: Option<ScopedBody>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: ScopedBody,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct PrintStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub target: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct ArrayAssignStmt {
    pub target: Ident,
    pub index: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Lt,
    Add,
    Sub,
    Mul,
    Pow,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::And => "&&",
            BinaryOp::Lt => "<",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Pow => "**",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i32),
    BoolLiteral(bool),
    Identifier(String),
    This,
    Paren(Box<Expr>),
    Binary {
        op: BinaryOp,
        op_span: Span,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Length(Box<Expr>),
    Call {
        receiver: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
    },
    NewObject(Ident),
    NewIntArray(Box<Expr>),
}
