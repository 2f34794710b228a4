use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use std::fmt;

/// 源码中的行列位置（从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 源码区间：字节范围 + 起始行列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub loc: SourceLocation,
}

impl Span {
    pub fn new(start: usize, end: usize, loc: SourceLocation) -> Self {
        Self { start, end, loc }
    }

    /// 合并两个区间，起始位置取 self
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: self.end.max(other.end),
            loc: self.loc,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.len()).into()
    }
}

/// 未解析符号的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Class,
    Variable,
    Method,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Class => write!(f, "class"),
            SymbolKind::Variable => write!(f, "variable"),
            SymbolKind::Method => write!(f, "method"),
        }
    }
}

/// 语义诊断的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    DuplicateClass,
    UnresolvedSymbol,
    CyclicInheritance,
    SymbolAlreadyDefined,
    IncompatibleOverrideReturnType,
    TypeMismatch,
    BinaryOperatorTypeMismatch,
    UnaryOperatorTypeMismatch,
    ArgumentCountOrTypeMismatch,
    MayBeUninitialized,
}

/// 语义分析阶段报告的单条诊断
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum SemanticError {
    #[diagnostic(code(semantic::duplicate_class))]
    #[error("duplicate class: {name}")]
    DuplicateClass {
        name: String,
        #[label("declared again here")]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(semantic::unresolved_symbol))]
    #[error("cannot find symbol: {kind} {name} (location: class {location})")]
    UnresolvedSymbol {
        kind: SymbolKind,
        name: String,
        location: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(semantic::cyclic_inheritance))]
    #[error("cyclic inheritance involving {class}")]
    CyclicInheritance {
        class: String,
        #[label("cycle closes here")]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(semantic::symbol_already_defined))]
    #[error("{kind} {name} is already defined in {scope}")]
    SymbolAlreadyDefined {
        kind: SymbolKind,
        name: String,
        scope: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(
        code(semantic::incompatible_override),
        help("an overriding method must declare the same return type")
    )]
    #[error("{method} in class {class} cannot override {method} in class {ancestor}: return type {found} is not {required}")]
    IncompatibleOverrideReturnType {
        method: String,
        class: String,
        ancestor: String,
        required: String,
        found: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(semantic::type_mismatch))]
    #[error("incompatible types: required {required}, found {found}")]
    TypeMismatch {
        required: String,
        found: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(semantic::bad_binary_operands))]
    #[error("bad operand types for binary operator '{op}' (first type: {left}, second type: {right})")]
    BinaryOperatorTypeMismatch {
        op: String,
        left: String,
        right: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(semantic::bad_unary_operand))]
    #[error("bad operand type {operand} for unary operator '{op}'")]
    UnaryOperatorTypeMismatch {
        op: String,
        operand: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(semantic::argument_mismatch))]
    #[error("method {method} cannot be applied to given types (required: {required}, found: {found})")]
    ArgumentCountOrTypeMismatch {
        method: String,
        required: String,
        found: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(semantic::uninitialized))]
    #[error("variable {name} might not have been initialized")]
    MayBeUninitialized {
        name: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },
}

impl SemanticError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            SemanticError::DuplicateClass { .. } => DiagnosticKind::DuplicateClass,
            SemanticError::UnresolvedSymbol { .. } => DiagnosticKind::UnresolvedSymbol,
            SemanticError::CyclicInheritance { .. } => DiagnosticKind::CyclicInheritance,
            SemanticError::SymbolAlreadyDefined { .. } => DiagnosticKind::SymbolAlreadyDefined,
            SemanticError::IncompatibleOverrideReturnType { .. } => {
                DiagnosticKind::IncompatibleOverrideReturnType
            }
            SemanticError::TypeMismatch { .. } => DiagnosticKind::TypeMismatch,
            SemanticError::BinaryOperatorTypeMismatch { .. } => {
                DiagnosticKind::BinaryOperatorTypeMismatch
            }
            SemanticError::UnaryOperatorTypeMismatch { .. } => {
                DiagnosticKind::UnaryOperatorTypeMismatch
            }
            SemanticError::ArgumentCountOrTypeMismatch { .. } => {
                DiagnosticKind::ArgumentCountOrTypeMismatch
            }
            SemanticError::MayBeUninitialized { .. } => DiagnosticKind::MayBeUninitialized,
        }
    }

    /// 诊断所在的行列
    pub fn location(&self) -> SourceLocation {
        match self {
            SemanticError::DuplicateClass { at, .. }
            | SemanticError::UnresolvedSymbol { at, .. }
            | SemanticError::CyclicInheritance { at, .. }
            | SemanticError::SymbolAlreadyDefined { at, .. }
            | SemanticError::IncompatibleOverrideReturnType { at, .. }
            | SemanticError::TypeMismatch { at, .. }
            | SemanticError::BinaryOperatorTypeMismatch { at, .. }
            | SemanticError::UnaryOperatorTypeMismatch { at, .. }
            | SemanticError::ArgumentCountOrTypeMismatch { at, .. }
            | SemanticError::MayBeUninitialized { at, .. } => *at,
        }
    }
}

/// 单个分析阶段内累积的诊断
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<SemanticError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: SemanticError) {
        log::debug!("{}: {}", error.location(), error);
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemanticError> {
        self.errors.iter()
    }

    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.errors.iter().map(SemanticError::kind).collect()
    }

    pub fn into_vec(self) -> Vec<SemanticError> {
        self.errors
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum MjError {
    #[diagnostic(code(lexer::unexpected))]
    #[error("Lexer error at line {}, column {}: {message}", at.line, at.column)]
    Lexer {
        message: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[diagnostic(code(parser::unexpected))]
    #[error("Parser error at line {}, column {}: {message}", at.line, at.column)]
    Parser {
        message: String,
        #[label]
        span: SourceSpan,
        at: SourceLocation,
    },

    #[error("[{count}] errors found.")]
    Semantic {
        count: usize,
        #[related]
        diagnostics: Vec<SemanticError>,
    },

    #[error("Code generation error: {0}")]
    CodeGen(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] crate::runtime::RuntimeError),
}

impl MjError {
    /// 语义诊断（仅 Semantic 变体非空）
    pub fn diagnostics(&self) -> &[SemanticError] {
        match self {
            MjError::Semantic { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

impl From<Diagnostics> for MjError {
    fn from(diagnostics: Diagnostics) -> Self {
        let diagnostics = diagnostics.into_vec();
        MjError::Semantic {
            count: diagnostics.len(),
            diagnostics,
        }
    }
}

pub type MjResult<T> = Result<T, MjError>;

pub fn lexer_error(span: Span, message: impl Into<String>) -> MjError {
    MjError::Lexer {
        message: message.into(),
        span: span.into(),
        at: span.loc,
    }
}

pub fn parser_error(span: Span, message: impl Into<String>) -> MjError {
    MjError::Parser {
        message: message.into(),
        span: span.into(),
        at: span.loc,
    }
}

pub fn codegen_error(message: impl Into<String>) -> MjError {
    MjError::CodeGen(message.into())
}
