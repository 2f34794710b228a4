pub mod error;
pub mod types;
pub mod ast;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod codegen;
pub mod runtime;

use std::io::Write;

use codegen::ClassModule;
use error::MjResult;
use runtime::Machine;
use semantic::{Analysis, SemanticAnalyzer};

/// 编译与执行选项
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// 执行时的指令预算，None 为不限制
    pub step_budget: Option<u64>,
    pub max_call_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            step_budget: None,
            max_call_depth: runtime::DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_options(CompileOptions::default())
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    /// 词法、语法和全部语义检查，不生成代码
    pub fn check(&self, source: &str) -> MjResult<(ast::Program, Analysis)> {
        // 1. 词法分析
        let tokens = lexer::lex(source)?;
        log::debug!("lexed {} token(s)", tokens.len());

        // 2. 语法分析
        let program = parser::parse(tokens)?;
        log::debug!("parsed {} class(es)", program.classes.len() + 1);

        // 3. 语义分析
        let analysis = SemanticAnalyzer::new().analyze(&program)?;
        Ok((program, analysis))
    }

    pub fn compile(&self, source: &str) -> MjResult<Vec<ClassModule>> {
        let (program, analysis) = self.check(source)?;

        // 4. 代码生成
        codegen::generate(&program, &analysis)
    }

    /// 编译后用参考执行器运行，print 输出写入 out
    pub fn run<W: Write>(&self, source: &str, out: W) -> MjResult<W> {
        let modules = self.compile(source)?;
        let mut machine = Machine::new(&modules, out)?
            .with_step_budget(self.options.step_budget)
            .with_max_call_depth(self.options.max_call_depth);
        machine.run()?;
        Ok(machine.into_output())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
