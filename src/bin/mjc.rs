use anyhow::{Context, Result};
use clap::Parser;
use miette::{NamedSource, Report};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use minijava::error::MjError;
use minijava::codegen::ClassModule;
use minijava::runtime::Machine;
use minijava::{CompileOptions, Compiler, lexer, parser};

#[derive(clap::Parser, Debug)]
#[command(name = "mjc", author, version, about = "MiniJava compiler")]
struct Args {
    /// MiniJava source file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Stop after lexing and print the tokens
    #[arg(long, conflicts_with_all = ["parse", "check"])]
    lex: bool,

    /// Stop after parsing and print the syntax tree
    #[arg(long, conflicts_with_all = ["lex", "check"])]
    parse: bool,

    /// Stop after semantic analysis
    #[arg(long, conflicts_with_all = ["lex", "parse"])]
    check: bool,

    /// Print the generated instruction listing
    #[arg(long)]
    listing: bool,

    /// Execute the program with the reference executor
    #[arg(long)]
    run: bool,

    /// Instruction budget for --run
    #[arg(long, value_name = "STEPS", requires = "run")]
    max_steps: Option<u64>,

    /// Write one <Class>.mjasm listing per class into DIR
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    match compile(&args, &source) {
        Ok(()) => Ok(()),
        Err(Failure::Compile(err)) => {
            let status = exit_status(err.diagnostics().len());
            let name = args.input.display().to_string();
            let report = Report::new(err).with_source_code(NamedSource::new(name, source));
            eprintln!("{:?}", report);
            process::exit(status);
        }
        Err(Failure::Other(err)) => Err(err),
    }
}

/// 失败时的退出码：诊断数，限制在 1..=255 内（进程退出码只保留低 8 位）
fn exit_status(count: usize) -> i32 {
    i32::from(u8::try_from(count.clamp(1, 255)).unwrap_or(u8::MAX))
}

enum Failure {
    Compile(MjError),
    Other(anyhow::Error),
}

impl From<MjError> for Failure {
    fn from(err: MjError) -> Self {
        Failure::Compile(err)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::Other(err)
    }
}

fn compile(args: &Args, source: &str) -> Result<(), Failure> {
    if args.lex {
        for token in lexer::lex(source)? {
            println!("{}\t{}", token.loc(), token.token);
        }
        return Ok(());
    }

    if args.parse {
        let program = parser::parse(lexer::lex(source)?)?;
        println!("{:#?}", program);
        return Ok(());
    }

    let compiler = Compiler::with_options(CompileOptions {
        step_budget: args.max_steps,
        ..CompileOptions::default()
    });

    if args.check {
        compiler.check(source)?;
        println!("{}: ok", args.input.display());
        return Ok(());
    }

    let modules = compiler.compile(source)?;
    if args.listing {
        for module in &modules {
            print!("{}", module);
        }
    }
    if let Some(dir) = &args.output {
        write_listings(dir, &modules)?;
    }
    if args.run {
        let mut machine = Machine::new(&modules, io::stdout().lock())
            .map_err(MjError::from)?
            .with_step_budget(args.max_steps);
        machine.run().map_err(MjError::from)?;
    }
    Ok(())
}

fn write_listings(dir: &Path, modules: &[ClassModule]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for module in modules {
        let path = dir.join(format!("{}.mjasm", module.name));
        let mut file = fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(module.listing().as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}
