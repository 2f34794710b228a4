//! MiniJava 集成测试
//!
//! 编译 samples/ 下的示例程序并用参考执行器运行，检查输出与诊断

use std::fs;
use std::path::Path;
use std::process::Command;

use minijava::error::{DiagnosticKind, MjError};
use minijava::{CompileOptions, Compiler};

fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

fn read_sample(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("samples").join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

/// 编译并运行单个示例，返回输出结果
fn compile_and_run(name: &str) -> Result<String, String> {
    init_logger();
    let source = read_sample(name);
    let compiler = Compiler::with_options(CompileOptions {
        step_budget: Some(1_000_000),
        ..CompileOptions::default()
    });
    let out = compiler
        .run(&source, Vec::new())
        .map_err(|e| format!("{} failed: {}", name, e))?;
    String::from_utf8(out).map_err(|e| e.to_string())
}

/// 编译示例，期望编译失败，返回错误
fn compile_expect_error(name: &str) -> MjError {
    init_logger();
    let source = read_sample(name);
    match Compiler::new().compile(&source) {
        Ok(_) => panic!("expected {} to fail, but it compiled", name),
        Err(err) => err,
    }
}

fn kinds(err: &MjError) -> Vec<DiagnosticKind> {
    err.diagnostics().iter().map(|diagnostic| diagnostic.kind()).collect()
}

/// 每条诊断一行：`行:列 消息`
fn messages(err: &MjError) -> String {
    err.diagnostics()
        .iter()
        .map(|diagnostic| format!("{} {}", diagnostic.location(), diagnostic))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_factorial() {
    let output = compile_and_run("factorial.java").unwrap();
    assert_eq!(output, "3628800\n");
}

#[test]
fn test_power() {
    let output = compile_and_run("power.java").unwrap();
    // 2**5, 7**0, 3**3
    assert_eq!(output, "32\n1\n27\n");
}

#[test]
fn test_bubble_sort() {
    let output = compile_and_run("bubble_sort.java").unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines,
        vec!["20", "7", "12", "18", "2", "11", "99999", "2", "7", "11", "12", "18", "20", "0"]
    );
}

#[test]
fn test_virtual_dispatch() {
    let output = compile_and_run("dispatch.java").unwrap();
    assert_eq!(output, "1\n2\n3\n30\n8\n");
}

#[test]
fn test_boolean_logic() {
    let output = compile_and_run("logic.java").unwrap();
    assert_eq!(output, "1\n0\n0\n1\n5\n");
}

#[test]
fn test_same_name_with_other_parameters_does_not_override() {
    let output = compile_and_run("same_name.java").unwrap();
    // first() 绑定到 Single.pick(I)I，即使接收者是 Pair
    assert_eq!(output, "1\n5\n");
}

#[test]
fn test_shadowed_field_read_from_inherited_method() {
    let output = compile_and_run("shadowed_field.java").unwrap();
    // Base.v = 1，Derived.v = 2
    assert_eq!(output, "12\n");
}

#[test]
fn test_uninitialized_reads() {
    let err = compile_expect_error("uninitialized.java");
    // x 在两个分支都赋值；y 只在一个分支赋值；z 只在循环体内赋值
    insta::assert_debug_snapshot!(kinds(&err), @r"
    [
        MayBeUninitialized,
        MayBeUninitialized,
    ]
    ");
    insta::assert_snapshot!(messages(&err), @r"
    15:28 variable y might not have been initialized
    16:16 variable z might not have been initialized
    ");
}

#[test]
fn test_cyclic_inheritance_stops_before_type_checking() {
    let err = compile_expect_error("cyclic.java");
    assert_eq!(kinds(&err), vec![DiagnosticKind::CyclicInheritance]);
    assert_eq!(err.to_string(), "[1] errors found.");
}

#[test]
fn test_override_mismatch_reported_once() {
    let err = compile_expect_error("override_mismatch.java");
    assert_eq!(kinds(&err), vec![DiagnosticKind::IncompatibleOverrideReturnType]);
    assert_eq!(
        err.diagnostics()[0].to_string(),
        "f() in class B cannot override f() in class A: return type boolean is not int"
    );
}

#[test]
fn test_type_errors_accumulate() {
    let err = compile_expect_error("type_errors.java");
    insta::assert_snapshot!(messages(&err), @r"
    3:28 method run() cannot be applied to given types (required: (int), found: (int, int))
    12:15 bad operand types for binary operator '+' (first type: int, second type: boolean)
    13:13 bad operand type int for unary operator '!'
    14:14 incompatible types: required int, found boolean
    15:21 cannot find symbol: method missing (location: class T)
    ");
}

#[test]
fn test_duplicate_class_reported_once() {
    let source = r#"class Main {
    public static void main(String[] a) { System.out.println(1); }
}
class A { int x; }
class A { boolean y; }
class A { }
"#;
    let err = Compiler::new().compile(source).unwrap_err();
    assert_eq!(
        kinds(&err),
        vec![DiagnosticKind::DuplicateClass, DiagnosticKind::DuplicateClass]
    );
}

#[test]
fn test_naming_errors_stop_before_type_checking() {
    // 未解析的父类只是命名错误，但同样会阻止后续阶段
    let source = r#"class Main {
    public static void main(String[] a) { System.out.println(1); }
}
class A extends Missing {
    public int f() { return true; }
}
"#;
    let err = Compiler::new().compile(source).unwrap_err();
    assert_eq!(kinds(&err), vec![DiagnosticKind::UnresolvedSymbol]);
}

#[test]
fn test_listing_snapshot() {
    let source = r#"class Main {
    public static void main(String[] a) {
        System.out.println(new Counter().next(4));
    }
}
class Counter {
    int total;
    public int next(int step) {
        total = total + step;
        return total;
    }
}
"#;
    let modules = Compiler::new().compile(source).unwrap();
    let listing: String = modules.iter().map(|module| module.listing()).collect();
    insta::assert_snapshot!(listing.trim_end(), @r"
    class Main extends java/lang/Object
      method <init>()V locals=0
        load_this
        invoke_special java/lang/Object.<init>()V
        return
      static method main([Ljava/lang/String;)V locals=0
        new Counter
        dup
        invoke_special Counter.<init>()V
        push 4
        invoke_virtual Counter.next(I)I
        print
        return
    class Counter extends java/lang/Object
      field total I
      method <init>()V locals=0
        load_this
        invoke_special java/lang/Object.<init>()V
        return
      method next(I)I locals=0
        load_this
        load_this
        get_field Counter.total I
        load_arg 0
        add
        put_field Counter.total I
        load_this
        get_field Counter.total I
        return_value
    ");
}

#[test]
fn test_null_dereference_at_runtime() {
    let source = r#"class Main {
    public static void main(String[] a) { System.out.println(new Holder().get()); }
}
class Holder {
    Holder next;
    public int get() { return next.get(); }
}
"#;
    let err = Compiler::new().run(source, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        MjError::Runtime(minijava::runtime::RuntimeError::NullDereference(_))
    ));
}

#[test]
fn test_enum_is_rejected() {
    let source = r#"class Main {
    public static void main(String[] a) { public enum Color { RED, GREEN } }
}
"#;
    let err = Compiler::new().compile(source).unwrap_err();
    assert!(matches!(err, MjError::Parser { .. }));
    assert!(err.to_string().contains("enum declarations are not supported (enum Color)"));
}

fn mjc(args: &[&str], source: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_mjc"))
        .args(args)
        .arg(source)
        .output()
        .expect("failed to run mjc")
}

#[test]
fn test_cli_runs_program() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("samples").join("factorial.java");
    let output = mjc(&["--run"], &path);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "3628800\n");
}

#[test]
fn test_cli_exit_status_stays_nonzero() {
    let statements = "System.out.println(true); ".repeat(256);
    let source = format!(
        "class Main {{ public static void main(String[] a) {{ {{ {} }} }} }}\n",
        statements
    );
    let path = std::env::temp_dir().join(format!("mjc_errors_{}.java", std::process::id()));
    fs::write(&path, source).unwrap();

    let output = mjc(&["--check"], &path);
    let _ = fs::remove_file(&path);
    assert_eq!(output.status.code(), Some(255));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[256] errors found."));
}
