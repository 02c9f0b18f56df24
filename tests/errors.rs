use talktalk::{interpret, InterpretError};

#[test]
fn errors() {
    let source = r#""hi" "i";
!;
naf;
"#;
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    let errs = match err {
        InterpretError::Compile(e) => e,
        InterpretError::Runtime(_) => panic!(),
    };
    assert_eq!(errs.errors().len(), 2);
    assert_eq!(errs.errors()[0].line, 1);
    assert_eq!(errs.errors()[1].line, 2);
}

#[test]
fn compile_errors_run_nothing() {
    let source = "print 1;\nprint ;";
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(matches!(err, InterpretError::Compile(_)));
    assert!(out.is_empty());
}

#[test]
fn runtime_error_backtrace() {
    let source = r#"
func fail() {
    return nil();
}
func call() {
    fail();
}
call();
"#;
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(matches!(err, InterpretError::Runtime(_)));
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Can only call functions and classes, not nil."));
    assert!(out.contains("[line 3] in fail()"));
    assert!(out.contains("[line 6] in call()"));
    assert!(out.contains("[line 8] in script"));
}

#[test]
fn output_before_error_is_kept() {
    let source = "print 1; print missing; print 2;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap_err();
    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("1\n"));
    assert!(!out.contains("\n2\n"));
}
