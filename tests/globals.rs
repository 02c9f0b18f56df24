use talktalk::{interpret, InterpretError};

#[test]
fn var_declaration_1() {
    let source = "var i = 1; print i;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let expected = "1\n";
    assert_eq!(&out, expected);
}

#[test]
fn var_declaration_2() {
    let source = r#"
var beverage = "cafe au lait";
var breakfast = "beignets with " + beverage;
print breakfast;"#;
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let expected = "beignets with cafe au lait\n";
    assert_eq!(&out, expected);
}

#[test]
fn var_declaration_3() {
    let source = r#"
var breakfast = "beignets";
var beverage = "cafe au lait";
breakfast = "beignets with " + beverage;

print breakfast;"#;
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let expected = "beignets with cafe au lait\n";
    assert_eq!(&out, expected);
}

#[test]
fn uninitialized_is_nil() {
    let source = "var a; print a;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(&out, "nil\n");
}

#[test]
fn assignment_precedence() {
    let source = r#"
var a = 1;
var b = 2;
var c = 3;
var d = 4;
a * b = c + d;
    "#;
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    let errs = match err {
        InterpretError::Compile(e) => e,
        InterpretError::Runtime(_) => panic!(),
    };
    assert_eq!(errs.errors().len(), 1);
}

#[test]
fn undefined_global() {
    let source = "print undefinedName;";
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(matches!(err, InterpretError::Runtime(_)));
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Undefined variable 'undefinedName'."));
}

#[test]
fn assigning_undefined_global() {
    let source = "missing = 1;";
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(matches!(err, InterpretError::Runtime(_)));
}
