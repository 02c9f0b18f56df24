use talktalk::{interpret, InterpretError};

fn run(source: &str) -> String {
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn call_with_arguments() {
    let out = run("func add(a, b) { return a + b; } print add(2, 3);");
    assert_eq!(&out, "5\n");
}

#[test]
fn recursion() {
    let source = r#"
func fib(n) {
    if n < 2 {
        return n;
    }
    return fib(n - 2) + fib(n - 1);
}
print fib(15);
"#;
    assert_eq!(&run(source), "610\n");
}

#[test]
fn implicit_return_is_nil() {
    let out = run("func f() { } print f(); func g() { return; } print g();");
    assert_eq!(&out, "nil\nnil\n");
}

#[test]
fn functions_print_their_name() {
    let out = run("func hello() { } print hello; print clock;");
    assert_eq!(&out, "<fn hello>\n<native clock>\n");
}

#[test]
fn local_functions() {
    let source = r#"
{
    func twice(x) { return x * 2; }
    print twice(21);
}
"#;
    assert_eq!(&run(source), "42\n");
}

#[test]
fn arity_mismatch() {
    let source = "func f(a, b) { } f(1);";
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(matches!(err, InterpretError::Runtime(_)));
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Expected 2 arguments but got 1."));
}

#[test]
fn unbounded_recursion() {
    let source = "func forever(n) { return forever(n + 1); } forever(0);";
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(err.to_string().contains("Stack overflow."));
}

#[test]
fn natives() {
    let out = run("write(\"no newline\"); print \"\"; print clock() > 0;");
    assert_eq!(&out, "no newline\ntrue\n");
}
