use talktalk::interpret;

#[test]
fn simple_arithmetic_1() {
    let source = "print 1 + 2 + -3 * 4/(3-5);";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let expected = "9\n";
    assert_eq!(&out, expected);
}

#[test]
fn simple_arithmetic_2() {
    let source = "print (-1 + 2) * 3 - -4;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let expected = "7\n";
    assert_eq!(&out, expected);
}

#[test]
fn addition() {
    let source = "print 1 + 2;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(&out, "3\n");
}

#[test]
fn operators_are_left_associative() {
    let source = "print 10 - 4 - 3; print 64 / 4 / 2;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(&out, "3\n8\n");
}

#[test]
fn integer_division_truncates() {
    let source = "print 7 / 2; print 7 / 2.0; print 1.5 + 1;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(&out, "3\n3.5\n2.5\n");
}

#[test]
fn division_by_zero() {
    let source = "print 1 / 0;";
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(err.to_string().contains("Division by zero"));
}

#[test]
fn operands_must_be_numbers() {
    let source = "print -\"a\";";
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(err.to_string().contains("Cannot apply '-' to string"));
}
