use talktalk::interpret;

#[test]
fn comparisons_1() {
    let source = "print nil == true;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let expected = "false\n";
    assert_eq!(&out, expected);
}

#[test]
fn comparisons_2() {
    let source = "print !(5 - 4 > 3 * 2 == !nil);";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let expected = "true\n";
    assert_eq!(&out, expected);
}

#[test]
fn inclusive_comparisons() {
    let source = "print 2 >= 2; print 1 <= 0; print 3 != 3; print 1 == 1.0;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(&out, "true\nfalse\nfalse\ntrue\n");
}

#[test]
fn truthiness() {
    let source = "print !nil; print !false; print !0; print !\"\";";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(&out, "true\ntrue\nfalse\nfalse\n");
}

#[test]
fn mismatched_comparison() {
    let source = "print 1 < \"a\";";
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(err.to_string().contains("Cannot apply '<' to int and string"));
}

#[test]
fn large_ints_compare_exactly() {
    let source = "print 9007199254740993 > 9007199254740992; print 9007199254740992 >= 9007199254740993; print 9007199254740993 == 9007199254740992.0;";
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(&out, "true\nfalse\nfalse\n");
}
