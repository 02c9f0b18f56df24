use talktalk::interpret;

fn run(source: &str) -> String {
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn counter() {
    let source = r#"
func makeCounter() {
    var count = 0;
    func next() {
        count = count + 1;
        return count;
    }
    return next;
}
var counter = makeCounter();
print counter();
print counter();
var other = makeCounter();
print other();
"#;
    assert_eq!(&run(source), "1\n2\n1\n");
}

#[test]
fn writes_visible_after_return() {
    let source = r#"
var set;
var get;
func pair() {
    var value = "before";
    func setter(v) { value = v; }
    func getter() { return value; }
    set = setter;
    get = getter;
}
pair();
set("after");
print get();
"#;
    assert_eq!(&run(source), "after\n");
}

#[test]
fn closure_sees_enclosing_writes() {
    let source = r#"
{
    var a = 1;
    func show() { print a; }
    a = 2;
    show();
}
"#;
    assert_eq!(&run(source), "2\n");
}

#[test]
fn nested_capture() {
    let source = r#"
func outer() {
    var x = "outer";
    func middle() {
        func inner() {
            return x;
        }
        return inner;
    }
    return middle;
}
print outer()()();
"#;
    assert_eq!(&run(source), "outer\n");
}

#[test]
fn each_loop_iteration_shares_the_variable() {
    let source = r#"
var first;
{
    var i = 0;
    func capture() { return i; }
    first = capture;
    while i < 3 {
        i = i + 1;
    }
}
print first();
"#;
    assert_eq!(&run(source), "3\n");
}
