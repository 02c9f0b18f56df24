use talktalk::{interpret, InterpretError};

fn run(source: &str) -> String {
    let mut out = Vec::new();
    interpret(source, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn runtime_output(source: &str) -> String {
    let mut out = Vec::new();
    let err = interpret(source, &mut out).unwrap_err();
    assert!(matches!(err, InterpretError::Runtime(_)), "got {err}");
    String::from_utf8(out).unwrap()
}

#[test]
fn counter() {
    let source = "class Counter { init() { self.n = 0; } inc() { self.n = self.n + 1; return self.n; } } var c = Counter(); print c.inc(); print c.inc();";
    assert_eq!(&run(source), "1\n2\n");
}

#[test]
fn initializer_returns_instance() {
    let source = r#"
class Point {
    init(x, y) {
        self.x = x;
        self.y = y;
    }
}
var p = Point(1, 2);
print p;
print p.x + p.y;
print p.init(3, 4) == p;
print p.x;
"#;
    assert_eq!(&run(source), "<Point instance>\n3\ntrue\n3\n");
}

#[test]
fn no_initializer_takes_no_arguments() {
    let out = runtime_output("class Empty { } Empty(1);");
    assert!(out.contains("Expected 0 arguments but got 1."));
}

#[test]
fn invoke_matches_get_and_call() {
    let source = r#"
class Greeter {
    init(name) { self.name = name; }
    greet(greeting) { return greeting + ", " + self.name; }
}
var g = Greeter("ada");
print g.greet("hi");
var bound = g.greet;
print bound("hi");
print bound;
"#;
    assert_eq!(
        &run(source),
        "hi, ada\nhi, ada\n<bound method Greeter.greet>\n"
    );
}

#[test]
fn fields_shadow_methods() {
    let source = r#"
class Box {
    value() { return "method"; }
}
func field() { return "field"; }
var b = Box();
print b.value();
b.value = field;
print b.value();
"#;
    assert_eq!(&run(source), "method\nfield\n");
}

#[test]
fn computed_properties() {
    let source = r#"
class Rect {
    init(w, h) {
        self.w = w;
        self.h = h;
    }
    var area {
        return self.w * self.h;
    }
}
var r = Rect(2, 3);
print r.area;
r.w = 10;
print r.area;
"#;
    assert_eq!(&run(source), "6\n30\n");
}

#[test]
fn description_is_used_for_printing() {
    let source = r#"
class Named {
    init(name) { self.name = name; }
    var description { return "Named(" + self.name + ")"; }
}
class Plain { }
var plain = Plain();
plain.description = "from a field";
print Named("x");
print plain;
"#;
    assert_eq!(&run(source), "Named(x)\nfrom a field\n");
}

#[test]
fn inheritance_and_super() {
    let source = r#"
class Animal {
    init(name) { self.name = name; }
    speak() { return self.name + " makes a sound"; }
    var kind { return "animal"; }
}
class Dog: Animal {
    init(name) { super.init(name); }
    speak() { return super.speak() + ", woof"; }
}
var d = Dog("rex");
print d.speak();
print d.kind;
print d.name;
"#;
    assert_eq!(&run(source), "rex makes a sound, woof\nanimal\nrex\n");
}

#[test]
fn inheritance_is_flattened_once() {
    let source = r#"
class Base {
    hello() { return "base"; }
}
class Derived: Base { }
print Derived().hello();
"#;
    assert_eq!(&run(source), "base\n");
}

#[test]
fn superclass_must_be_a_class() {
    let out = runtime_output("var NotClass = 1; class Sub: NotClass { }");
    assert!(out.contains("Superclass must be a class."));
}

#[test]
fn undefined_property() {
    let out = runtime_output("class A { } print A().missing;");
    assert!(out.contains("Undefined property 'missing'."));
}

#[test]
fn only_instances_have_properties() {
    let out = runtime_output("var a = 1; print a.b;");
    assert!(out.contains("Only instances have properties."));
}

#[test]
fn subscript_method() {
    let source = r#"
class Squares {
    subscript(n) { return n * n; }
}
var s = Squares();
print s[4];
"#;
    assert_eq!(&run(source), "16\n");
}

#[test]
fn self_recursive_computed_property_overflows() {
    let out = runtime_output("class A { var x { return self.x; } } print A().x;");
    assert!(out.contains("Stack overflow."), "got {out}");
}

#[test]
fn self_recursive_description_overflows() {
    let out = runtime_output("class A { var description { return \"\" + self.description; } } print A();");
    assert!(out.contains("Stack overflow."), "got {out}");
}

#[test]
fn self_recursive_computed_invoke_overflows() {
    let out = runtime_output("class A { var f { return self.f(); } } A().f();");
    assert!(out.contains("Stack overflow."), "got {out}");
}

#[test]
fn nested_computed_properties_within_limit() {
    let source = r#"
class Node {
    init(next) { self.next = next; }
    var depth {
        if self.next == nil { return 1; }
        return self.next.depth + 1;
    }
}
var node = nil;
var i = 0;
while i < 20 {
    node = Node(node);
    i = i + 1;
}
print node.depth;
"#;
    assert_eq!(&run(source), "20\n");
}
