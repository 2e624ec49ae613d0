//! End-to-end inference over Python source

use zyth_core::{infer_python, NativeType};

#[test]
fn test_constructor_argument_reaches_field() {
    let python_code = r#"
class P:
    def __init__(self, name):
        self.name = name

p = P("x")
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.class_field("P", "name"), Some(&NativeType::string()));
    assert_eq!(env.get_var("p"), Some(&NativeType::instance("P")));
    assert_eq!(
        env.get_scoped_var(Some("P.__init__"), "name"),
        Some(&NativeType::string()),
        "constructor parameter should take the call-site argument type"
    );
}

#[test]
fn test_sibling_functions_do_not_share_locals() {
    let python_code = r#"
def f():
    x = 1
    return x

def g():
    x = "hello"
    return x
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.get_scoped_var(Some("f"), "x"), Some(&NativeType::Int));
    assert!(env.get_scoped_var(Some("g"), "x").is_some_and(NativeType::is_string));
    assert_eq!(env.get_scoped_var(None, "x"), None, "locals must not leak to module level");
    assert_eq!(env.function_return("f"), Some(&NativeType::Int));
    assert_eq!(env.function_return("g"), Some(&NativeType::string()));
}

#[test]
fn test_closure_captures_enclosing_local() {
    let python_code = r#"
def outer():
    y = 1
    def inner():
        return y + 1
    def helper(a):
        return a
    return inner
"#;
    let env = infer_python(python_code).unwrap();

    let captured: Vec<&str> = env
        .captures("outer.inner")
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(captured, vec!["y"]);
    assert!(env.captures("outer.helper").unwrap().is_empty());
    assert_eq!(env.function_return("outer.inner"), Some(&NativeType::Int));
    assert_eq!(
        env.function_return("outer"),
        Some(&NativeType::Closure("outer.inner".to_string()))
    );
}

#[test]
fn test_unresolved_name_is_not_a_capture() {
    let python_code = r#"
def outer():
    def inner():
        return z
    return 0
"#;
    let env = infer_python(python_code).unwrap();

    assert!(env.captures("outer.inner").unwrap().is_empty());
    assert_eq!(env.function_return("outer.inner"), Some(&NativeType::Unknown));
}

#[test]
fn test_mutated_literal_list_becomes_growable() {
    let python_code = r#"
xs = [1, 2, 3]
xs.append(4)
ys = [1, 2, 3]
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.get_var("xs"), Some(&NativeType::list(NativeType::Int)));
    assert_eq!(env.get_var("ys"), Some(&NativeType::array(NativeType::Int, 3)));
}

#[test]
fn test_tuple_index_by_position() {
    let python_code = r#"
t = (1, "a", 2.5)
first = t[0]
second = t[1]
last = t[-1]
i = 0
anywhere = t[i]
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.get_var("first"), Some(&NativeType::Int));
    assert!(env.get_var("second").is_some_and(NativeType::is_string));
    assert_eq!(env.get_var("last"), Some(&NativeType::Float));
    assert_eq!(env.get_var("anywhere"), Some(&NativeType::Unknown));
}

#[test]
fn test_division_is_always_float() {
    let env = infer_python("a = 6 / 3\nb = 7 // 2\n").unwrap();

    assert_eq!(env.get_var("a"), Some(&NativeType::Float));
    assert_eq!(env.get_var("b"), Some(&NativeType::Int));
}

#[test]
fn test_standard_library_calls() {
    let python_code = r#"
import math
import hashlib

r = math.sqrt(2.0)
n = math.floor(2.5)
digest = hashlib.sha256(b"abc").hexdigest()
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.get_var("r"), Some(&NativeType::Float));
    assert_eq!(env.get_var("n"), Some(&NativeType::Int));
    assert_eq!(env.get_var("digest"), Some(&NativeType::string()));
}

#[test]
fn test_none_then_value_widens_to_optional() {
    let python_code = r#"
def find(flag: bool):
    if flag:
        return 1
    return None
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(
        env.function_return("find"),
        Some(&NativeType::optional(NativeType::Int))
    );
}

#[test]
fn test_method_return_through_instance() {
    let python_code = r#"
class Counter:
    def __init__(self):
        self.count = 0

    def next(self):
        self.count += 1
        return self.count

c = Counter()
value = c.next()
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.class_field("Counter", "count"), Some(&NativeType::Int));
    assert_eq!(env.class_method_return("Counter", "next"), Some(&NativeType::Int));
    assert_eq!(env.get_var("value"), Some(&NativeType::Int));
}

#[test]
fn test_grown_array_reaches_return_and_caller() {
    let python_code = r#"
def build():
    xs = [1, 2, 3]
    xs.append(4)
    return xs

ys = build()
"#;
    let env = infer_python(python_code).unwrap();
    let list = NativeType::list(NativeType::Int);

    assert_eq!(env.get_scoped_var(Some("build"), "xs"), Some(&list));
    assert_eq!(
        env.function_return("build"),
        Some(&list),
        "return type must not keep the fixed array\nGot: {:?}",
        env.function_return("build")
    );
    assert_eq!(env.get_var("ys"), Some(&list));
}

#[test]
fn test_appended_init_field_becomes_list() {
    let python_code = r#"
class B:
    def __init__(self):
        self.items = [1, 2, 3]

    def add(self, v):
        self.items.append(v)

b = B()
b.add(4)
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.class_field("B", "items"), Some(&NativeType::list(NativeType::Int)));
}

#[test]
fn test_nonlocal_write_widens_enclosing_binding() {
    let python_code = r#"
def outer():
    count = 0
    def bump():
        nonlocal count
        count += 1.5
        return count
    bump()
    return count
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.get_scoped_var(Some("outer"), "count"), Some(&NativeType::Float));
    assert_eq!(env.get_scoped_var(Some("outer.bump"), "count"), None);
    assert_eq!(env.function_return("outer"), Some(&NativeType::Float));
}

#[test]
fn test_oversized_struct_format_is_unknown() {
    let python_code = r#"
import struct

v = struct.unpack("100000000000000i", b"")
w = struct.unpack("<2i", b"")
"#;
    let env = infer_python(python_code).unwrap();

    assert_eq!(env.get_var("v"), Some(&NativeType::Unknown));
    assert_eq!(
        env.get_var("w"),
        Some(&NativeType::Tuple(vec![NativeType::Int, NativeType::Int]))
    );
}
