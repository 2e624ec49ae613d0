//! Type-name rendering.
//!
//! Two vocabularies: the Zig spelling the code generator emits
//! ([`NativeType::zig_type_name`]) and a descriptive English form used in
//! diagnostics and logs (`Display`).

use std::fmt;

use super::{LibraryType, NativeType, StringKind};

impl NativeType {
    /// Render this type as the Zig type the code generator emits for it.
    pub fn zig_type_name(&self) -> String {
        match self {
            NativeType::Int => "i64".to_string(),
            NativeType::BigInt => "runtime.BigInt".to_string(),
            NativeType::Usize => "usize".to_string(),
            NativeType::Float => "f64".to_string(),
            NativeType::Bool => "bool".to_string(),
            NativeType::Str(_) => "[]const u8".to_string(),
            NativeType::Array { elem, len } => format!("[{}]{}", len, elem.zig_type_name()),
            NativeType::List(elem) => format!("std.ArrayList({})", elem.zig_type_name()),
            NativeType::Dict { key, value } => {
                if key.is_string() {
                    format!("std.StringHashMap({})", value.zig_type_name())
                } else {
                    format!(
                        "std.AutoHashMap({}, {})",
                        key.zig_type_name(),
                        value.zig_type_name()
                    )
                }
            }
            NativeType::Set(elem) => {
                if elem.is_string() {
                    "std.StringHashMap(void)".to_string()
                } else {
                    format!("std.AutoHashMap({}, void)", elem.zig_type_name())
                }
            }
            NativeType::Tuple(elems) => {
                let fields: Vec<String> = elems.iter().map(NativeType::zig_type_name).collect();
                format!("struct {{ {} }}", fields.join(", "))
            }
            NativeType::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(NativeType::zig_type_name).collect();
                format!("*const fn ({}) {}", params.join(", "), ret.zig_type_name())
            }
            NativeType::Closure(name) => format!("Closure_{}", name.replace('.', "_")),
            NativeType::Callable => "runtime.Callable".to_string(),
            NativeType::Instance(class) => format!("*{}", class),
            NativeType::Optional(inner) => format!("?{}", inner.zig_type_name()),
            NativeType::None => "void".to_string(),
            NativeType::Library(lib) => lib.zig_type_name().to_string(),
            NativeType::Unknown => "*runtime.PyObject".to_string(),
        }
    }
}

impl LibraryType {
    fn zig_type_name(&self) -> &'static str {
        match self {
            LibraryType::File => "runtime.File",
            LibraryType::HashObject => "runtime.HashObject",
            LibraryType::Path => "runtime.Path",
            LibraryType::Socket => "runtime.Socket",
            LibraryType::DbConnection => "runtime.sqlite.Connection",
            LibraryType::DbCursor => "runtime.sqlite.Cursor",
            LibraryType::DbRow => "runtime.sqlite.Row",
            LibraryType::Exception(_) => "runtime.Exception",
        }
    }
}

impl fmt::Display for StringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringKind::Literal => write!(f, "literal string"),
            StringKind::Runtime => write!(f, "string"),
            StringKind::Slice => write!(f, "string slice"),
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryType::File => write!(f, "file"),
            LibraryType::HashObject => write!(f, "hash object"),
            LibraryType::Path => write!(f, "path"),
            LibraryType::Socket => write!(f, "socket"),
            LibraryType::DbConnection => write!(f, "database connection"),
            LibraryType::DbCursor => write!(f, "database cursor"),
            LibraryType::DbRow => write!(f, "database row"),
            LibraryType::Exception(name) => write!(f, "exception {}", name),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[NativeType]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Int => write!(f, "int"),
            NativeType::BigInt => write!(f, "big int"),
            NativeType::Usize => write!(f, "index"),
            NativeType::Float => write!(f, "float"),
            NativeType::Bool => write!(f, "bool"),
            NativeType::Str(kind) => write!(f, "{}", kind),
            NativeType::Array { elem, len } => write!(f, "array of {} {}", len, elem),
            NativeType::List(elem) => write!(f, "list of {}", elem),
            NativeType::Dict { key, value } => write!(f, "dict of {} to {}", key, value),
            NativeType::Set(elem) => write!(f, "set of {}", elem),
            NativeType::Tuple(elems) => {
                write!(f, "tuple (")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            NativeType::Function { params, ret } => {
                write!(f, "function (")?;
                write_list(f, params)?;
                write!(f, ") -> {}", ret)
            }
            NativeType::Closure(name) => write!(f, "closure {}", name),
            NativeType::Callable => write!(f, "callable"),
            NativeType::Instance(class) => write!(f, "{} instance", class),
            NativeType::Optional(inner) => write!(f, "optional {}", inner),
            NativeType::None => write!(f, "none"),
            NativeType::Library(lib) => write!(f, "{}", lib),
            NativeType::Unknown => write!(f, "unknown"),
        }
    }
}
