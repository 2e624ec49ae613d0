//! Builtin functions and methods of builtin value types.

use std::sync::LazyLock;

use fnv::FnvHashMap;

use crate::hir::{HirExpr, Literal};
use crate::types::{numeric_promotion, widen, widen_all, NativeType};

/// How a call's result type is derived from its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnRule {
    Fixed(NativeType),
    /// The first argument's own type (`abs`, `copy.copy`).
    SameAsArg,
    /// One element of the first argument (`random.choice`).
    ElementOfArg,
    /// A list of the first argument's elements (`sorted`, `list`).
    ListOfArgElements,
    SetOfArgElements,
    /// Widened arguments, or widened elements of a single iterable (`max`).
    Extremum,
    /// Numeric promotion across all arguments (`pow`).
    Numeric,
    /// Element of the first argument when numeric, else int (`sum`).
    Sum,
    /// `round(x)` is an int, `round(x, n)` keeps a float.
    Round,
    /// Pairs of index and element.
    Enumerate,
    /// Tuples of element types, one per argument.
    Zip,
    /// Tuple whose element types follow a literal struct format string.
    StructUnpack,
    /// Two results of numeric promotion.
    DivMod,
    /// `dict(...)` from another dict or keyword arguments.
    DictFrom,
}

impl ReturnRule {
    pub fn apply(&self, args: &[NativeType], arg_exprs: &[HirExpr]) -> NativeType {
        let first = || args.first().cloned().unwrap_or_default();
        match self {
            ReturnRule::Fixed(ty) => ty.clone(),
            ReturnRule::SameAsArg => first(),
            ReturnRule::ElementOfArg => first().iter_element(),
            ReturnRule::ListOfArgElements => match args.first() {
                Some(arg) => NativeType::list(arg.iter_element().into_owned()),
                None => NativeType::list(NativeType::Unknown),
            },
            ReturnRule::SetOfArgElements => match args.first() {
                Some(arg) => NativeType::set(arg.iter_element().into_owned()),
                None => NativeType::set(NativeType::Unknown),
            },
            ReturnRule::Extremum => match args {
                [single] => single.iter_element(),
                _ => widen_all(args.iter()),
            },
            ReturnRule::Numeric => args
                .iter()
                .skip(1)
                .try_fold(first(), |acc, ty| numeric_promotion(&acc, ty))
                .unwrap_or(NativeType::Unknown),
            ReturnRule::Sum => {
                let elem = first().iter_element();
                let start = args.get(1).cloned().unwrap_or(NativeType::Int);
                numeric_promotion(&elem, &start).unwrap_or(NativeType::Int)
            }
            ReturnRule::Round => {
                if args.len() > 1 {
                    NativeType::Float
                } else {
                    NativeType::Int
                }
            }
            ReturnRule::Enumerate => NativeType::list(NativeType::Tuple(vec![
                NativeType::Usize,
                first().iter_element(),
            ])),
            ReturnRule::Zip => NativeType::list(NativeType::Tuple(
                args.iter().map(NativeType::iter_element).collect(),
            )),
            ReturnRule::StructUnpack => arg_exprs
                .first()
                .and_then(|fmt| match fmt {
                    HirExpr::Literal(Literal::String(s)) => Some(struct_format_types(s)),
                    HirExpr::Literal(Literal::Bytes(b)) => {
                        Some(struct_format_types(&String::from_utf8_lossy(b)))
                    }
                    _ => None,
                })
                .unwrap_or(NativeType::Unknown),
            ReturnRule::DivMod => {
                let ty = numeric_promotion(&first(), args.get(1).unwrap_or(&NativeType::Int))
                    .unwrap_or(NativeType::Unknown);
                NativeType::Tuple(vec![ty.clone(), ty])
            }
            ReturnRule::DictFrom => match args.first() {
                Some(dict @ NativeType::Dict { .. }) => dict.clone().into_owned(),
                Some(NativeType::List(pair)) => match pair.as_ref() {
                    NativeType::Tuple(kv) if kv.len() == 2 => {
                        NativeType::dict(kv[0].clone().into_owned(), kv[1].clone().into_owned())
                    }
                    _ => NativeType::dict(NativeType::string(), NativeType::Unknown),
                },
                _ => NativeType::dict(NativeType::string(), NativeType::Unknown),
            },
        }
    }
}

/// Most values a `struct` format may unpack to before the result is left
/// unknown.
pub const MAX_STRUCT_FIELDS: usize = 256;

/// Element types for a `struct` format string: integer codes map to int,
/// `e`/`f`/`d` to float, `?` to bool, `s`/`p` to string. Byte order and
/// padding characters carry no value. Formats with more than
/// [`MAX_STRUCT_FIELDS`] values are unknown.
pub fn struct_format_types(format: &str) -> NativeType {
    let mut elems = Vec::new();
    let mut count = String::new();
    for c in format.chars() {
        if c.is_ascii_digit() {
            count.push(c);
            continue;
        }
        let repeat = if count.is_empty() {
            1
        } else {
            match count.parse::<usize>() {
                Ok(n) => n,
                Err(_) => return NativeType::Unknown,
            }
        };
        count.clear();
        let ty = match c {
            'b' | 'B' | 'h' | 'H' | 'i' | 'I' | 'l' | 'L' | 'q' | 'Q' | 'n' | 'N' => NativeType::Int,
            'e' | 'f' | 'd' => NativeType::Float,
            '?' => NativeType::Bool,
            // A counted string is one value.
            's' | 'p' => {
                if elems.len() >= MAX_STRUCT_FIELDS {
                    return NativeType::Unknown;
                }
                elems.push(NativeType::string());
                continue;
            }
            'c' => NativeType::string(),
            _ => continue,
        };
        match elems.len().checked_add(repeat) {
            Some(total) if total <= MAX_STRUCT_FIELDS => elems.extend(std::iter::repeat(ty).take(repeat)),
            _ => return NativeType::Unknown,
        }
    }
    NativeType::Tuple(elems)
}

static BUILTIN_FUNCTIONS: LazyLock<FnvHashMap<&'static str, ReturnRule>> = LazyLock::new(|| {
    use ReturnRule::*;

    let mut m = FnvHashMap::default();
    for name in ["len", "ord", "hash", "id", "int"] {
        m.insert(name, Fixed(NativeType::Int));
    }
    for name in ["str", "repr", "chr", "hex", "bin", "oct", "format", "input", "ascii", "bytes"] {
        m.insert(name, Fixed(NativeType::string()));
    }
    for name in ["bool", "isinstance", "issubclass", "callable", "hasattr", "all", "any"] {
        m.insert(name, Fixed(NativeType::Bool));
    }
    m.insert("float", Fixed(NativeType::Float));
    m.insert("print", Fixed(NativeType::None));
    m.insert("open", Fixed(NativeType::Library(crate::types::LibraryType::File)));
    m.insert("abs", SameAsArg);
    m.insert("min", Extremum);
    m.insert("max", Extremum);
    m.insert("sum", Sum);
    m.insert("round", Round);
    m.insert("pow", Numeric);
    m.insert("divmod", DivMod);
    m.insert("next", ElementOfArg);
    m.insert("list", ListOfArgElements);
    m.insert("sorted", ListOfArgElements);
    m.insert("reversed", ListOfArgElements);
    m.insert("tuple", ListOfArgElements);
    m.insert("iter", ListOfArgElements);
    m.insert("set", SetOfArgElements);
    m.insert("frozenset", SetOfArgElements);
    m.insert("dict", DictFrom);
    m.insert("enumerate", Enumerate);
    m.insert("zip", Zip);
    m.insert("range", Fixed(NativeType::list(NativeType::Int)));
    m
});

/// Builtin exception classes; calling one constructs the exception marker.
pub const EXCEPTION_NAMES: &[&str] = &[
    "Exception",
    "BaseException",
    "ValueError",
    "TypeError",
    "KeyError",
    "IndexError",
    "RuntimeError",
    "ZeroDivisionError",
    "AttributeError",
    "NotImplementedError",
    "StopIteration",
    "AssertionError",
    "IOError",
    "OSError",
    "FileNotFoundError",
    "PermissionError",
    "OverflowError",
    "ArithmeticError",
    "LookupError",
    "NameError",
    "ImportError",
    "TimeoutError",
    "ConnectionError",
    "UnicodeDecodeError",
    "UnicodeEncodeError",
    "MemoryError",
    "RecursionError",
];

pub fn builtin_function(name: &str) -> Option<&'static ReturnRule> {
    BUILTIN_FUNCTIONS.get(name)
}

pub fn is_exception_name(name: &str) -> bool {
    EXCEPTION_NAMES.contains(&name) || name.ends_with("Error")
}

/// Result of calling `method` on a value of a builtin type, if known.
pub fn builtin_method(receiver: &NativeType, method: &str, args: &[NativeType]) -> Option<NativeType> {
    match receiver {
        NativeType::Str(_) => string_method(method),
        NativeType::Dict { key, value } => dict_method(key, value, method, args),
        NativeType::List(elem) | NativeType::Array { elem, .. } => list_method(elem, method),
        NativeType::Set(elem) => set_method(receiver, elem, method),
        NativeType::Int | NativeType::Usize | NativeType::BigInt => match method {
            "bit_length" | "bit_count" => Some(NativeType::Int),
            "to_bytes" => Some(NativeType::string()),
            _ => None,
        },
        NativeType::Float => match method {
            "is_integer" => Some(NativeType::Bool),
            "hex" => Some(NativeType::string()),
            "as_integer_ratio" => Some(NativeType::Tuple(vec![NativeType::Int, NativeType::Int])),
            _ => None,
        },
        _ => None,
    }
}

fn string_method(method: &str) -> Option<NativeType> {
    let ty = match method {
        "upper" | "lower" | "strip" | "lstrip" | "rstrip" | "replace" | "join" | "title"
        | "capitalize" | "casefold" | "swapcase" | "center" | "ljust" | "rjust" | "zfill"
        | "format" | "expandtabs" | "translate" | "encode" | "decode" | "removeprefix"
        | "removesuffix" => NativeType::string(),
        "startswith" | "endswith" | "isdigit" | "isalpha" | "isalnum" | "isspace" | "isupper"
        | "islower" | "istitle" | "isnumeric" | "isdecimal" | "isidentifier" | "isprintable"
        | "isascii" => NativeType::Bool,
        "find" | "rfind" | "index" | "rindex" | "count" => NativeType::Int,
        "split" | "rsplit" | "splitlines" => NativeType::list(NativeType::string()),
        "partition" | "rpartition" => NativeType::Tuple(vec![NativeType::string(); 3]),
        _ => return None,
    };
    Some(ty)
}

fn dict_method(key: &NativeType, value: &NativeType, method: &str, args: &[NativeType]) -> Option<NativeType> {
    let ty = match method {
        "keys" => NativeType::list(key.clone()),
        "values" => NativeType::list(value.clone()),
        "items" => NativeType::list(NativeType::Tuple(vec![key.clone(), value.clone()])),
        "get" => match args.get(1) {
            Some(default) => widen(value, default),
            None => value.clone(),
        },
        "pop" | "setdefault" => value.clone(),
        "popitem" => NativeType::Tuple(vec![key.clone(), value.clone()]),
        "copy" => NativeType::dict(key.clone(), value.clone()),
        "update" | "clear" => NativeType::None,
        _ => return None,
    };
    Some(ty)
}

fn list_method(elem: &NativeType, method: &str) -> Option<NativeType> {
    let ty = match method {
        "pop" => elem.clone(),
        "index" | "count" => NativeType::Int,
        "copy" => NativeType::list(elem.clone()),
        "append" | "extend" | "insert" | "remove" | "clear" | "sort" | "reverse" => NativeType::None,
        _ => return None,
    };
    Some(ty)
}

fn set_method(receiver: &NativeType, elem: &NativeType, method: &str) -> Option<NativeType> {
    let ty = match method {
        "union" | "intersection" | "difference" | "symmetric_difference" | "copy" => receiver.clone(),
        "pop" => elem.clone(),
        "issubset" | "issuperset" | "isdisjoint" => NativeType::Bool,
        "add" | "discard" | "remove" | "update" | "clear" => NativeType::None,
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[NativeType]) -> NativeType {
        builtin_function(name).unwrap().apply(args, &[])
    }

    #[test]
    fn test_fixed_builtins() {
        assert_eq!(call("len", &[NativeType::string()]), NativeType::Int);
        assert_eq!(call("str", &[NativeType::Int]), NativeType::string());
        assert_eq!(call("isinstance", &[]), NativeType::Bool);
        assert!(builtin_function("no_such_builtin").is_none());
    }

    #[test]
    fn test_identity_and_extremum() {
        assert_eq!(call("abs", &[NativeType::Float]), NativeType::Float);
        assert_eq!(call("max", &[NativeType::Int, NativeType::Float]), NativeType::Float);
        assert_eq!(call("min", &[NativeType::list(NativeType::Int)]), NativeType::Int);
        assert_eq!(call("sum", &[NativeType::list(NativeType::Float)]), NativeType::Float);
        assert_eq!(call("sum", &[NativeType::Unknown]), NativeType::Int);
    }

    #[test]
    fn test_round_and_divmod() {
        assert_eq!(call("round", &[NativeType::Float]), NativeType::Int);
        assert_eq!(call("round", &[NativeType::Float, NativeType::Int]), NativeType::Float);
        assert_eq!(
            call("divmod", &[NativeType::Int, NativeType::Int]),
            NativeType::Tuple(vec![NativeType::Int, NativeType::Int])
        );
    }

    #[test]
    fn test_struct_format_codes() {
        assert_eq!(
            struct_format_types("<2if?"),
            NativeType::Tuple(vec![
                NativeType::Int,
                NativeType::Int,
                NativeType::Float,
                NativeType::Bool
            ])
        );
        assert_eq!(
            struct_format_types("!4sH"),
            NativeType::Tuple(vec![NativeType::string(), NativeType::Int])
        );
    }

    #[test]
    fn test_struct_format_huge_count_is_unknown() {
        assert_eq!(struct_format_types("100000000000000i"), NativeType::Unknown);
        assert_eq!(struct_format_types("99999999999999999999999d"), NativeType::Unknown);
        assert_eq!(struct_format_types("200i57q"), NativeType::Unknown);
        assert_eq!(
            struct_format_types("256B"),
            NativeType::Tuple(vec![NativeType::Int; MAX_STRUCT_FIELDS])
        );
    }

    #[test]
    fn test_string_methods() {
        let s = NativeType::literal_string();
        assert_eq!(builtin_method(&s, "upper", &[]), Some(NativeType::string()));
        assert_eq!(builtin_method(&s, "startswith", &[]), Some(NativeType::Bool));
        assert_eq!(builtin_method(&s, "find", &[]), Some(NativeType::Int));
        assert_eq!(
            builtin_method(&s, "split", &[]),
            Some(NativeType::list(NativeType::string()))
        );
        assert_eq!(builtin_method(&s, "frobnicate", &[]), None);
    }

    #[test]
    fn test_dict_methods() {
        let d = NativeType::dict(NativeType::string(), NativeType::Float);
        assert_eq!(
            builtin_method(&d, "items", &[]),
            Some(NativeType::list(NativeType::Tuple(vec![
                NativeType::string(),
                NativeType::Float
            ])))
        );
        assert_eq!(
            builtin_method(&d, "values", &[]),
            Some(NativeType::list(NativeType::Float))
        );
    }

    #[test]
    fn test_exception_names() {
        assert!(is_exception_name("ValueError"));
        assert!(is_exception_name("CustomParseError"));
        assert!(!is_exception_name("Point"));
    }
}
