//! Parsing of source-level type annotation strings (`list[int]`,
//! `Optional[str]`, `dict[str, float]`, `int | None`, class names).

use super::{LibraryType, NativeType};

/// Map an annotation string to the native type it denotes.
///
/// Unrecognized lowercase names map to `Unknown`; capitalized names that are
/// not a known typing construct are taken to be user classes.
pub fn parse_annotation(annotation: &str) -> NativeType {
    let text = annotation.trim().trim_matches(|c| c == '"' || c == '\'');
    if text.is_empty() {
        return NativeType::Unknown;
    }

    let unions = split_top_level(text, '|');
    if unions.len() > 1 {
        return parse_union(&unions);
    }

    let (head, args) = match text.find('[') {
        Some(open) if text.ends_with(']') => {
            let inner = &text[open + 1..text.len() - 1];
            (text[..open].trim(), split_top_level(inner, ','))
        }
        _ => (text, Vec::new()),
    };
    let head = head.strip_prefix("typing.").unwrap_or(head);
    let arg = |i: usize| {
        args.get(i)
            .map(|a| parse_annotation(a))
            .unwrap_or(NativeType::Unknown)
    };

    match head {
        "int" => NativeType::Int,
        "float" => NativeType::Float,
        "bool" => NativeType::Bool,
        "str" | "bytes" => NativeType::string(),
        "None" | "NoneType" => NativeType::None,
        "list" | "List" | "Sequence" | "Iterable" | "Iterator" => NativeType::list(arg(0)),
        "dict" | "Dict" | "Mapping" => NativeType::dict(arg(0), arg(1)),
        "set" | "Set" | "frozenset" | "FrozenSet" => NativeType::set(arg(0)),
        "tuple" | "Tuple" => {
            let elems: Vec<NativeType> = args
                .iter()
                .filter(|a| a.trim() != "...")
                .map(|a| parse_annotation(a))
                .collect();
            if args.iter().any(|a| a.trim() == "...") {
                NativeType::list(elems.into_iter().next().unwrap_or_default())
            } else {
                NativeType::Tuple(elems)
            }
        }
        "Optional" => NativeType::optional(arg(0)),
        "Union" => parse_union(&args),
        "Callable" => match args.as_slice() {
            [params, ret] => {
                let params = params.trim().trim_start_matches('[').trim_end_matches(']');
                let params = split_top_level(params, ',')
                    .iter()
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| parse_annotation(p))
                    .collect();
                NativeType::function(params, parse_annotation(ret))
            }
            _ => NativeType::Callable,
        },
        "Path" | "pathlib.Path" => NativeType::Library(LibraryType::Path),
        "Any" | "object" => NativeType::Unknown,
        name if is_class_name(name) => NativeType::instance(name),
        _ => NativeType::Unknown,
    }
}

fn parse_union(members: &[&str]) -> NativeType {
    let mut has_none = false;
    let mut concrete = Vec::new();
    for member in members {
        match parse_annotation(member) {
            NativeType::None => has_none = true,
            ty => concrete.push(ty),
        }
    }
    let merged = super::widen_all(concrete.iter());
    if has_none {
        NativeType::optional(merged)
    } else {
        merged
    }
}

fn is_class_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Split on `sep` at bracket depth zero.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}
