//! Native type model
//!
//! The closed set of representations the code generator can emit for a
//! Python value:
//! - Primitives (`i64`, big integers, `usize`, `f64`, `bool`, strings)
//! - Composites (fixed arrays, growable lists, maps, sets, tuples)
//! - Callables (functions, named closures, type-erased callables)
//! - Nominal and special types (class instances, optionals, `None`,
//!   recognized library facilities, and [`NativeType::Unknown`])
//!
//! Element types are boxed so recursive shapes such as a list of lists have
//! a finite inline size.

mod annotation;
mod lattice;
mod render;

pub use annotation::parse_annotation;
pub use lattice::{numeric_promotion, widen, widen_all};

use serde::{Deserialize, Serialize};

/// Allocation strategy of a string value. Does not affect type identity
/// for widening purposes beyond the literal/runtime distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringKind {
    /// Compile-time literal, lives in static memory.
    Literal,
    /// Heap string produced at runtime.
    Runtime,
    /// Borrowed slice into another string.
    Slice,
}

/// Runtime facilities the code generator maps to fixed runtime types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LibraryType {
    File,
    HashObject,
    Path,
    Socket,
    DbConnection,
    DbCursor,
    DbRow,
    Exception(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeType {
    Int,
    BigInt,
    /// Pointer-sized unsigned integer used for indices and loop counters.
    Usize,
    Float,
    Bool,
    Str(StringKind),
    Array {
        elem: Box<NativeType>,
        len: usize,
    },
    List(Box<NativeType>),
    Dict {
        key: Box<NativeType>,
        value: Box<NativeType>,
    },
    Set(Box<NativeType>),
    Tuple(Vec<NativeType>),
    Function {
        params: Vec<NativeType>,
        ret: Box<NativeType>,
    },
    /// Nested function that captures enclosing variables, by qualified name.
    Closure(String),
    /// Type-erased callable for collections that mix function-like values.
    Callable,
    Instance(String),
    Optional(Box<NativeType>),
    None,
    Library(LibraryType),
    Unknown,
}

impl NativeType {
    pub fn string() -> Self {
        NativeType::Str(StringKind::Runtime)
    }

    pub fn literal_string() -> Self {
        NativeType::Str(StringKind::Literal)
    }

    pub fn slice_string() -> Self {
        NativeType::Str(StringKind::Slice)
    }

    pub fn list(elem: NativeType) -> Self {
        NativeType::List(Box::new(elem))
    }

    pub fn array(elem: NativeType, len: usize) -> Self {
        NativeType::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn dict(key: NativeType, value: NativeType) -> Self {
        NativeType::Dict {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn set(elem: NativeType) -> Self {
        NativeType::Set(Box::new(elem))
    }

    pub fn optional(inner: NativeType) -> Self {
        NativeType::Optional(Box::new(inner))
    }

    pub fn function(params: Vec<NativeType>, ret: NativeType) -> Self {
        NativeType::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn instance(class: impl Into<String>) -> Self {
        NativeType::Instance(class.into())
    }

    pub fn exception(name: impl Into<String>) -> Self {
        NativeType::Library(LibraryType::Exception(name.into()))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, NativeType::Unknown)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, NativeType::Str(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, NativeType::Int | NativeType::BigInt | NativeType::Usize)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, NativeType::Float)
    }

    pub fn is_function_like(&self) -> bool {
        matches!(
            self,
            NativeType::Function { .. } | NativeType::Closure(_) | NativeType::Callable
        )
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NativeType::Array { .. }
                | NativeType::List(_)
                | NativeType::Dict { .. }
                | NativeType::Set(_)
                | NativeType::Tuple(_)
        )
    }

    /// Same variant, ignoring payloads (and string kinds).
    pub fn same_tag(&self, other: &NativeType) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Type of one element produced by iterating over a value of this type.
    pub fn iter_element(&self) -> NativeType {
        match self {
            NativeType::List(elem) | NativeType::Set(elem) => (**elem).clone(),
            NativeType::Array { elem, .. } => (**elem).clone(),
            NativeType::Dict { key, .. } => (**key).clone(),
            NativeType::Tuple(elems) => widen_all(elems.iter()),
            NativeType::Str(_) => NativeType::slice_string(),
            NativeType::Library(LibraryType::File) => NativeType::string(),
            NativeType::Library(LibraryType::DbCursor) => NativeType::Library(LibraryType::DbRow),
            _ => NativeType::Unknown,
        }
    }

    /// The storage form of a value kept beyond the expression that made it:
    /// literal and slice strings become runtime strings, recursively.
    pub fn into_owned(self) -> NativeType {
        match self {
            NativeType::Str(_) => NativeType::string(),
            NativeType::Array { elem, len } => NativeType::array(elem.into_owned(), len),
            NativeType::List(elem) => NativeType::list(elem.into_owned()),
            NativeType::Set(elem) => NativeType::set(elem.into_owned()),
            NativeType::Dict { key, value } => NativeType::dict(key.into_owned(), value.into_owned()),
            NativeType::Tuple(elems) => NativeType::Tuple(elems.into_iter().map(NativeType::into_owned).collect()),
            NativeType::Optional(inner) => NativeType::optional(inner.into_owned()),
            other => other,
        }
    }

    /// Whether a generated function handling this type needs an allocator
    /// parameter. A closure names its function rather than carrying a
    /// return type, so it answers `true` here;
    /// [`TypeEnvironment::needs_allocator`](crate::env::TypeEnvironment::needs_allocator)
    /// resolves it through the return registry.
    pub fn needs_allocator(&self) -> bool {
        match self {
            NativeType::Str(_) | NativeType::BigInt | NativeType::Instance(_) => true,
            NativeType::Array { .. }
            | NativeType::List(_)
            | NativeType::Dict { .. }
            | NativeType::Set(_)
            | NativeType::Tuple(_) => true,
            NativeType::Function { ret, .. } => ret.needs_allocator(),
            NativeType::Optional(inner) => inner.needs_allocator(),
            NativeType::Closure(_) | NativeType::Callable | NativeType::Unknown => true,
            NativeType::Int
            | NativeType::Usize
            | NativeType::Float
            | NativeType::Bool
            | NativeType::None
            | NativeType::Library(_) => false,
        }
    }

    /// Whether constructing a value of this type can fail, so a generated
    /// function returning it must carry an error channel.
    pub fn is_error_union(&self) -> bool {
        match self {
            NativeType::Str(_) | NativeType::BigInt | NativeType::Instance(_) => true,
            NativeType::Array { .. }
            | NativeType::List(_)
            | NativeType::Dict { .. }
            | NativeType::Set(_)
            | NativeType::Tuple(_) => true,
            NativeType::Optional(inner) => inner.is_error_union(),
            NativeType::Unknown => true,
            _ => false,
        }
    }
}

impl Default for NativeType {
    fn default() -> Self {
        NativeType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_element_of_containers() {
        assert_eq!(NativeType::list(NativeType::Int).iter_element(), NativeType::Int);
        assert_eq!(
            NativeType::dict(NativeType::string(), NativeType::Float).iter_element(),
            NativeType::string()
        );
        assert_eq!(NativeType::literal_string().iter_element(), NativeType::slice_string());
        assert_eq!(
            NativeType::Tuple(vec![NativeType::Int, NativeType::Float]).iter_element(),
            NativeType::Float
        );
        assert_eq!(NativeType::Bool.iter_element(), NativeType::Unknown);
    }

    #[test]
    fn test_into_owned_converts_nested_strings() {
        let ty = NativeType::list(NativeType::Tuple(vec![NativeType::literal_string(), NativeType::Int]));
        assert_eq!(
            ty.into_owned(),
            NativeType::list(NativeType::Tuple(vec![NativeType::string(), NativeType::Int]))
        );
    }

    #[test]
    fn test_needs_allocator() {
        assert!(NativeType::string().needs_allocator());
        assert!(NativeType::list(NativeType::Int).needs_allocator());
        assert!(!NativeType::Int.needs_allocator());
        assert!(!NativeType::Float.needs_allocator());
        assert!(NativeType::function(vec![NativeType::Int], NativeType::string()).needs_allocator());
        assert!(!NativeType::function(vec![NativeType::string()], NativeType::Int).needs_allocator());
    }

    #[test]
    fn test_is_error_union() {
        assert!(NativeType::literal_string().is_error_union());
        assert!(NativeType::dict(NativeType::string(), NativeType::Int).is_error_union());
        assert!(!NativeType::Bool.is_error_union());
        assert!(!NativeType::Library(LibraryType::File).is_error_union());
        assert!(!NativeType::optional(NativeType::Int).is_error_union());
    }
}
