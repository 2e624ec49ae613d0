//! Standard-library surface
//!
//! Per-module dispatch tables for module-qualified calls (`math.sqrt`,
//! `np.zeros`, `hashlib.sha256`), module constants (`math.pi`), and methods
//! of the runtime facility types those calls return (files, hash objects,
//! paths, sockets, database handles).
//!
//! Tables are built once and keyed by FNV-hashed names. A module may carry a
//! default rule for functions it does not list, which is how `math` returns
//! float unless told otherwise.

use std::sync::LazyLock;

use fnv::FnvHashMap;

use super::builtins::ReturnRule;
use crate::types::{LibraryType, NativeType};

struct ModuleTable {
    default: Option<ReturnRule>,
    functions: FnvHashMap<&'static str, ReturnRule>,
}

impl ModuleTable {
    fn new() -> Self {
        Self {
            default: None,
            functions: FnvHashMap::default(),
        }
    }

    fn with_default(mut self, rule: ReturnRule) -> Self {
        self.default = Some(rule);
        self
    }

    fn fixed(mut self, names: &[&'static str], ty: NativeType) -> Self {
        for name in names {
            self.functions.insert(*name, ReturnRule::Fixed(ty.clone()));
        }
        self
    }

    fn rule(mut self, names: &[&'static str], rule: ReturnRule) -> Self {
        for name in names {
            self.functions.insert(*name, rule.clone());
        }
        self
    }

    fn lookup(&self, function: &str) -> Option<&ReturnRule> {
        self.functions.get(function).or(self.default.as_ref())
    }
}

fn float_array() -> NativeType {
    NativeType::list(NativeType::Float)
}

static MODULES: LazyLock<FnvHashMap<&'static str, ModuleTable>> = LazyLock::new(|| {
    use NativeType::{Bool, Float, Int};

    let string = NativeType::string;
    let mut m = FnvHashMap::default();

    m.insert(
        "math",
        ModuleTable::new()
            .with_default(ReturnRule::Fixed(Float))
            .fixed(
                &["floor", "ceil", "trunc", "factorial", "gcd", "lcm", "comb", "perm", "isqrt"],
                Int,
            )
            .fixed(&["isnan", "isinf", "isfinite", "isclose"], Bool),
    );
    m.insert(
        "random",
        ModuleTable::new()
            .fixed(&["random", "uniform", "gauss", "normalvariate", "triangular", "expovariate"], Float)
            .fixed(&["randint", "randrange", "getrandbits"], Int)
            .fixed(&["seed", "shuffle"], NativeType::None)
            .rule(&["choice"], ReturnRule::ElementOfArg)
            .rule(&["sample", "choices"], ReturnRule::ListOfArgElements),
    );
    m.insert(
        "json",
        ModuleTable::new()
            .fixed(&["dumps"], string())
            .fixed(&["dump"], NativeType::None)
            .fixed(&["loads", "load"], NativeType::Unknown),
    );
    m.insert(
        "hashlib",
        ModuleTable::new().fixed(
            &["md5", "sha1", "sha224", "sha256", "sha384", "sha512", "blake2b", "blake2s", "new"],
            NativeType::Library(LibraryType::HashObject),
        ),
    );
    m.insert(
        "struct",
        ModuleTable::new()
            .fixed(&["pack"], string())
            .fixed(&["calcsize"], Int)
            .rule(&["unpack", "unpack_from"], ReturnRule::StructUnpack),
    );
    m.insert(
        "pickle",
        ModuleTable::new()
            .fixed(&["dumps"], string())
            .fixed(&["dump"], NativeType::None)
            .fixed(&["loads", "load"], NativeType::Unknown),
    );
    m.insert(
        "socket",
        ModuleTable::new()
            .fixed(&["socket", "create_connection"], NativeType::Library(LibraryType::Socket))
            .fixed(&["gethostname", "gethostbyname", "getfqdn"], string()),
    );
    m.insert(
        "os",
        ModuleTable::new()
            .fixed(&["getcwd", "getenv", "getlogin"], string())
            .fixed(&["listdir"], NativeType::list(string()))
            .fixed(&["getpid", "getppid", "system", "cpu_count"], Int)
            .fixed(
                &["remove", "unlink", "mkdir", "makedirs", "rmdir", "chdir", "rename", "putenv"],
                NativeType::None,
            ),
    );
    m.insert(
        "os.path",
        ModuleTable::new()
            .fixed(&["exists", "isfile", "isdir", "isabs", "islink"], Bool)
            .fixed(
                &["join", "basename", "dirname", "abspath", "realpath", "normpath", "expanduser"],
                string(),
            )
            .fixed(&["getsize"], Int)
            .fixed(&["getmtime", "getatime", "getctime"], Float)
            .fixed(&["split", "splitext"], NativeType::Tuple(vec![string(), string()])),
    );
    m.insert(
        "time",
        ModuleTable::new()
            .fixed(&["time", "perf_counter", "monotonic", "process_time"], Float)
            .fixed(&["time_ns", "perf_counter_ns", "monotonic_ns"], Int)
            .fixed(&["sleep"], NativeType::None)
            .fixed(&["strftime", "ctime", "asctime"], string()),
    );
    m.insert(
        "numpy",
        ModuleTable::new()
            .fixed(
                &[
                    "array", "asarray", "zeros", "ones", "empty", "full", "arange", "linspace",
                    "zeros_like", "ones_like", "sqrt", "exp", "log", "log2", "log10", "sin",
                    "cos", "tan", "abs", "absolute", "square", "power", "add", "subtract",
                    "multiply", "divide", "maximum", "minimum", "clip", "sort", "cumsum",
                    "cumprod", "concatenate", "reshape", "transpose", "matmul", "outer",
                    "where", "unique", "flip", "round",
                ],
                float_array(),
            )
            .fixed(
                &[
                    "sum", "mean", "std", "var", "median", "min", "max", "amin", "amax", "dot",
                    "prod", "average", "percentile", "trace",
                ],
                Float,
            )
            .fixed(&["argmax", "argmin", "count_nonzero", "size", "ndim"], Int)
            .fixed(&["array_equal", "allclose", "any", "all", "isclose"], Bool),
    );
    m.insert(
        "numpy.linalg",
        ModuleTable::new()
            .fixed(&["norm", "det", "matrix_rank", "cond"], Float)
            .fixed(&["inv", "pinv", "solve", "eigvals"], float_array()),
    );
    m.insert(
        "numpy.random",
        ModuleTable::new()
            .fixed(&["rand", "randn", "random", "uniform", "normal"], float_array())
            .fixed(&["randint"], NativeType::list(Int))
            .fixed(&["seed"], NativeType::None),
    );
    m.insert(
        "sqlite3",
        ModuleTable::new().fixed(&["connect"], NativeType::Library(LibraryType::DbConnection)),
    );
    m.insert(
        "pathlib",
        ModuleTable::new().fixed(&["Path", "PurePath"], NativeType::Library(LibraryType::Path)),
    );
    m.insert(
        "re",
        ModuleTable::new()
            .fixed(&["sub", "escape"], string())
            .fixed(&["findall", "split"], NativeType::list(string()))
            .fixed(&["match", "search", "fullmatch", "compile", "finditer"], NativeType::Unknown),
    );
    m.insert(
        "zlib",
        ModuleTable::new()
            .fixed(&["compress", "decompress"], string())
            .fixed(&["crc32", "adler32"], Int),
    );
    m.insert(
        "base64",
        ModuleTable::new().with_default(ReturnRule::Fixed(string())),
    );
    m.insert(
        "sys",
        ModuleTable::new()
            .fixed(&["exit"], NativeType::None)
            .fixed(&["getsizeof", "getrecursionlimit"], Int),
    );
    m.insert(
        "statistics",
        ModuleTable::new()
            .with_default(ReturnRule::Fixed(Float))
            .rule(&["mode"], ReturnRule::ElementOfArg),
    );
    m.insert(
        "copy",
        ModuleTable::new().rule(&["copy", "deepcopy"], ReturnRule::SameAsArg),
    );
    m
});

static CONSTANTS: LazyLock<FnvHashMap<&'static str, NativeType>> = LazyLock::new(|| {
    let mut m = FnvHashMap::default();
    for name in ["math.pi", "math.e", "math.tau", "math.inf", "math.nan", "numpy.pi", "numpy.e"] {
        m.insert(name, NativeType::Float);
    }
    for name in [
        "sys.maxsize",
        "socket.AF_INET",
        "socket.AF_INET6",
        "socket.SOCK_STREAM",
        "socket.SOCK_DGRAM",
        "socket.SOL_SOCKET",
        "socket.SO_REUSEADDR",
    ] {
        m.insert(name, NativeType::Int);
    }
    for name in [
        "string.ascii_letters",
        "string.ascii_lowercase",
        "string.ascii_uppercase",
        "string.digits",
        "string.hexdigits",
        "string.punctuation",
        "string.whitespace",
    ] {
        m.insert(name, NativeType::literal_string());
    }
    for name in ["os.sep", "os.name", "os.linesep", "sys.platform", "sys.version"] {
        m.insert(name, NativeType::string());
    }
    m.insert("sys.argv", NativeType::list(NativeType::string()));
    m.insert("sys.path", NativeType::list(NativeType::string()));
    m.insert("os.environ", NativeType::dict(NativeType::string(), NativeType::string()));
    m
});

/// Whether `module` is a module with a dispatch table.
pub fn is_known_module(module: &str) -> bool {
    MODULES.contains_key(module)
}

/// Return rule for `module.function`, with `module` fully qualified.
pub fn module_function(module: &str, function: &str) -> Option<&'static ReturnRule> {
    MODULES.get(module)?.lookup(function)
}

/// Type of a module-level constant such as `math.pi`.
pub fn module_constant(qualified: &str) -> Option<NativeType> {
    CONSTANTS.get(qualified).cloned()
}

/// Result of calling `method` on a runtime facility value.
pub fn library_method(lib: &LibraryType, method: &str) -> Option<NativeType> {
    use NativeType::{Bool, Int};

    let string = NativeType::string;
    let ty = match (lib, method) {
        (LibraryType::File, "read" | "readline") => string(),
        (LibraryType::File, "readlines") => NativeType::list(string()),
        (LibraryType::File, "write" | "tell" | "seek" | "fileno") => Int,
        (LibraryType::File, "close" | "flush" | "writelines") => NativeType::None,
        (LibraryType::File, "__enter__") => NativeType::Library(LibraryType::File),

        (LibraryType::HashObject, "hexdigest" | "digest") => string(),
        (LibraryType::HashObject, "update") => NativeType::None,
        (LibraryType::HashObject, "copy") => NativeType::Library(LibraryType::HashObject),

        (LibraryType::Path, "exists" | "is_file" | "is_dir" | "is_absolute") => Bool,
        (LibraryType::Path, "read_text" | "read_bytes" | "as_posix") => string(),
        (LibraryType::Path, "write_text" | "write_bytes") => Int,
        (LibraryType::Path, "mkdir" | "unlink" | "touch" | "rmdir") => NativeType::None,
        (LibraryType::Path, "joinpath" | "resolve" | "absolute" | "with_suffix" | "with_name") => {
            NativeType::Library(LibraryType::Path)
        }
        (LibraryType::Path, "iterdir" | "glob" | "rglob") => {
            NativeType::list(NativeType::Library(LibraryType::Path))
        }
        (LibraryType::Path, "open") => NativeType::Library(LibraryType::File),

        (LibraryType::Socket, "recv") => string(),
        (LibraryType::Socket, "send" | "sendall" | "fileno") => Int,
        (LibraryType::Socket, "accept") => NativeType::Tuple(vec![
            NativeType::Library(LibraryType::Socket),
            NativeType::Tuple(vec![string(), Int]),
        ]),
        (LibraryType::Socket, "connect" | "bind" | "listen" | "close" | "settimeout" | "setsockopt") => {
            NativeType::None
        }

        (LibraryType::DbConnection, "cursor" | "execute") => NativeType::Library(LibraryType::DbCursor),
        (LibraryType::DbConnection, "commit" | "close" | "rollback") => NativeType::None,
        (LibraryType::DbCursor, "execute" | "executemany") => NativeType::Library(LibraryType::DbCursor),
        (LibraryType::DbCursor, "fetchone") => NativeType::Library(LibraryType::DbRow),
        (LibraryType::DbCursor, "fetchall" | "fetchmany") => {
            NativeType::list(NativeType::Library(LibraryType::DbRow))
        }
        (LibraryType::DbCursor, "close") => NativeType::None,

        (LibraryType::Exception(_), "with_traceback") => NativeType::Library(lib.clone()),
        _ => return None,
    };
    Some(ty)
}

/// Attribute of a runtime facility value.
pub fn library_attribute(lib: &LibraryType, attr: &str) -> Option<NativeType> {
    let ty = match (lib, attr) {
        (LibraryType::File, "name" | "mode") => NativeType::string(),
        (LibraryType::File, "closed") => NativeType::Bool,
        (LibraryType::Path, "name" | "stem" | "suffix") => NativeType::string(),
        (LibraryType::Path, "parent") => NativeType::Library(LibraryType::Path),
        (LibraryType::Path, "parts") => NativeType::list(NativeType::string()),
        (LibraryType::HashObject, "name") => NativeType::string(),
        (LibraryType::HashObject, "digest_size" | "block_size") => NativeType::Int,
        (LibraryType::DbCursor, "rowcount" | "lastrowid") => NativeType::Int,
        (LibraryType::Exception(_), "args") => NativeType::list(NativeType::Unknown),
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(module: &str, function: &str) -> Option<NativeType> {
        module_function(module, function).map(|rule| rule.apply(&[], &[]))
    }

    #[test]
    fn test_math_defaults_to_float() {
        assert_eq!(call("math", "sqrt"), Some(NativeType::Float));
        assert_eq!(call("math", "hypot"), Some(NativeType::Float));
        assert_eq!(call("math", "floor"), Some(NativeType::Int));
        assert_eq!(call("math", "isnan"), Some(NativeType::Bool));
    }

    #[test]
    fn test_modules_without_default_miss() {
        assert_eq!(call("json", "dumps"), Some(NativeType::string()));
        assert_eq!(call("json", "nope"), None);
        assert_eq!(call("nosuchmodule", "f"), None);
    }

    #[test]
    fn test_numpy_tables() {
        assert_eq!(call("numpy", "zeros"), Some(NativeType::list(NativeType::Float)));
        assert_eq!(call("numpy", "mean"), Some(NativeType::Float));
        assert_eq!(call("numpy", "argmax"), Some(NativeType::Int));
        assert_eq!(call("numpy.linalg", "norm"), Some(NativeType::Float));
    }

    #[test]
    fn test_hash_objects() {
        assert_eq!(
            call("hashlib", "sha256"),
            Some(NativeType::Library(LibraryType::HashObject))
        );
        assert_eq!(
            library_method(&LibraryType::HashObject, "hexdigest"),
            Some(NativeType::string())
        );
    }

    #[test]
    fn test_constants() {
        assert_eq!(module_constant("math.pi"), Some(NativeType::Float));
        assert_eq!(module_constant("string.digits"), Some(NativeType::literal_string()));
        assert_eq!(module_constant("math.unknown"), None);
    }

    #[test]
    fn test_database_handles() {
        assert_eq!(
            library_method(&LibraryType::DbConnection, "cursor"),
            Some(NativeType::Library(LibraryType::DbCursor))
        );
        assert_eq!(
            library_method(&LibraryType::DbCursor, "fetchall"),
            Some(NativeType::list(NativeType::Library(LibraryType::DbRow)))
        );
    }
}
