//! Type inference core of the Zyth Python-to-native compiler.
//!
//! Given one Python compilation unit, this crate determines a native
//! representation for every variable, function return, class field and
//! expression, which the Zig code generator consumes. The entry points are
//! [`InferencePipeline`] for source text and [`pipeline::Pipeline`] for a
//! prebuilt [`hir::HirModule`].
//!
//! ```no_run
//! use zyth_core::infer_python;
//!
//! let env = infer_python("x = [1, 2, 3]\nx.append(4)\n").unwrap();
//! assert_eq!(env.get_var("x").unwrap().zig_type_name(), "std.ArrayList(i64)");
//! ```

pub mod analysis;
pub mod ast_bridge;
pub mod config;
pub mod env;
pub mod error;
pub mod hir;
pub mod infer;
pub mod pipeline;
pub mod types;

use anyhow::Result;
use rustpython_ast::Suite;
use rustpython_parser::Parse;
use tracing::{debug, instrument};

pub use ast_bridge::AstBridge;
pub use config::InferenceConfig;
pub use env::{ClassInfo, TypeEnvironment};
pub use error::ZythError;
pub use hir::HirModule;
pub use types::{parse_annotation, widen, NativeType};

/// Parse-then-infer driver for a single compilation unit.
#[derive(Debug, Clone, Default)]
pub struct InferencePipeline {
    config: InferenceConfig,
}

impl InferencePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn parse_to_hir(&self, source: &str) -> Result<HirModule> {
        let statements = Suite::parse(source, "<input>").map_err(|e| ZythError::parse(e.to_string()))?;
        Ok(AstBridge::new().python_to_hir(&statements))
    }

    #[instrument(skip_all, fields(bytes = source.len()))]
    pub fn analyze(&self, source: &str) -> Result<TypeEnvironment> {
        let module = self.parse_to_hir(source)?;
        debug!(statements = module.body.len(), "parsed compilation unit");
        Ok(self.analyze_module(&module))
    }

    pub fn analyze_module(&self, module: &HirModule) -> TypeEnvironment {
        pipeline::Pipeline::new(module, self.config.clone()).run()
    }
}

/// Infer types for `source` with the default configuration.
pub fn infer_python(source: &str) -> Result<TypeEnvironment> {
    InferencePipeline::new().analyze(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_is_reported() {
        let err = infer_python("def broken(:\n").unwrap_err();
        assert!(matches!(err.downcast_ref::<ZythError>(), Some(ZythError::Parse { .. })));
    }

    #[test]
    fn test_config_reaches_pipeline() {
        let pipeline = InferencePipeline::new().with_config(InferenceConfig::new().without_literal_arrays());
        let env = pipeline.analyze("xs = [1, 2]\n").unwrap();
        assert_eq!(env.get_var("xs"), Some(&NativeType::list(NativeType::Int)));
    }

    #[test]
    fn test_end_to_end_function_return() {
        let env = infer_python("def area(w: int, h: int):\n    return w * 2.5\n\nresult = area(2, 3)\n").unwrap();
        assert_eq!(env.function_return("area"), Some(&NativeType::Float));
        assert_eq!(env.get_var("result"), Some(&NativeType::Float));
    }
}
