//! Loading inference configuration from TOML and its effect on analysis

use std::io::Write;

use tempfile::NamedTempFile;
use zyth_core::{InferenceConfig, InferencePipeline, NativeType};

#[test]
fn test_config_file_overrides_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "infer_return_types = false").unwrap();
    writeln!(file, "literal_arrays = false").unwrap();

    let config = InferenceConfig::from_path(file.path()).unwrap();
    assert!(!config.infer_return_types);
    assert!(!config.literal_arrays);
    assert!(config.use_annotations, "unlisted keys keep their defaults");
    assert!(config.promote_mutated_arrays);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = InferenceConfig::from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn test_ignoring_annotations() {
    let python_code = r#"
def label(n: int) -> str:
    return n
"#;
    let trusting = InferencePipeline::new().analyze(python_code).unwrap();
    assert_eq!(trusting.function_return("label"), Some(&NativeType::string()));

    let config = InferenceConfig::from_toml_str("use_annotations = false").unwrap();
    let skeptical = InferencePipeline::new()
        .with_config(config)
        .analyze(python_code)
        .unwrap();
    assert_eq!(skeptical.get_scoped_var(Some("label"), "n"), Some(&NativeType::Unknown));
    assert_eq!(skeptical.function_return("label"), Some(&NativeType::Unknown));
}

#[test]
fn test_return_inference_disabled() {
    let config = InferenceConfig::new().without_return_inference();
    let env = InferencePipeline::new()
        .with_config(config)
        .analyze("def one():\n    return 1\n")
        .unwrap();

    assert!(
        env.function_return("one").map_or(true, NativeType::is_unknown),
        "unannotated returns stay unknown\nGot: {:?}",
        env.function_return("one")
    );
}

#[test]
fn test_array_promotion_disabled_keeps_unmutated_arrays() {
    let config = InferenceConfig::new().without_array_promotion();
    let env = InferencePipeline::new()
        .with_config(config)
        .analyze("grid = [0, 0, 0]\n")
        .unwrap();

    assert_eq!(env.get_var("grid"), Some(&NativeType::array(NativeType::Int, 3)));
}

#[test]
fn test_array_promotion_disabled_keeps_appended_arrays() {
    let config = InferenceConfig::new().without_array_promotion();
    let env = InferencePipeline::new()
        .with_config(config)
        .analyze("grid = [0, 0, 0]\ngrid.append(1)\n")
        .unwrap();

    assert_eq!(env.get_var("grid"), Some(&NativeType::array(NativeType::Int, 3)));
}
