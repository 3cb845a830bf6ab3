use mathsheet::{ConfigError, MathsheetConfig};
use std::path::PathBuf;

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mathsheet-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_by_extension() {
    let yaml = temp_file("sheet.yaml", "font_size: 16\nlayout:\n  font_scale: 0.5\n");
    let config = MathsheetConfig::load(&yaml).unwrap();
    assert_eq!(config.font_size, 16.0);
    assert_eq!(config.layout.font_scale, 0.5);

    let json = temp_file("sheet.json", r#"{"significant_digits": 8}"#);
    let config = MathsheetConfig::load(&json).unwrap();
    assert_eq!(config.significant_digits, 8);
    assert_eq!(config.font_size, 12.0);
}

#[test]
fn test_unknown_extension_reads_yaml() {
    let path = temp_file("sheet.conf", "significant_digits: 6\n");
    assert_eq!(MathsheetConfig::load(&path).unwrap().significant_digits, 6);
}

#[test]
fn test_load_errors() {
    let missing = std::env::temp_dir().join("mathsheet-no-such-config.yaml");
    assert!(matches!(
        MathsheetConfig::load(&missing),
        Err(ConfigError::Io(_))
    ));
    let bad_json = temp_file("bad.json", "{ font_size: }");
    assert!(matches!(
        MathsheetConfig::load(&bad_json),
        Err(ConfigError::Json(_))
    ));
    let bad_yaml = temp_file("bad.yaml", "font_size: [1, 2");
    assert!(matches!(
        MathsheetConfig::load(&bad_yaml),
        Err(ConfigError::Yaml(_))
    ));
}
