#![allow(non_snake_case)]

use super::*;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn LoaderConfig___default___uses_ap_loader_identity() {
    let config = LoaderConfig::default();

    assert_eq!(config.app_name, "ap-loader");
    assert_eq!(config.program_name, "ap-loader");
    assert!(config.bundle_path.is_none());
    assert!(config.extraction_dir.is_none());
    assert!(config.version.is_none());
}

#[test]
fn LoaderConfig___from_json___empty_input___returns_defaults() {
    let config = LoaderConfig::from_json(b"").unwrap();

    assert_eq!(config, LoaderConfig::default());
}

#[test]
fn LoaderConfig___from_json___invalid___returns_error() {
    assert!(LoaderConfig::from_json(b"{ not json }").is_err());
}

#[test]
fn LoaderConfig___from_lookup___reads_every_variable() {
    let config = LoaderConfig::from_lookup(lookup_from(&[
        ("AP_LOADER_BUNDLE", "/opt/ap-loader/ap-loader-all.zip"),
        ("AP_LOADER_EXTRACTION_DIR", "/var/cache/profiler"),
        ("AP_LOADER_VERSION", "2.9"),
        ("JAVA_HOME", "/usr/lib/jvm/java-21"),
    ]));

    assert_eq!(
        config.bundle_path,
        Some(PathBuf::from("/opt/ap-loader/ap-loader-all.zip"))
    );
    assert_eq!(config.extraction_dir, Some(PathBuf::from("/var/cache/profiler")));
    assert_eq!(config.version.as_deref(), Some("2.9"));
    assert_eq!(
        config.java_executable(),
        PathBuf::from("/usr/lib/jvm/java-21/bin/java")
    );
}

#[test]
fn LoaderConfig___from_lookup___empty_values___count_as_unset() {
    let config = LoaderConfig::from_lookup(lookup_from(&[
        ("AP_LOADER_EXTRACTION_DIR", ""),
        ("AP_LOADER_VERSION", "  "),
    ]));

    assert!(config.extraction_dir.is_none());
    assert!(config.version.is_none());
}

#[test]
fn LoaderConfig___extraction_directory___is_version_scoped() {
    let config = LoaderConfig::new().with_extraction_dir("/var/cache/profiler");

    assert_eq!(
        config.extraction_directory("3.0"),
        PathBuf::from("/var/cache/profiler/ap-loader-3.0")
    );
    assert_ne!(
        config.extraction_directory("3.0"),
        config.extraction_directory("2.9")
    );
}

#[test]
fn LoaderConfig___extraction_root___falls_back_without_override() {
    let config = LoaderConfig::default();

    let expected = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);

    assert_eq!(config.extraction_root(), expected);
}

#[test]
fn LoaderConfig___java_executable___defaults_to_path_lookup() {
    assert_eq!(LoaderConfig::default().java_executable(), PathBuf::from("java"));
}

#[test]
fn LoaderConfig___validate_extraction_root___missing_dir___is_ok() {
    let temp_dir = TempDir::new().unwrap();
    let config = LoaderConfig::new().with_extraction_dir(temp_dir.path().join("not-yet"));

    assert!(config.validate_extraction_root().is_ok());
}

#[test]
fn LoaderConfig___validate_extraction_root___writable_dir___is_ok() {
    let temp_dir = TempDir::new().unwrap();
    let config = LoaderConfig::new().with_extraction_dir(temp_dir.path());

    config.validate_extraction_root().unwrap();

    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn LoaderConfig___validate_extraction_root___regular_file___is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("cache");
    fs::write(&file, b"").unwrap();
    let config = LoaderConfig::new().with_extraction_dir(&file);

    let err = config.validate_extraction_root().unwrap_err();

    assert!(matches!(err, LoaderError::Config(ref msg) if msg.contains("not a directory")));
}

#[cfg(unix)]
#[test]
fn LoaderConfig___validate_extraction_root___read_only_dir___is_config_error() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("ro");
    fs::create_dir(&root).unwrap();
    fs::set_permissions(&root, fs::Permissions::from_mode(0o555)).unwrap();
    let config = LoaderConfig::new().with_extraction_dir(&root);

    let result = config.validate_extraction_root();
    fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();

    // root ignores permission bits
    if is_root() {
        return;
    }
    assert!(matches!(result, Err(LoaderError::Config(ref msg)) if msg.contains("not writable")));
}

#[cfg(unix)]
fn is_root() -> bool {
    std::process::Command::new("id")
        .arg("-u")
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "0")
        .unwrap_or(false)
}
