//! Integration tests for the ap-loader binary.
//!
//! Every test writes its own directory bundle and extraction root, so runs
//! never touch the user's data directory.

#![allow(non_snake_case)]

use aploader_bundle::{BundleBuilder, BundleVersion, PlatformMatrix};
use assert_cmd::Command;
use predicates::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

const JATTACH_SCRIPT: &[u8] = b"#!/bin/sh\necho \"$@\"\n";
const LAUNCHER_SCRIPT: &[u8] = b"#!/bin/sh\necho \"Usage: $0 [action] [options] <pid>\"\n";

/// A 3.0 bundle with every artifact for every platform of the 3.x matrix.
fn write_full_bundle(root: &Path) {
    let version = BundleVersion::parse("3.0").unwrap();
    let matrix = PlatformMatrix::for_version(&version);
    let tokens: BTreeSet<_> = matrix
        .supported_keys()
        .iter()
        .filter_map(|key| matrix.token(key))
        .collect();

    let mut builder = BundleBuilder::new()
        .add_artifact("converter-3.0.jar", b"PK fake jar".to_vec())
        .unwrap();
    for token in tokens {
        builder = builder
            .add_artifact(&format!("libasyncProfiler-3.0-{token}.so"), b"not a library".to_vec())
            .unwrap()
            .add_artifact(&format!("jattach-3.0-{token}"), JATTACH_SCRIPT.to_vec())
            .unwrap()
            .add_artifact(&format!("profiler-3.0-{token}.sh"), LAUNCHER_SCRIPT.to_vec())
            .unwrap();
    }
    builder.write_to_directory(root).unwrap();
}

/// A 3.0 bundle without any native library: no platform is supported.
fn write_library_less_bundle(root: &Path) {
    BundleBuilder::new()
        .add_artifact("converter-3.0.jar", b"PK fake jar".to_vec())
        .unwrap()
        .add_artifact("jattach-3.0-linux-arm64-musl", JATTACH_SCRIPT.to_vec())
        .unwrap()
        .write_to_directory(root)
        .unwrap();
}

struct Fixture {
    bundle: TempDir,
    extraction: TempDir,
}

impl Fixture {
    fn new(write: fn(&Path)) -> Self {
        let bundle = TempDir::new().unwrap();
        write(bundle.path());
        Self {
            bundle,
            extraction: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ap-loader").unwrap();
        cmd.env_remove("AP_LOADER_VERSION")
            .env_remove("AP_LOADER_LOG")
            .arg("--bundle")
            .arg(self.bundle.path())
            .arg("--extraction-dir")
            .arg(self.extraction.path());
        cmd
    }

    fn extraction_directory(&self) -> std::path::PathBuf {
        self.extraction.path().join("ap-loader-3.0")
    }
}

#[test]
fn version___prints_bundled_version() {
    let fixture = Fixture::new(write_library_less_bundle);

    fixture
        .cmd()
        .arg("version")
        .assert()
        .success()
        .stdout("3.0\n");
}

#[test]
fn help___lists_commands() {
    let fixture = Fixture::new(write_library_less_bundle);

    fixture
        .cmd()
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("jattach").and(predicate::str::contains("supported")));
}

#[test]
fn supported___no_library_for_host___exits_1() {
    let fixture = Fixture::new(write_library_less_bundle);

    fixture.cmd().arg("supported").assert().code(1);
}

#[test]
fn jattach___unsupported_platform___names_command() {
    let fixture = Fixture::new(write_library_less_bundle);

    fixture
        .cmd()
        .args(["jattach", "1234", "threaddump"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("The jattach command is not supported"));
}

#[test]
fn agentpath___unsupported_platform___exits_1() {
    let fixture = Fixture::new(write_library_less_bundle);

    fixture
        .cmd()
        .arg("agentpath")
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("agentpath"));
}

#[test]
fn missing_bundle___fails() {
    let extraction = TempDir::new().unwrap();

    Command::cargo_bin("ap-loader")
        .unwrap()
        .args(["--bundle", "/nonexistent/ap-loader-all.zip", "--extraction-dir"])
        .arg(extraction.path())
        .arg("version")
        .assert()
        .failure();
}

#[test]
fn unknown_command___fails() {
    let fixture = Fixture::new(write_library_less_bundle);

    fixture.cmd().arg("frobnicate").assert().failure();
}

#[test]
fn clear___nothing_extracted___succeeds() {
    let fixture = Fixture::new(write_library_less_bundle);

    fixture.cmd().arg("clear").assert().success();
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn converter___runs_java_from_java_home() {
        let fixture = Fixture::new(write_library_less_bundle);
        let java_home = TempDir::new().unwrap();
        let java = java_home.path().join("bin/java");
        fs::create_dir_all(java.parent().unwrap()).unwrap();
        fs::write(&java, b"#!/bin/sh\necho \"$@\"\nexit 4\n").unwrap();
        fs::set_permissions(&java, fs::Permissions::from_mode(0o755)).unwrap();

        let jar = fixture.extraction_directory().join("converter.jar");
        fixture
            .cmd()
            .env("JAVA_HOME", java_home.path())
            .args(["converter", "--help"])
            .assert()
            .code(4)
            .stdout(format!("-jar {} --help\n", jar.display()));
    }
}

// The full bundle covers the 3.x matrix: Linux and macOS on x64 and arm64.
#[cfg(all(
    unix,
    any(target_os = "linux", target_os = "macos"),
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
mod supported_host {
    use super::*;

    #[test]
    fn supported___matching_bundle___exits_0() {
        let fixture = Fixture::new(write_full_bundle);

        fixture.cmd().arg("supported").assert().success();
    }

    #[test]
    fn jattachpath___prints_extracted_path() {
        let fixture = Fixture::new(write_full_bundle);
        let expected = fixture.extraction_directory().join("jattach");

        fixture
            .cmd()
            .arg("jattachpath")
            .assert()
            .success()
            .stdout(format!("{}\n", expected.display()));
        assert!(expected.is_file());
    }

    #[test]
    fn jattach___placeholder_library___is_rewritten() {
        let fixture = Fixture::new(write_full_bundle);
        let library = fixture.extraction_directory().join("libasyncProfiler.so");

        fixture
            .cmd()
            .args(["jattach", "1234", "load", "libasyncProfiler.so", "false", "start"])
            .assert()
            .success()
            .stdout(format!("1234 load {} true start\n", library.display()));
    }

    #[test]
    fn profiler___help_output___shows_command_not_cache_path() {
        let fixture = Fixture::new(write_full_bundle);

        fixture
            .cmd()
            .args(["profiler", "--help"])
            .assert()
            .success()
            .stdout("Usage: ap-loader profiler [action] [options] <pid>\n");
    }

    #[test]
    fn clear___removes_extracted_files() {
        let fixture = Fixture::new(write_full_bundle);
        fixture.cmd().arg("agentpath").assert().success();
        assert!(fixture.extraction_directory().exists());

        fixture.cmd().arg("clear").assert().success();

        assert!(!fixture.extraction_directory().exists());
    }
}
