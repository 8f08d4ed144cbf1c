//! Argument and output rewriting around the bundled tools.

use crate::LoaderResult;
use aploader_bundle::ArtifactKind;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable giving the launcher the attach tool path
pub const ATTACH_TOOL_ENV: &str = "JATTACH";

/// Environment variable giving the launcher the native library path
pub const NATIVE_LIBRARY_ENV: &str = "PROFILER";

/// Conventional names callers use for an artifact whose real path they do
/// not know.
const PLACEHOLDERS: &[(&str, ArtifactKind)] = &[
    ("libasyncProfiler.so", ArtifactKind::NativeLibrary),
    ("libasyncProfiler.dylib", ArtifactKind::NativeLibrary),
    ("asyncProfiler", ArtifactKind::NativeLibrary),
];

/// Substitutes placeholder artifact names in attach tool arguments.
///
/// For `[pid, "load", <placeholder>, <absolute>, ...]` the placeholder
/// becomes the extracted path and the absolute-path flag becomes `"true"`.
/// Only arguments equal to a placeholder are touched.
#[derive(Debug, Clone)]
pub struct ArgumentRewriter {
    placeholders: Vec<(String, ArtifactKind)>,
}

impl Default for ArgumentRewriter {
    fn default() -> Self {
        Self {
            placeholders: PLACEHOLDERS
                .iter()
                .map(|(name, kind)| ((*name).to_string(), *kind))
                .collect(),
        }
    }
}

impl ArgumentRewriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a placeholder name for `kind`.
    #[must_use]
    pub fn with_placeholder(mut self, name: impl Into<String>, kind: ArtifactKind) -> Self {
        self.placeholders.push((name.into(), kind));
        self
    }

    /// The artifact an argument stands for, if it is a placeholder.
    #[must_use]
    pub fn placeholder_kind(&self, arg: &str) -> Option<ArtifactKind> {
        self.placeholders
            .iter()
            .find(|(name, _)| name == arg)
            .map(|(_, kind)| *kind)
    }

    /// Rewrite attach arguments, resolving the placeholder through `resolve`.
    ///
    /// `resolve` is only called when a substitution is needed, so arguments
    /// that name a real path never trigger an extraction. A missing
    /// absolute-path flag is appended.
    pub fn rewrite_attach<F>(&self, args: &[String], resolve: F) -> LoaderResult<Vec<String>>
    where
        F: FnOnce(ArtifactKind) -> LoaderResult<PathBuf>,
    {
        let kind = match args {
            [_, verb, library, ..] if verb == "load" => self.placeholder_kind(library),
            _ => None,
        };
        let Some(kind) = kind else {
            return Ok(args.to_vec());
        };

        let mut rewritten = args.to_vec();
        rewritten[2] = resolve(kind)?.to_string_lossy().into_owned();
        match rewritten.get_mut(3) {
            Some(absolute) => *absolute = "true".to_string(),
            None => rewritten.push("true".to_string()),
        }
        Ok(rewritten)
    }
}

/// Environment for the launcher script, so it can find the extracted tools.
#[must_use]
pub fn launcher_environment(attach_tool: &Path, native_library: &Path) -> Vec<(String, OsString)> {
    vec![
        (ATTACH_TOOL_ENV.to_string(), attach_tool.as_os_str().to_owned()),
        (NATIVE_LIBRARY_ENV.to_string(), native_library.as_os_str().to_owned()),
    ]
}

/// Replaces the cached launcher path in launcher output with the command a
/// user would type, e.g. `ap-loader profiler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRewriter {
    launcher: String,
    replacement: String,
}

impl OutputRewriter {
    pub fn new(launcher: &Path, program_name: &str) -> Self {
        Self {
            launcher: launcher.to_string_lossy().into_owned(),
            replacement: format!("{program_name} profiler"),
        }
    }

    #[must_use]
    pub fn rewrite(&self, text: &str) -> String {
        if self.launcher.is_empty() {
            return text.to_string();
        }
        text.replace(&self.launcher, &self.replacement)
    }
}

#[cfg(test)]
#[path = "rewrite/rewrite_tests.rs"]
mod rewrite_tests;
