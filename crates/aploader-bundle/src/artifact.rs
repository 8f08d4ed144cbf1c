//! Artifact kinds and the resource naming scheme.

use std::fmt;

/// The kinds of artifact a bundle carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// `libasyncProfiler`, the JVMTI agent library.
    NativeLibrary,
    /// `jattach`, the tool that loads agents into a running JVM.
    AttachTool,
    /// `profiler.sh` (or the `asprof` launcher).
    Launcher,
    /// The platform-neutral JFR converter jar.
    Converter,
}

impl ArtifactKind {
    /// Base name used both in the bundle and in the extraction directory.
    #[must_use]
    pub fn base_name(&self) -> &'static str {
        match self {
            Self::NativeLibrary => "libasyncProfiler",
            Self::AttachTool => "jattach",
            Self::Launcher => "profiler",
            Self::Converter => "converter",
        }
    }

    /// Whether the extracted file needs the executable bit.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::AttachTool | Self::Launcher)
    }

    #[must_use]
    pub fn is_platform_specific(&self) -> bool {
        !matches!(self, Self::Converter)
    }

    /// File name inside the extraction directory. Does not depend on the
    /// platform, so repeated runs on one host land on the same path.
    ///
    /// ```
    /// use aploader_bundle::ArtifactKind;
    ///
    /// assert_eq!(ArtifactKind::NativeLibrary.cache_file_name(Some("so")), "libasyncProfiler.so");
    /// assert_eq!(ArtifactKind::AttachTool.cache_file_name(None), "jattach");
    /// ```
    #[must_use]
    pub fn cache_file_name(&self, extension: Option<&str>) -> String {
        match extension {
            Some(ext) => format!("{}.{ext}", self.base_name()),
            None => self.base_name().to_string(),
        }
    }

    #[must_use]
    pub fn all() -> &'static [ArtifactKind] {
        &[
            Self::NativeLibrary,
            Self::AttachTool,
            Self::Launcher,
            Self::Converter,
        ]
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NativeLibrary => "native library",
            Self::AttachTool => "attach tool",
            Self::Launcher => "launcher",
            Self::Converter => "converter",
        };
        f.write_str(name)
    }
}

/// A resource name split into its parts.
///
/// `libasyncProfiler-3.0-linux-x64.so` parses to kind `NativeLibrary`,
/// version `3.0`, platform `linux-x64`, extension `so`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub kind: ArtifactKind,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub extension: Option<String>,
}

impl ArtifactName {
    /// Parse a resource file name; `None` for anything that is not an artifact.
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        if file_name == "converter.jar" {
            return Some(Self {
                kind: ArtifactKind::Converter,
                version: None,
                platform: None,
                extension: Some("jar".to_string()),
            });
        }

        let (kind, rest) = ArtifactKind::all().iter().find_map(|kind| {
            file_name
                .strip_prefix(kind.base_name())
                .and_then(|rest| rest.strip_prefix('-'))
                .map(|rest| (*kind, rest))
        })?;

        if kind == ArtifactKind::Converter {
            let version = rest.strip_suffix(".jar")?;
            return (!version.is_empty()).then(|| Self {
                kind,
                version: Some(version.to_string()),
                platform: None,
                extension: Some("jar".to_string()),
            });
        }

        let (version, platform) = rest.split_once('-')?;
        let (platform, extension) = match platform.rsplit_once('.') {
            Some((platform, ext)) => (platform, Some(ext.to_string())),
            None => (platform, None),
        };
        if version.is_empty() || platform.is_empty() {
            return None;
        }

        Some(Self {
            kind,
            version: Some(version.to_string()),
            platform: Some(platform.to_string()),
            extension,
        })
    }

    /// Render the name back; the inverse of [`ArtifactName::parse`].
    #[must_use]
    pub fn file_name(&self) -> String {
        let mut name = self.kind.base_name().to_string();
        if let Some(version) = &self.version {
            name.push('-');
            name.push_str(version);
        }
        if let Some(platform) = &self.platform {
            name.push('-');
            name.push_str(platform);
        }
        if let Some(ext) = &self.extension {
            name.push('.');
            name.push_str(ext);
        }
        name
    }
}
