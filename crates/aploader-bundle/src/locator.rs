//! Mapping a platform key and artifact kind onto an index entry.

use crate::{
    ArtifactKind, ArtifactName, BundleVersion, PlatformKey, PlatformMatrix, ResourceEntry,
    ResourceIndex, Unsupported,
};

/// Outcome of a lookup. "Not there" is an ordinary answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The bundle carries the artifact.
    Found(ResourceEntry),
    /// The platform is in the version's matrix, but this bundle lacks the file.
    NotFound { expected: String },
    /// The bundle version does not ship this platform at all.
    Unsupported(Unsupported),
}

impl Lookup {
    #[must_use]
    pub fn found(self) -> Option<ResourceEntry> {
        match self {
            Self::Found(entry) => Some(entry),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Looks artifacts up in an index for one bundle version.
#[derive(Debug, Clone, Copy)]
pub struct Locator<'a> {
    index: &'a ResourceIndex,
    version: &'a BundleVersion,
    matrix: PlatformMatrix,
}

impl<'a> Locator<'a> {
    #[must_use]
    pub fn new(index: &'a ResourceIndex, version: &'a BundleVersion) -> Self {
        Self {
            index,
            version,
            matrix: PlatformMatrix::for_version(version),
        }
    }

    /// Find `kind` for `key`.
    ///
    /// Names are matched exactly on kind, version and platform token. When
    /// merged bundles list the same name twice the first one wins; copies of
    /// one version are identical.
    #[must_use]
    pub fn locate(&self, kind: ArtifactKind, key: &PlatformKey) -> Lookup {
        if !kind.is_platform_specific() {
            return self.locate_neutral(kind);
        }

        let Some(token) = self.matrix.token(key) else {
            return Lookup::Unsupported(Unsupported {
                os: key.os.as_str().to_string(),
                arch: key.arch.as_str().to_string(),
                libc: key.libc.as_str().to_string(),
                reason: format!("async-profiler {} is not built for {key}", self.version),
            });
        };

        let wanted = ArtifactName {
            kind,
            version: Some(self.version.to_string()),
            platform: Some(token.to_string()),
            extension: None,
        };
        self.index
            .entries()
            .iter()
            .find(|entry| {
                entry.name.kind == wanted.kind
                    && entry.name.version == wanted.version
                    && entry.name.platform == wanted.platform
            })
            .cloned()
            .map_or_else(
                || Lookup::NotFound {
                    expected: expected_name(&wanted, kind),
                },
                Lookup::Found,
            )
    }

    /// Find a platform-neutral artifact such as the converter, preferring
    /// the versioned name over the legacy unversioned one.
    #[must_use]
    pub fn locate_neutral(&self, kind: ArtifactKind) -> Lookup {
        let version = self.version.to_string();
        let of_kind = || self.index.entries().iter().filter(move |e| e.kind() == kind);

        of_kind()
            .find(|e| e.name.version.as_deref() == Some(version.as_str()))
            .or_else(|| of_kind().find(|e| e.name.version.is_none()))
            .cloned()
            .map_or_else(
                || Lookup::NotFound {
                    expected: format!("{}-{version}.jar", kind.base_name()),
                },
                Lookup::Found,
            )
    }
}

fn expected_name(wanted: &ArtifactName, kind: ArtifactKind) -> String {
    let suffix = match kind {
        ArtifactKind::NativeLibrary => ".so",
        ArtifactKind::Launcher => ".sh",
        _ => "",
    };
    format!("{}{suffix}", wanted.file_name())
}
