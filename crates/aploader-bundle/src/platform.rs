//! Platform detection and identification.

use crate::{BundleError, BundleResult};
use once_cell::sync::OnceCell;
use std::cmp::Ordering;
use std::fmt;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Operating system families async-profiler ships for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Macos,
}

impl Os {
    /// Parse a reported OS name (`linux`, `macos`, `Mac OS X`, `darwin`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s.contains("linux") {
            Some(Self::Linux)
        } else if s.starts_with("mac") || s == "darwin" {
            Some(Self::Macos)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
        }
    }
}

/// CPU architecture families, one canonical token per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    X86,
    Arm64,
    Arm32,
}

impl Arch {
    /// Normalize a reported architecture name to its family.
    ///
    /// ```
    /// use aploader_bundle::Arch;
    ///
    /// assert_eq!(Arch::parse("amd64"), Some(Arch::X64));
    /// assert_eq!(Arch::parse("aarch64"), Some(Arch::Arm64));
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Self::X64),
            "x86" | "i386" | "i486" | "i586" | "i686" => Some(Self::X86),
            "aarch64" | "arm64" => Some(Self::Arm64),
            "arm" | "arm32" | "armv7" | "armv7l" | "armhf" => Some(Self::Arm32),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
            Self::Arm64 => "arm64",
            Self::Arm32 => "arm32",
        }
    }
}

/// C library flavor. Only meaningful on Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Libc {
    Glibc,
    Musl,
    NotApplicable,
}

impl Libc {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Glibc => "glibc",
            Self::Musl => "musl",
            Self::NotApplicable => "n/a",
        }
    }
}

/// Canonical identifier of a host: OS family, architecture and libc flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    pub os: Os,
    pub arch: Arch,
    pub libc: Libc,
}

impl PlatformKey {
    #[must_use]
    pub const fn new(os: Os, arch: Arch, libc: Libc) -> Self {
        Self { os, arch, libc }
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())?;
        if self.libc == Libc::Musl {
            write!(f, "-musl")?;
        }
        Ok(())
    }
}

/// The host could not be mapped onto a bundled platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("async-profiler is not supported on os={os} arch={arch} libc={libc}: {reason}")]
pub struct Unsupported {
    pub os: String,
    pub arch: String,
    pub libc: String,
    pub reason: String,
}

/// Raw host introspection results, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Reported OS name.
    pub os: String,
    /// Reported architecture name.
    pub arch: String,
    /// Detected C library, `None` when the probe was inconclusive.
    pub libc: Option<Libc>,
}

static CURRENT_HOST: OnceCell<HostInfo> = OnceCell::new();

impl HostInfo {
    pub fn new(os: impl Into<String>, arch: impl Into<String>, libc: Option<Libc>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            libc,
        }
    }

    /// Introspect the running host, probing the C library on Linux.
    #[must_use]
    pub fn detect() -> Self {
        let os = std::env::consts::OS;
        let arch = std::env::consts::ARCH;
        let libc = if os == "linux" {
            probe_libc()
        } else {
            Some(Libc::NotApplicable)
        };
        debug!(os, arch, ?libc, "detected host");
        Self::new(os, arch, libc)
    }

    /// The running host, detected once per process.
    pub fn current() -> &'static HostInfo {
        CURRENT_HOST.get_or_init(Self::detect)
    }
}

/// Compute the canonical platform key for a host.
pub fn resolve(host: &HostInfo) -> Result<PlatformKey, Unsupported> {
    let unsupported = |reason: &str| Unsupported {
        os: host.os.clone(),
        arch: host.arch.clone(),
        libc: host
            .libc
            .map_or_else(|| "unknown".to_string(), |l| l.as_str().to_string()),
        reason: reason.to_string(),
    };

    let os = Os::parse(&host.os).ok_or_else(|| unsupported("unknown operating system"))?;
    let arch = Arch::parse(&host.arch).ok_or_else(|| unsupported("unknown architecture"))?;
    let libc = match os {
        Os::Linux => match host.libc {
            Some(libc @ (Libc::Glibc | Libc::Musl)) => libc,
            _ => return Err(unsupported("neither glibc nor musl could be detected")),
        },
        Os::Macos => Libc::NotApplicable,
    };

    Ok(PlatformKey::new(os, arch, libc))
}

/// Decide the C library from the probe outputs.
///
/// `getconf` is the output of `getconf GNU_LIBC_VERSION`, `ldd` the combined
/// output of `ldd --version`; `None` means the command could not be run.
#[must_use]
pub fn classify_libc(getconf: Option<&str>, ldd: Option<&str>) -> Option<Libc> {
    if getconf.is_some_and(|out| out.lines().any(|l| !l.trim().is_empty())) {
        return Some(Libc::Glibc);
    }
    if ldd.is_some_and(|out| out.contains("musl")) {
        return Some(Libc::Musl);
    }
    None
}

fn probe_libc() -> Option<Libc> {
    let getconf = Command::new("getconf")
        .arg("GNU_LIBC_VERSION")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).into_owned());
    if let Some(libc) = classify_libc(getconf.as_deref(), None) {
        return Some(libc);
    }

    // musl's ldd prints its banner on stderr and exits non-zero
    let ldd = Command::new("ldd").arg("--version").output().ok().map(|out| {
        let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&out.stderr));
        text
    });
    classify_libc(None, ldd.as_deref())
}

/// Bundled async-profiler version (`1.8.3`, `2.9`, `3.0`).
#[derive(Debug, Clone)]
pub struct BundleVersion {
    raw: String,
    parts: Vec<u64>,
}

impl BundleVersion {
    pub fn parse(s: &str) -> BundleResult<Self> {
        let raw = s.trim();
        let parts = raw
            .split('.')
            .map(|p| p.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| BundleError::InvalidVersion(s.to_string()))?;
        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn major(&self) -> u64 {
        self.parts.first().copied().unwrap_or(0)
    }
}

impl Ord for BundleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| {
                let a = self.parts.get(i).copied().unwrap_or(0);
                let b = other.parts.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for BundleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BundleVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for BundleVersion {}

impl fmt::Display for BundleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

const LINUX_X64: PlatformKey = PlatformKey::new(Os::Linux, Arch::X64, Libc::Glibc);
const LINUX_X64_MUSL: PlatformKey = PlatformKey::new(Os::Linux, Arch::X64, Libc::Musl);
const LINUX_X86: PlatformKey = PlatformKey::new(Os::Linux, Arch::X86, Libc::Glibc);
const LINUX_ARM64: PlatformKey = PlatformKey::new(Os::Linux, Arch::Arm64, Libc::Glibc);
const LINUX_ARM64_MUSL: PlatformKey = PlatformKey::new(Os::Linux, Arch::Arm64, Libc::Musl);
const LINUX_ARM32: PlatformKey = PlatformKey::new(Os::Linux, Arch::Arm32, Libc::Glibc);
const MACOS_X64: PlatformKey = PlatformKey::new(Os::Macos, Arch::X64, Libc::NotApplicable);
const MACOS_ARM64: PlatformKey = PlatformKey::new(Os::Macos, Arch::Arm64, Libc::NotApplicable);

/// 1.x releases: per-arch Linux builds, Intel-only macOS, no musl.
const LEGACY_MATRIX: &[(PlatformKey, &str)] = &[
    (LINUX_X64, "linux-x64"),
    (LINUX_X86, "linux-x86"),
    (LINUX_ARM64, "linux-aarch64"),
    (LINUX_ARM32, "linux-arm"),
    (MACOS_X64, "macos-x64"),
];

/// 2.x releases: musl build for x64, universal macOS binary.
const V2_MATRIX: &[(PlatformKey, &str)] = &[
    (LINUX_X64, "linux-x64"),
    (LINUX_X64_MUSL, "linux-x64-musl"),
    (LINUX_ARM64, "linux-aarch64"),
    (MACOS_X64, "macos"),
    (MACOS_ARM64, "macos"),
];

const V3_MATRIX: &[(PlatformKey, &str)] = &[
    (LINUX_X64, "linux-x64"),
    (LINUX_X64_MUSL, "linux-x64-musl"),
    (LINUX_ARM64, "linux-arm64"),
    (LINUX_ARM64_MUSL, "linux-arm64-musl"),
    (MACOS_X64, "macos"),
    (MACOS_ARM64, "macos"),
];

/// The set of platforms a given bundle version ships, and the platform
/// token each one uses in resource names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformMatrix {
    entries: &'static [(PlatformKey, &'static str)],
}

impl PlatformMatrix {
    #[must_use]
    pub fn for_version(version: &BundleVersion) -> Self {
        let entries = match version.major() {
            0 | 1 => LEGACY_MATRIX,
            2 => V2_MATRIX,
            _ => V3_MATRIX,
        };
        Self { entries }
    }

    /// Platform token used in resource names, `None` if not shipped.
    #[must_use]
    pub fn token(&self, key: &PlatformKey) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, token)| *token)
    }

    #[must_use]
    pub fn supported_keys(&self) -> Vec<PlatformKey> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }
}
