//! The `ProfilerLoader` façade.

use crate::delegate::{self, ExecutionResult, Invocation};
use crate::rewrite::{self, ArgumentRewriter, OutputRewriter};
use crate::{ExtractionCache, LoaderConfig, LoaderError, LoaderResult};
use aploader_bundle::{
    ArtifactKind, BundleVersion, HostInfo, Locator, Lookup, PlatformKey, ResourceIndex,
    ResourceProvider, Unsupported, open_bundle, resolve,
};
use libloading::Library;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// File name of a bundle archive searched next to the executable
pub const BUNDLE_FILE_NAME: &str = "ap-loader-all.zip";

static GLOBAL_LOADER: OnceCell<ProfilerLoader> = OnceCell::new();

/// Facade state.
///
/// ```text
/// Unconfigured ──first use──▶ Configured(Session)
///      ▲                            │
///      └── clear / set_version / ───┘
///          set_extraction_root
/// ```
#[derive(Debug)]
enum State {
    Unconfigured,
    Configured(Session),
}

/// Everything derived from the configuration and the bundle. Dropped as a
/// whole on reset, so no handle can outlive the directory it points into.
#[derive(Debug)]
struct Session {
    index: ResourceIndex,
    version: BundleVersion,
    platform: Result<PlatformKey, Unsupported>,
    cache: ExtractionCache,
    handles: HashMap<ArtifactKind, PathBuf>,
}

#[derive(Debug)]
struct Inner {
    config: LoaderConfig,
    state: State,
}

/// Resolves, extracts and runs the async-profiler artifacts of one bundle.
///
/// # Example
///
/// ```no_run
/// use aploader::{LoaderConfig, ProfilerLoader};
///
/// let loader = ProfilerLoader::from_config(LoaderConfig::from_env())?;
/// if loader.is_supported() {
///     println!("{}", loader.native_library_path()?.display());
/// }
/// # Ok::<(), aploader::LoaderError>(())
/// ```
pub struct ProfilerLoader {
    provider: Arc<dyn ResourceProvider>,
    host: HostInfo,
    rewriter: ArgumentRewriter,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ProfilerLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilerLoader")
            .field("provider", &self.provider)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl ProfilerLoader {
    /// The process-wide loader, configured from the environment on first use.
    pub fn global() -> LoaderResult<&'static ProfilerLoader> {
        GLOBAL_LOADER.get_or_try_init(|| Self::from_config(LoaderConfig::from_env()))
    }

    pub fn new(provider: Arc<dyn ResourceProvider>, config: LoaderConfig) -> Self {
        Self {
            provider,
            host: HostInfo::current().clone(),
            rewriter: ArgumentRewriter::default(),
            inner: Mutex::new(Inner {
                config,
                state: State::Unconfigured,
            }),
        }
    }

    /// Open the bundle the configuration names, or the one found next to the
    /// running executable.
    pub fn from_config(config: LoaderConfig) -> LoaderResult<Self> {
        let bundle_path = match &config.bundle_path {
            Some(path) => path.clone(),
            None => discover_bundle()?,
        };
        debug!(path = %bundle_path.display(), "opening bundle");
        let provider = open_bundle(&bundle_path)?;
        Ok(Self::new(provider, config))
    }

    /// Resolve against `host` instead of the running machine.
    #[must_use]
    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = host;
        self.inner.get_mut().state = State::Unconfigured;
        self
    }

    #[must_use]
    pub fn with_rewriter(mut self, rewriter: ArgumentRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> LoaderConfig {
        self.inner.lock().config.clone()
    }

    /// The async-profiler version in use.
    pub fn version(&self) -> LoaderResult<String> {
        self.with_session(|session| Ok(session.version.to_string()))
    }

    /// Pin a version; everything derived so far is discarded.
    pub fn set_version(&self, version: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.config.version = Some(version.into());
        inner.state = State::Unconfigured;
    }

    /// The platform key of the host.
    pub fn platform(&self) -> LoaderResult<PlatformKey> {
        self.with_session(|session| session.platform.clone().map_err(LoaderError::from))
    }

    /// The version-scoped extraction directory.
    pub fn extraction_directory(&self) -> LoaderResult<PathBuf> {
        self.with_session(|session| Ok(session.cache.directory().to_path_buf()))
    }

    /// Move extraction under another root; everything derived so far is
    /// discarded. The root is checked on the next extraction.
    pub fn set_extraction_root(&self, root: impl Into<PathBuf>) {
        let mut inner = self.inner.lock();
        inner.config.extraction_dir = Some(root.into());
        inner.state = State::Unconfigured;
    }

    /// Whether the bundle has a native library for this host. Never fails.
    pub fn is_supported(&self) -> bool {
        self.with_session(|session| {
            Ok(match &session.platform {
                Ok(key) => session.locator().locate(ArtifactKind::NativeLibrary, key).is_found(),
                Err(_) => false,
            })
        })
        .unwrap_or(false)
    }

    pub fn native_library_path(&self) -> LoaderResult<PathBuf> {
        self.artifact_path(ArtifactKind::NativeLibrary)
    }

    pub fn attach_tool_path(&self) -> LoaderResult<PathBuf> {
        self.artifact_path(ArtifactKind::AttachTool)
    }

    pub fn launcher_path(&self) -> LoaderResult<PathBuf> {
        self.artifact_path(ArtifactKind::Launcher)
    }

    pub fn converter_path(&self) -> LoaderResult<PathBuf> {
        self.artifact_path(ArtifactKind::Converter)
    }

    /// Path of the extracted artifact, extracting it on first request.
    ///
    /// The lock is held across lookup and extraction, so concurrent callers
    /// get one extraction and the same path.
    pub fn artifact_path(&self, kind: ArtifactKind) -> LoaderResult<PathBuf> {
        let mut inner = self.inner.lock();
        let Inner { config, state } = &mut *inner;
        let session = Self::session(config, state, self.provider.as_ref(), &self.host)?;

        if let Some(path) = session.handles.get(&kind) {
            return Ok(path.clone());
        }

        let entry = match session.lookup(kind) {
            Lookup::Found(entry) => entry,
            Lookup::Unsupported(reason) => return Err(reason.into()),
            Lookup::NotFound { expected } => return Err(session.not_found(kind, expected)),
        };
        config.validate_extraction_root()?;
        let path = session.cache.materialize(self.provider.as_ref(), &entry)?;
        session.handles.insert(kind, path.clone());
        Ok(path)
    }

    /// Load the native library into this process.
    ///
    /// Fails with [`LoaderError::LibraryLoad`] naming the extraction
    /// directory, the usual culprit being a `noexec` mount.
    pub fn load(&self) -> LoaderResult<LoadedProfiler> {
        let path = self.native_library_path()?;
        // SAFETY: the library is async-profiler from our own bundle; its
        // initializers only register the JVMTI agent entry points.
        let library = unsafe { Library::new(&path) }.map_err(|e| LoaderError::LibraryLoad {
            extraction_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            path: path.clone(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), "loaded async-profiler");
        Ok(LoadedProfiler { library, path })
    }

    /// Run the attach tool, capturing its output.
    pub fn execute_attach(&self, args: &[String]) -> LoaderResult<ExecutionResult> {
        delegate::run_captured(&self.attach_invocation(args)?)
    }

    /// Run the attach tool on the terminal and exit with its code.
    pub fn execute_attach_interactive(&self, args: &[String]) -> LoaderResult<Infallible> {
        delegate::run_interactive(&self.attach_invocation(args)?)
    }

    /// Run the launcher script, capturing its output with the cached
    /// launcher path replaced by [`host_reference`](Self::host_reference).
    pub fn execute_profiler(&self, args: &[String]) -> LoaderResult<ExecutionResult> {
        let (invocation, output_rewriter) = self.launcher_invocation(args)?;
        let mut output = delegate::capture(&invocation)?;
        output.stdout = output_rewriter.rewrite(&output.stdout);
        output.stderr = output_rewriter.rewrite(&output.stderr);
        output.into_result(&invocation.tool)
    }

    /// Like [`execute_profiler`](Self::execute_profiler), but echoes the
    /// rewritten output and exits with the launcher's code.
    pub fn execute_profiler_interactive(&self, args: &[String]) -> LoaderResult<Infallible> {
        let (invocation, output_rewriter) = self.launcher_invocation(args)?;
        let output = delegate::capture(&invocation)?;

        let mut stdout = std::io::stdout().lock();
        let mut stderr = std::io::stderr().lock();
        // nothing useful to do if the terminal is gone
        let _ = stdout.write_all(output_rewriter.rewrite(&output.stdout).as_bytes());
        let _ = stdout.flush();
        let _ = stderr.write_all(output_rewriter.rewrite(&output.stderr).as_bytes());
        let _ = stderr.flush();
        std::process::exit(output.code)
    }

    /// Run the JFR converter with `java -jar`, capturing its output.
    pub fn execute_converter(&self, args: &[String]) -> LoaderResult<ExecutionResult> {
        delegate::run_captured(&self.converter_invocation(args)?)
    }

    /// Run the JFR converter on the terminal and exit with its code.
    pub fn execute_converter_interactive(&self, args: &[String]) -> LoaderResult<Infallible> {
        delegate::run_interactive(&self.converter_invocation(args)?)
    }

    /// Attach the profiler to this very process.
    ///
    /// Equivalent to `jattach <own pid> load <library> true <options>`.
    pub fn attach(&self, options: &str) -> LoaderResult<ExecutionResult> {
        let library = self.native_library_path()?;
        let mut invocation = Invocation::new("jattach", self.attach_tool_path()?)
            .arg(std::process::id().to_string())
            .arg("load")
            .arg(library.to_string_lossy())
            .arg("true");
        if !options.is_empty() {
            invocation = invocation.arg(options);
        }
        delegate::run_captured(&invocation)
    }

    /// Delete the extraction directory and forget every extracted path.
    ///
    /// Nothing is deleted if the bundle cannot name a version, since no
    /// extraction directory can have been derived from it.
    pub fn clear(&self) -> LoaderResult<()> {
        let mut inner = self.inner.lock();
        let Inner { config, state } = &mut *inner;
        let result = match Self::session(config, state, self.provider.as_ref(), &self.host) {
            Ok(session) => session.cache.clear(),
            Err(e) => {
                debug!(error = %e, "nothing to clear");
                Ok(())
            }
        };
        *state = State::Unconfigured;
        result
    }

    /// The command name shown in place of internal paths.
    pub fn host_reference(&self) -> String {
        self.inner.lock().config.program_name.clone()
    }

    fn attach_invocation(&self, args: &[String]) -> LoaderResult<Invocation> {
        let program = self.attach_tool_path()?;
        let args = self
            .rewriter
            .rewrite_attach(args, |kind| self.artifact_path(kind))?;
        Ok(Invocation::new("jattach", program).args(args))
    }

    fn launcher_invocation(&self, args: &[String]) -> LoaderResult<(Invocation, OutputRewriter)> {
        let launcher = self.launcher_path()?;
        let attach_tool = self.attach_tool_path()?;
        let library = self.native_library_path()?;

        let mut invocation = Invocation::new("profiler", &launcher).args(args.iter().cloned());
        invocation
            .env
            .extend(rewrite::launcher_environment(&attach_tool, &library));
        let output_rewriter = OutputRewriter::new(&launcher, &self.host_reference());
        Ok((invocation, output_rewriter))
    }

    fn converter_invocation(&self, args: &[String]) -> LoaderResult<Invocation> {
        let converter = self.converter_path()?;
        let java = self.inner.lock().config.java_executable();
        Ok(Invocation::new("converter", java)
            .arg("-jar")
            .arg(converter.to_string_lossy())
            .args(args.iter().cloned()))
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> LoaderResult<T>) -> LoaderResult<T> {
        let mut inner = self.inner.lock();
        let Inner { config, state } = &mut *inner;
        f(Self::session(config, state, self.provider.as_ref(), &self.host)?)
    }

    /// Move to Configured if needed and return the session.
    fn session<'a>(
        config: &LoaderConfig,
        state: &'a mut State,
        provider: &dyn ResourceProvider,
        host: &HostInfo,
    ) -> LoaderResult<&'a mut Session> {
        if let State::Unconfigured = state {
            *state = State::Configured(Session::configure(config, provider, host)?);
        }
        match state {
            State::Configured(session) => Ok(session),
            State::Unconfigured => Err(LoaderError::Config("loader is not configured".into())),
        }
    }
}

impl Session {
    fn configure(
        config: &LoaderConfig,
        provider: &dyn ResourceProvider,
        host: &HostInfo,
    ) -> LoaderResult<Self> {
        let index = ResourceIndex::load(provider)?;
        // A pin names the bundled version; it never picks one out of several.
        let version = index.version()?;
        if let Some(pinned) = &config.version
            && *pinned != version
        {
            return Err(LoaderError::Config(format!(
                "bundle does not contain async-profiler {pinned} (bundled: {version})"
            )));
        }
        let version = BundleVersion::parse(&version)?;
        let platform = resolve(host);
        let cache = ExtractionCache::new(config.extraction_directory(version.as_str()));

        debug!(
            %version,
            platform = ?platform.as_ref().map(ToString::to_string),
            dir = %cache.directory().display(),
            "configured loader"
        );
        Ok(Self {
            index,
            version,
            platform,
            cache,
            handles: HashMap::new(),
        })
    }

    fn locator(&self) -> Locator<'_> {
        Locator::new(&self.index, &self.version)
    }

    fn lookup(&self, kind: ArtifactKind) -> Lookup {
        if !kind.is_platform_specific() {
            return self.locator().locate_neutral(kind);
        }
        match &self.platform {
            Ok(key) => self.locator().locate(kind, key),
            Err(unsupported) => Lookup::Unsupported(unsupported.clone()),
        }
    }

    fn not_found(&self, kind: ArtifactKind, expected: String) -> LoaderError {
        if !kind.is_platform_specific() {
            return LoaderError::ArtifactMissing { name: expected };
        }
        let (os, arch, libc) = match &self.platform {
            Ok(key) => (
                key.os.as_str().to_string(),
                key.arch.as_str().to_string(),
                key.libc.as_str().to_string(),
            ),
            Err(u) => (u.os.clone(), u.arch.clone(), u.libc.clone()),
        };
        LoaderError::UnsupportedPlatform {
            os,
            arch,
            libc,
            reason: format!("bundle has no {kind} {expected}"),
        }
    }
}

/// The native library loaded into this process.
///
/// Dropping it unloads the library; keep it alive while the profiler runs.
#[derive(Debug)]
pub struct LoadedProfiler {
    library: Library,
    path: PathBuf,
}

impl LoadedProfiler {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn library(&self) -> &Library {
        &self.library
    }
}

/// Look for a bundle next to the running executable: a `ap-loader-all.zip`
/// archive, or a directory containing `libs/index`.
fn discover_bundle() -> LoaderResult<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| {
        LoaderError::Config(format!("cannot locate the running executable: {e}"))
    })?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));

    let candidates = [
        dir.join(BUNDLE_FILE_NAME),
        dir.to_path_buf(),
        dir.join("..").join("share").join("ap-loader"),
    ];
    candidates
        .into_iter()
        .find(|candidate| {
            candidate.is_file() || candidate.join(aploader_bundle::INDEX_FILE).is_file()
        })
        .ok_or_else(|| {
            LoaderError::Config(format!(
                "no bundle found next to {}; set {}",
                exe.display(),
                crate::config::BUNDLE_ENV
            ))
        })
}
