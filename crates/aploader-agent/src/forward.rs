//! Hand-over to the entry points of the bundled native library.

use crate::error::AgentError;
use aploader::{LoadedProfiler, ProfilerLoader};
use jni::sys::{JNI_OK, JavaVM, jint};
use libloading::Symbol;
use std::ffi::{CStr, c_char, c_void};
use tracing::debug;

type AgentEntryFn =
    unsafe extern "system" fn(vm: *mut JavaVM, options: *mut c_char, reserved: *mut c_void) -> jint;

/// The JVMTI hook the JVM called on this agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// `-agentpath` at start-up, before the VM is live.
    OnLoad,
    /// Dynamic attach to a running VM.
    OnAttach,
}

impl Hook {
    pub fn name(self) -> &'static str {
        match self {
            Hook::OnLoad => "Agent_OnLoad",
            Hook::OnAttach => "Agent_OnAttach",
        }
    }

    fn symbol(self) -> &'static [u8] {
        match self {
            Hook::OnLoad => b"Agent_OnLoad\0",
            Hook::OnAttach => b"Agent_OnAttach\0",
        }
    }
}

/// Both JVMTI entry points of the bundled library.
#[derive(Clone, Copy)]
struct EntryPoints {
    on_load: AgentEntryFn,
    on_attach: AgentEntryFn,
}

impl EntryPoints {
    fn get(&self, hook: Hook) -> AgentEntryFn {
        match hook {
            Hook::OnLoad => self.on_load,
            Hook::OnAttach => self.on_attach,
        }
    }
}

/// The loaded async-profiler library and its JVMTI entry points.
pub struct ForwardedAgent {
    /// Keeps the library mapped for as long as the entry points may be called.
    profiler: LoadedProfiler,
    entries: EntryPoints,
}

impl ForwardedAgent {
    /// Extract and load the bundled library through `loader`.
    pub fn load(loader: &ProfilerLoader) -> Result<Self, AgentError> {
        let profiler = loader.load()?;
        let entries = EntryPoints {
            on_load: resolve(&profiler, Hook::OnLoad)?,
            on_attach: resolve(&profiler, Hook::OnAttach)?,
        };

        debug!(library = %profiler.path().display(), "resolved bundled agent");
        Ok(Self { profiler, entries })
    }

    /// Start profiling in `vm` with `options` through the bundled library's
    /// entry point for `hook`.
    ///
    /// # Safety
    ///
    /// `vm` must be the pointer the JVM passed to this agent's own entry
    /// point for `hook`.
    pub unsafe fn start(
        &self,
        hook: Hook,
        vm: *mut JavaVM,
        options: &CStr,
    ) -> Result<(), AgentError> {
        debug!(library = %self.profiler.path().display(), "forwarding to {}", hook.name());
        // SAFETY: the entry points live in self.profiler, which is still
        // loaded; vm is forwarded as received.
        unsafe { forward(self.entries.get(hook), vm, options) }
    }
}

fn resolve(profiler: &LoadedProfiler, hook: Hook) -> Result<AgentEntryFn, AgentError> {
    // SAFETY: async-profiler exports both JVMTI hooks with the signature
    // declared by AgentEntryFn.
    let symbol: Symbol<AgentEntryFn> =
        unsafe { profiler.library().get(hook.symbol()) }.map_err(|e| {
            AgentError::SymbolNotFound {
                library: profiler.path().display().to_string(),
                symbol: format!("{}: {e}", hook.name()),
            }
        })?;
    Ok(*symbol)
}

/// Call `entry` with a writable copy of `options` and a null reserved pointer.
///
/// # Safety
///
/// `entry` must be callable with `vm`.
unsafe fn forward(entry: AgentEntryFn, vm: *mut JavaVM, options: &CStr) -> Result<(), AgentError> {
    let mut options = options_buffer(options);
    // SAFETY: options is NUL-terminated and outlives the call.
    let status = unsafe { entry(vm, options.as_mut_ptr().cast(), std::ptr::null_mut()) };
    if status == JNI_OK {
        Ok(())
    } else {
        Err(AgentError::AgentFailed(status))
    }
}

/// A writable NUL-terminated copy, as the JVMTI signature takes `char *`.
fn options_buffer(options: &CStr) -> Vec<u8> {
    options.to_bytes_with_nul().to_vec()
}

/// Options passed by the JVM; a null pointer means no options.
///
/// # Safety
///
/// `options` must be null or point to a NUL-terminated string that stays
/// valid for `'a`.
pub unsafe fn agent_options<'a>(options: *const c_char) -> &'a CStr {
    if options.is_null() {
        c""
    } else {
        // SAFETY: non-null and NUL-terminated per the caller's contract.
        unsafe { CStr::from_ptr(options) }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use jni::sys::JNI_ERR;
    use std::ffi::CString;

    extern "system" fn on_load_entry(_: *mut JavaVM, _: *mut c_char, _: *mut c_void) -> jint {
        1
    }

    extern "system" fn on_attach_entry(_: *mut JavaVM, _: *mut c_char, _: *mut c_void) -> jint {
        2
    }

    extern "system" fn expects_start(_: *mut JavaVM, options: *mut c_char, _: *mut c_void) -> jint {
        // SAFETY: forward passes a NUL-terminated buffer.
        let options = unsafe { CStr::from_ptr(options) };
        if options.to_bytes() == b"start,event=cpu" {
            JNI_OK
        } else {
            JNI_ERR
        }
    }

    fn entries() -> EntryPoints {
        EntryPoints {
            on_load: on_load_entry,
            on_attach: on_attach_entry,
        }
    }

    #[test]
    fn Hook___symbol___matches_name() {
        for hook in [Hook::OnLoad, Hook::OnAttach] {
            let symbol = hook.symbol();
            assert_eq!(symbol.last(), Some(&0));
            assert_eq!(&symbol[..symbol.len() - 1], hook.name().as_bytes());
        }
    }

    #[test]
    fn forward___on_load___calls_bundled_on_load() {
        // SAFETY: the test entries ignore vm.
        let result = unsafe { forward(entries().get(Hook::OnLoad), std::ptr::null_mut(), c"") };

        assert!(matches!(result, Err(AgentError::AgentFailed(1))));
    }

    #[test]
    fn forward___on_attach___calls_bundled_on_attach() {
        // SAFETY: the test entries ignore vm.
        let result = unsafe { forward(entries().get(Hook::OnAttach), std::ptr::null_mut(), c"") };

        assert!(matches!(result, Err(AgentError::AgentFailed(2))));
    }

    #[test]
    fn forward___jni_ok___passes_options() {
        // SAFETY: expects_start ignores vm.
        let result = unsafe { forward(expects_start, std::ptr::null_mut(), c"start,event=cpu") };

        assert!(result.is_ok());
    }

    #[test]
    fn agent_options___null___is_empty() {
        // SAFETY: null is explicitly allowed.
        let options = unsafe { agent_options(std::ptr::null()) };

        assert_eq!(options.to_bytes(), b"");
    }

    #[test]
    fn agent_options___string___is_borrowed() {
        let raw = CString::new("start,event=cpu,file=profile.html").unwrap();

        // SAFETY: raw outlives the borrow.
        let options = unsafe { agent_options(raw.as_ptr()) };

        assert_eq!(options.to_str().unwrap(), "start,event=cpu,file=profile.html");
    }

    #[test]
    fn options_buffer___keeps_terminator() {
        assert_eq!(options_buffer(c"start"), b"start\0");
        assert_eq!(options_buffer(c""), b"\0");
    }
}
