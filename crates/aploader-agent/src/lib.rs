//! aploader-agent - JVMTI agent for the bundled async-profiler
//!
//! Load this library with `-agentpath:/path/to/libaploader_agent.so=<options>`
//! or attach it to a running JVM. It resolves the bundle through
//! `AP_LOADER_BUNDLE` (or next to the `java` executable), extracts the
//! native library for the host and hands the options to the entry point of
//! the same name.
//!
//! # Architecture
//!
//! 1. [`ProfilerLoader::global`] resolves and extracts `libasyncProfiler`
//! 2. The library is loaded once per process and kept loaded
//! 3. `Agent_OnLoad` and `Agent_OnAttach` forward to their counterparts in it
//!
//! No tracing subscriber is installed; the host JVM owns the process.
//! Failures are printed to stderr.

mod error;
mod forward;

use aploader::ProfilerLoader;
use error::AgentError;
use forward::{ForwardedAgent, Hook};
use jni::sys::{JNI_ERR, JNI_OK, JavaVM, jint};
use once_cell::sync::OnceCell;
use std::ffi::{CStr, c_char, c_void};

// Loaded on first use and never unloaded; the profiler keeps running
// threads inside the library.
static AGENT: OnceCell<ForwardedAgent> = OnceCell::new();

/// JVMTI entry point for `-agentpath` at JVM start-up.
#[unsafe(no_mangle)]
pub extern "system" fn Agent_OnLoad(
    vm: *mut JavaVM,
    options: *mut c_char,
    _reserved: *mut c_void,
) -> jint {
    // SAFETY: the JVM passes null or a NUL-terminated option string.
    let options = unsafe { forward::agent_options(options) };
    report(start(Hook::OnLoad, vm, options))
}

/// JVMTI entry point for dynamic attach.
#[unsafe(no_mangle)]
pub extern "system" fn Agent_OnAttach(
    vm: *mut JavaVM,
    options: *mut c_char,
    _reserved: *mut c_void,
) -> jint {
    // SAFETY: the JVM passes null or a NUL-terminated option string.
    let options = unsafe { forward::agent_options(options) };
    report(start(Hook::OnAttach, vm, options))
}

fn start(hook: Hook, vm: *mut JavaVM, options: &CStr) -> Result<(), AgentError> {
    let agent = AGENT.get_or_try_init(|| ForwardedAgent::load(ProfilerLoader::global()?))?;
    // SAFETY: vm is the pointer this agent's entry point received.
    unsafe { agent.start(hook, vm, options) }
}

fn report(result: Result<(), AgentError>) -> jint {
    match result {
        Ok(()) => JNI_OK,
        Err(e) => {
            eprintln!("[ap-loader] {e}");
            JNI_ERR
        }
    }
}
