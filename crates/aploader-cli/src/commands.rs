//! Command implementations.

use aploader::ProfilerLoader;
use std::process::ExitCode;

pub fn jattach(loader: &ProfilerLoader, args: &[String]) -> anyhow::Result<ExitCode> {
    if let Some(code) = require_supported(loader, "jattach") {
        return Ok(code);
    }
    match loader.execute_attach_interactive(args)? {}
}

pub fn profiler(loader: &ProfilerLoader, args: &[String]) -> anyhow::Result<ExitCode> {
    if let Some(code) = require_supported(loader, "profiler") {
        return Ok(code);
    }
    match loader.execute_profiler_interactive(args)? {}
}

pub fn agentpath(loader: &ProfilerLoader) -> anyhow::Result<ExitCode> {
    if let Some(code) = require_supported(loader, "agentpath") {
        return Ok(code);
    }
    println!("{}", loader.native_library_path()?.display());
    Ok(ExitCode::SUCCESS)
}

pub fn jattachpath(loader: &ProfilerLoader) -> anyhow::Result<ExitCode> {
    if let Some(code) = require_supported(loader, "jattachpath") {
        return Ok(code);
    }
    println!("{}", loader.attach_tool_path()?.display());
    Ok(ExitCode::SUCCESS)
}

/// Exit code 0 if the bundle has a profiler for this host, 1 otherwise.
pub fn supported(loader: &ProfilerLoader) -> ExitCode {
    if loader.is_supported() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

pub fn converter(loader: &ProfilerLoader, args: &[String]) -> anyhow::Result<ExitCode> {
    match loader.execute_converter_interactive(args)? {}
}

pub fn version(loader: &ProfilerLoader) -> anyhow::Result<ExitCode> {
    println!("{}", loader.version()?);
    Ok(ExitCode::SUCCESS)
}

pub fn clear(loader: &ProfilerLoader) -> anyhow::Result<ExitCode> {
    loader.clear()?;
    Ok(ExitCode::SUCCESS)
}

/// `Some(FAILURE)` after telling the user, if `command` needs a profiler the
/// bundle does not have for this host.
fn require_supported(loader: &ProfilerLoader, command: &str) -> Option<ExitCode> {
    if loader.is_supported() {
        return None;
    }
    eprintln!(
        "The {command} command is not supported on this OS and architecture, using this bundle"
    );
    Some(ExitCode::FAILURE)
}
