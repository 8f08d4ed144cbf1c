//! ap-loader CLI - Run the async-profiler bundled for this platform
//!
//! Commands:
//! - `ap-loader jattach` - Run the included jattach binary
//! - `ap-loader profiler` - Run the included profiler launcher
//! - `ap-loader agentpath` / `jattachpath` - Print extracted paths
//! - `ap-loader supported` - Exit with 1 if this platform has no profiler
//! - `ap-loader converter` - Run the included converter jar
//! - `ap-loader version` - Print the bundled async-profiler version
//! - `ap-loader clear` - Delete extracted files

use aploader::{LoaderConfig, ProfilerLoader};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "ap-loader")]
#[command(author, version, about = "Run the async-profiler bundled for this platform", long_about = None)]
struct Cli {
    /// Bundle archive or directory (default: searched next to this executable)
    #[arg(long, global = true, env = "AP_LOADER_BUNDLE")]
    bundle: Option<PathBuf>,

    /// Root directory for extracted files
    #[arg(long, global = true, env = "AP_LOADER_EXTRACTION_DIR")]
    extraction_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the included jattach binary
    #[command(disable_help_flag = true)]
    Jattach {
        /// Arguments passed to jattach
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run the included profiler launcher
    #[command(disable_help_flag = true)]
    Profiler {
        /// Arguments passed to the launcher
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the path of the extracted native library, for -agentpath
    Agentpath,

    /// Print the path of the extracted jattach binary
    Jattachpath,

    /// Fail if the bundle has no profiler for the current OS and architecture
    Supported,

    /// Run the included converter jar
    #[command(disable_help_flag = true)]
    Converter {
        /// Arguments passed to the converter
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the version of the included async-profiler
    Version,

    /// Clear the directory used for storing extracted files
    Clear,
}

fn main() -> anyhow::Result<ExitCode> {
    logging::init();
    let cli = Cli::parse();

    let mut config = LoaderConfig::from_env().with_program_name(program_name());
    if let Some(bundle) = cli.bundle {
        config = config.with_bundle_path(bundle);
    }
    if let Some(dir) = cli.extraction_dir {
        config = config.with_extraction_dir(dir);
    }
    debug!(?config, "starting");
    let loader = ProfilerLoader::from_config(config)?;

    match cli.command {
        Commands::Jattach { args } => commands::jattach(&loader, &args),
        Commands::Profiler { args } => commands::profiler(&loader, &args),
        Commands::Agentpath => commands::agentpath(&loader),
        Commands::Jattachpath => commands::jattachpath(&loader),
        Commands::Supported => Ok(commands::supported(&loader)),
        Commands::Converter { args } => commands::converter(&loader, &args),
        Commands::Version => commands::version(&loader),
        Commands::Clear => commands::clear(&loader),
    }
}

/// How the user invoked us, shown in place of cache paths.
fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ap-loader".to_string())
}
