//! Tala Android toolchain CLI
//!
//! Build-time commands for the Android target; the build orchestrator
//! invokes these with the module list it resolved.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tala")]
#[command(about = "Tala Android toolchain", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the native bridge: scan modules for Java peers and emit the
    /// bridges module, JNI trampoline IR, and Java stubs
    Bridgen {
        /// Compiled .tlm modules to scan, in dependency order
        modules: Vec<PathBuf>,
        /// Output directory for the generated bridges module
        #[arg(long)]
        module_out: PathBuf,
        /// Root directory for generated Java sources
        #[arg(long)]
        java_out: PathBuf,
        /// Root directory for generated LLVM IR files
        #[arg(long)]
        ir_out: PathBuf,
        /// Write the updated module list for the linking step (JSON)
        #[arg(long)]
        module_list: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Bridgen {
            modules,
            module_out,
            java_out,
            ir_out,
            module_list,
        } => commands::bridgen::execute(modules, module_out, java_out, ir_out, module_list),
    }
}
