//! `tala bridgen`: compile the native bridge artifacts.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tala_bridgen::{BridgenOptions, Diagnostics};

pub fn execute(
    modules: Vec<PathBuf>,
    module_out: PathBuf,
    java_out: PathBuf,
    ir_out: PathBuf,
    module_list: Option<PathBuf>,
) -> anyhow::Result<()> {
    if modules.is_empty() {
        bail!("no input modules given");
    }

    let options = BridgenOptions {
        module_paths: modules,
        module_out,
        java_out,
        ir_out,
    };
    let output = tala_bridgen::run(&options).context("bridge compilation failed")?;

    print_diagnostics(&output.diagnostics);

    match &output.bridges_module {
        Some(path) => println!(
            "Bridged {} peers -> {} ({} java, {} ir)",
            output.peer_count,
            path.display(),
            output.java_files.len(),
            output.ir_files.len()
        ),
        None => println!("No Java peers found; nothing generated"),
    }

    if let Some(list_path) = module_list {
        let json = serde_json::to_string_pretty(&output.updated_modules)?;
        std::fs::write(&list_path, json)
            .with_context(|| format!("writing module list {}", list_path.display()))?;
        println!("Module list written to {}", list_path.display());
    }

    Ok(())
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{diagnostic}");
    }
}
