//! The bridge compilation pipeline
//!
//! Scan → resolve → three generators, writing to disjoint outputs. A
//! per-module scan failure skips that module; only the bridges-module
//! write is fatal, since no partial binary artifact is usable.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::diagnostics::Diagnostics;
use crate::emit;
use crate::error::{BridgenError, BridgenResult};
use crate::names;
use crate::resolve;
use crate::scanner;

/// Inputs to one bridge compilation.
#[derive(Debug, Clone)]
pub struct BridgenOptions {
    /// Ordered paths to the compiled modules to scan
    pub module_paths: Vec<PathBuf>,
    /// Directory receiving the generated bridges module
    pub module_out: PathBuf,
    /// Root of the generated Java tree
    pub java_out: PathBuf,
    /// Root of the generated IR files
    pub ir_out: PathBuf,
}

/// How the downstream linking step should treat a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyDisposition {
    /// An input module, already in place
    Existing,
    /// Copy when newer than the destination
    PreserveNewest,
}

/// One entry of the updated module list handed to the linker.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleArtifact {
    pub path: PathBuf,
    pub copy: CopyDisposition,
    /// The module still needs the post-processing passes
    pub postprocess: bool,
}

/// Everything a bridge compilation produced.
#[derive(Debug)]
pub struct BridgenOutput {
    /// Path of the generated bridges module, absent when no peers were
    /// found
    pub bridges_module: Option<PathBuf>,
    pub java_files: Vec<PathBuf>,
    pub ir_files: Vec<PathBuf>,
    /// Input modules plus the generated one, tagged for the linker
    pub updated_modules: Vec<ModuleArtifact>,
    pub diagnostics: Diagnostics,
    pub peer_count: usize,
}

/// Run a full bridge compilation.
pub fn run(options: &BridgenOptions) -> BridgenResult<BridgenOutput> {
    let mut diagnostics = Diagnostics::new();

    let mut catalog = scanner::scan_modules(&options.module_paths, &mut diagnostics);
    info!("scanned {} modules, found {} peers", options.module_paths.len(), catalog.peers.len());

    let mut updated_modules: Vec<ModuleArtifact> = options
        .module_paths
        .iter()
        .map(|path| ModuleArtifact {
            path: path.clone(),
            copy: CopyDisposition::Existing,
            postprocess: false,
        })
        .collect();

    if catalog.peers.is_empty() {
        diagnostics.note("no Java peer types found; bridges module not generated");
        return Ok(BridgenOutput {
            bridges_module: None,
            java_files: Vec::new(),
            ir_files: Vec::new(),
            updated_modules,
            diagnostics,
            peer_count: 0,
        });
    }

    resolve::resolve(&mut catalog, &mut diagnostics);

    // The bridges module first: its write failing is task-fatal
    let module = emit::emit_bridges_module(&catalog);
    let encoded = module.encode();
    std::fs::create_dir_all(&options.module_out).map_err(|source| BridgenError::CreateDir {
        path: options.module_out.clone(),
        source,
    })?;
    let module_path = options
        .module_out
        .join(format!("{}.tlm", names::BRIDGES_MODULE));
    std::fs::write(&module_path, encoded).map_err(|source| BridgenError::WriteArtifact {
        path: module_path.clone(),
        source,
    })?;

    let java_files = emit::java::write_java_files(&catalog, &options.java_out)?;
    let ir_files = emit::trampoline::write_ir_files(&catalog, &options.ir_out)?;

    updated_modules.push(ModuleArtifact {
        path: module_path.clone(),
        copy: CopyDisposition::PreserveNewest,
        postprocess: true,
    });

    info!(
        "generated {} ({} peers, {} java files, {} ir files)",
        module_path.display(),
        catalog.peers.len(),
        java_files.len(),
        ir_files.len()
    );

    Ok(BridgenOutput {
        bridges_module: Some(module_path),
        java_files,
        ir_files,
        updated_modules,
        diagnostics,
        peer_count: catalog.peers.len(),
    })
}
