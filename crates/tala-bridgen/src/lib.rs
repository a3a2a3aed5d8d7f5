//! Tala Android Native-Bridge Compiler
//!
//! Scans already-compiled `.tlm` modules for types registered as Java
//! peers and emits three synchronized artifacts: a bridges module of proxy
//! types and type-map records, one LLVM IR unit of JNI trampolines per
//! peer, and one Java source file per peer. The generators are coupled
//! only through shared naming and trampoline-index conventions.

pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod mangle;
pub mod names;
pub mod peer;
pub mod pipeline;
pub mod resolve;
pub mod scanner;

#[cfg(test)]
mod testutil;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{BridgenError, BridgenResult};
pub use peer::{AliasGroup, MarshalMethodRecord, PeerCatalog, PeerDescriptor};
pub use pipeline::{run, BridgenOptions, BridgenOutput, CopyDisposition, ModuleArtifact};
