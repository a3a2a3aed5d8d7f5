//! The three artifact generators.
//!
//! They never call each other; the emitted module, the IR and the Java
//! sources agree only through the naming and trampoline-index conventions
//! in [`crate::mangle`] and [`crate::names`].

pub mod context;
pub mod java;
pub mod module;
pub mod trampoline;

pub use context::EmitContext;
pub use module::emit_bridges_module;
