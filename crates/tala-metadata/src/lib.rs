//! Tala Binary Module Definitions
//!
//! This crate provides the `.tlm` container format used by the Tala
//! toolchain: the table layout, the method body instruction set, and the
//! compact blob encoding shared with declarative attribute records.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod blob;
pub mod body;
pub mod module;
pub mod record;

pub use blob::{BlobReader, BlobWriter, DecodeError};
pub use body::{MethodBody, Op, ProtectedRegion};
pub use module::{
    method_flags, type_flags, AttributeRecord, MemberRef, MethodDef, Module, ModuleError,
    TypeDef, TypeIndex, TypeRef,
};
pub use record::{NamedArg, NamedValue, ParsedRecord, RecordBlobBuilder};
