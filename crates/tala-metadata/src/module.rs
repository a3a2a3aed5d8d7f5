//! Binary module (`.tlm`) format
//!
//! Container layout: a fixed header (magic, version, flags, CRC32 of the
//! payload) followed by the module name, module references, external type
//! references, external member references, type definitions and
//! module-level attribute records.

use crate::blob::{BlobReader, BlobWriter, DecodeError};
use crate::body::MethodBody;
use thiserror::Error;

/// Magic number for Tala module files: "TALM"
pub const MAGIC: [u8; 4] = *b"TALM";

/// Current module format version
pub const VERSION: u32 = 2;

/// Module encoding/decoding errors
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected TALM, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },
}

/// Type definition flags
pub mod type_flags {
    /// Type is an interface
    pub const INTERFACE: u32 = 1 << 0;
    /// Type is abstract
    pub const ABSTRACT: u32 = 1 << 1;
    /// Type is sealed
    pub const SEALED: u32 = 1 << 2;
}

/// Method definition flags
pub mod method_flags {
    /// Method is static
    pub const STATIC: u32 = 1 << 0;
    /// Method is virtual
    pub const VIRTUAL: u32 = 1 << 1;
    /// Method is a constructor
    pub const CTOR: u32 = 1 << 2;
}

/// Reference to a type: either a definition in this module or an external
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeIndex {
    /// Index into this module's type definition table
    Def(u32),
    /// Index into this module's type reference table
    Ref(u32),
}

impl TypeIndex {
    pub(crate) fn encode(&self, writer: &mut BlobWriter) {
        match self {
            TypeIndex::Def(index) => {
                writer.write_u8(0);
                writer.write_u32(*index);
            }
            TypeIndex::Ref(index) => {
                writer.write_u8(1);
                writer.write_u32(*index);
            }
        }
    }

    pub(crate) fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        let start = reader.position();
        let tag = reader.read_u8()?;
        let index = reader.read_u32()?;
        match tag {
            0 => Ok(TypeIndex::Def(index)),
            1 => Ok(TypeIndex::Ref(index)),
            other => Err(DecodeError::InvalidTypeTag(other, start)),
        }
    }
}

/// Reference to a type in another module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Index into the module reference table
    pub module: u32,
    /// Dotted full name, nested types separated by `+`
    pub name: String,
}

impl TypeRef {
    fn encode(&self, writer: &mut BlobWriter) {
        writer.write_u32(self.module);
        writer.write_str(&self.name);
    }

    fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            module: reader.read_u32()?,
            name: reader.read_str()?,
        })
    }
}

/// Reference to a member (method or constructor) of some type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// The type owning the member
    pub owner: TypeIndex,
    /// Member name (`.ctor` for constructors)
    pub name: String,
    /// Textual signature, `(param,types)return`
    pub signature: String,
}

impl MemberRef {
    fn encode(&self, writer: &mut BlobWriter) {
        self.owner.encode(writer);
        writer.write_str(&self.name);
        writer.write_str(&self.signature);
    }

    fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            owner: TypeIndex::decode(reader)?,
            name: reader.read_str()?,
            signature: reader.read_str()?,
        })
    }
}

/// A declarative attribute record: the attribute type plus an opaque blob
/// in the compact record encoding (see [`crate::record`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    /// The attribute type whose constructor this record invokes
    pub ctor_type: TypeIndex,
    /// Raw record blob (prolog, fixed args, named args)
    pub blob: Vec<u8>,
}

impl AttributeRecord {
    fn encode(&self, writer: &mut BlobWriter) {
        self.ctor_type.encode(writer);
        writer.write_u32(self.blob.len() as u32);
        writer.write_bytes(&self.blob);
    }

    fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        let ctor_type = TypeIndex::decode(reader)?;
        let len = reader.read_u32()? as usize;
        let blob = reader.read_bytes(len)?.to_vec();
        Ok(Self { ctor_type, blob })
    }
}

/// Method definition
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Method name (`.ctor` for constructors)
    pub name: String,
    /// Combination of [`method_flags`] bits
    pub flags: u32,
    /// Parameter type names in order
    pub param_types: Vec<String>,
    /// Return type name (`void` for none)
    pub return_type: String,
    /// Body, absent for abstract/external methods
    pub body: Option<MethodBody>,
    /// Attribute records applied to the method
    pub attributes: Vec<AttributeRecord>,
}

impl MethodDef {
    fn encode(&self, writer: &mut BlobWriter) {
        writer.write_str(&self.name);
        writer.write_u32(self.flags);
        writer.write_u32(self.param_types.len() as u32);
        for param in &self.param_types {
            writer.write_str(param);
        }
        writer.write_str(&self.return_type);
        match &self.body {
            Some(body) => {
                writer.write_u8(1);
                body.encode(writer);
            }
            None => writer.write_u8(0),
        }
        encode_attributes(&self.attributes, writer);
    }

    fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_str()?;
        let flags = reader.read_u32()?;
        let param_count = reader.read_u32()? as usize;
        let mut param_types = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            param_types.push(reader.read_str()?);
        }
        let return_type = reader.read_str()?;
        let body = if reader.read_u8()? != 0 {
            Some(MethodBody::decode(reader)?)
        } else {
            None
        };
        let attributes = decode_attributes(reader)?;
        Ok(Self {
            name,
            flags,
            param_types,
            return_type,
            body,
            attributes,
        })
    }

    /// True when the method is a constructor
    pub fn is_ctor(&self) -> bool {
        self.flags & method_flags::CTOR != 0
    }

    /// True when the method is static
    pub fn is_static(&self) -> bool {
        self.flags & method_flags::STATIC != 0
    }
}

/// Type definition
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// Dotted full name, nested types separated by `+`
    pub name: String,
    /// Combination of [`type_flags`] bits
    pub flags: u32,
    /// Base type, absent for the root and for interfaces without one
    pub base: Option<TypeIndex>,
    /// Implemented interfaces
    pub interfaces: Vec<TypeIndex>,
    /// Methods in declaration order
    pub methods: Vec<MethodDef>,
    /// Attribute records applied to the type
    pub attributes: Vec<AttributeRecord>,
}

impl TypeDef {
    fn encode(&self, writer: &mut BlobWriter) {
        writer.write_str(&self.name);
        writer.write_u32(self.flags);
        match &self.base {
            Some(base) => {
                writer.write_u8(1);
                base.encode(writer);
            }
            None => writer.write_u8(0),
        }
        writer.write_u32(self.interfaces.len() as u32);
        for iface in &self.interfaces {
            iface.encode(writer);
        }
        writer.write_u32(self.methods.len() as u32);
        for method in &self.methods {
            method.encode(writer);
        }
        encode_attributes(&self.attributes, writer);
    }

    fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_str()?;
        let flags = reader.read_u32()?;
        let base = if reader.read_u8()? != 0 {
            Some(TypeIndex::decode(reader)?)
        } else {
            None
        };
        let iface_count = reader.read_u32()? as usize;
        let mut interfaces = Vec::with_capacity(iface_count);
        for _ in 0..iface_count {
            interfaces.push(TypeIndex::decode(reader)?);
        }
        let method_count = reader.read_u32()? as usize;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(MethodDef::decode(reader)?);
        }
        let attributes = decode_attributes(reader)?;
        Ok(Self {
            name,
            flags,
            base,
            interfaces,
            methods,
            attributes,
        })
    }

    /// True when the type is an interface
    pub fn is_interface(&self) -> bool {
        self.flags & type_flags::INTERFACE != 0
    }

    /// True when the type is abstract
    pub fn is_abstract(&self) -> bool {
        self.flags & type_flags::ABSTRACT != 0
    }
}

fn encode_attributes(attributes: &[AttributeRecord], writer: &mut BlobWriter) {
    writer.write_u32(attributes.len() as u32);
    for attr in attributes {
        attr.encode(writer);
    }
}

fn decode_attributes(reader: &mut BlobReader<'_>) -> Result<Vec<AttributeRecord>, DecodeError> {
    let count = reader.read_u32()? as usize;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        attributes.push(AttributeRecord::decode(reader)?);
    }
    Ok(attributes)
}

/// A compiled Tala module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Module name, e.g. "Tala.Android"
    pub name: String,
    /// Names of referenced modules
    pub module_refs: Vec<String>,
    /// External type references
    pub type_refs: Vec<TypeRef>,
    /// External member references
    pub member_refs: Vec<MemberRef>,
    /// Type definitions
    pub types: Vec<TypeDef>,
    /// Module-level attribute records
    pub attributes: Vec<AttributeRecord>,
}

impl Module {
    /// Create a new empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look up a type definition by its full name
    pub fn find_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    /// True when the module is, or references, the given module name
    pub fn uses_module(&self, name: &str) -> bool {
        self.name == name || self.module_refs.iter().any(|m| m == name)
    }

    /// Encode the module to the binary `.tlm` format
    ///
    /// Layout:
    /// - Header: magic (4 bytes) + version (u32) + flags (u32) + checksum (u32)
    /// - Name, module references, type references, member references
    /// - Type definitions
    /// - Module-level attribute records
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BlobWriter::with_capacity(1024);

        writer.write_bytes(&MAGIC);
        writer.write_u32(VERSION);
        writer.write_u32(0); // flags, reserved
        let checksum_offset = writer.reserve_u32();

        writer.write_str(&self.name);

        writer.write_u32(self.module_refs.len() as u32);
        for module in &self.module_refs {
            writer.write_str(module);
        }

        writer.write_u32(self.type_refs.len() as u32);
        for type_ref in &self.type_refs {
            type_ref.encode(&mut writer);
        }

        writer.write_u32(self.member_refs.len() as u32);
        for member_ref in &self.member_refs {
            member_ref.encode(&mut writer);
        }

        writer.write_u32(self.types.len() as u32);
        for type_def in &self.types {
            type_def.encode(&mut writer);
        }

        encode_attributes(&self.attributes, &mut writer);

        // Checksum covers everything after the 16-byte header
        let checksum = crc32fast::hash(&writer.buffer()[16..]);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }

    /// Decode a module from the binary `.tlm` format
    pub fn decode(data: &[u8]) -> Result<Self, ModuleError> {
        let mut reader = BlobReader::new(data);

        let magic: [u8; 4] = reader.read_bytes(4)?.try_into().unwrap_or([0; 4]);
        if magic != MAGIC {
            return Err(ModuleError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ModuleError::UnsupportedVersion(version));
        }

        let _flags = reader.read_u32()?;
        let stored_checksum = reader.read_u32()?;
        let actual_checksum = crc32fast::hash(&data[16..]);
        if stored_checksum != actual_checksum {
            return Err(ModuleError::ChecksumMismatch {
                expected: stored_checksum,
                actual: actual_checksum,
            });
        }

        let name = reader.read_str()?;

        let module_ref_count = reader.read_u32()? as usize;
        let mut module_refs = Vec::with_capacity(module_ref_count);
        for _ in 0..module_ref_count {
            module_refs.push(reader.read_str()?);
        }

        let type_ref_count = reader.read_u32()? as usize;
        let mut type_refs = Vec::with_capacity(type_ref_count);
        for _ in 0..type_ref_count {
            type_refs.push(TypeRef::decode(&mut reader)?);
        }

        let member_ref_count = reader.read_u32()? as usize;
        let mut member_refs = Vec::with_capacity(member_ref_count);
        for _ in 0..member_ref_count {
            member_refs.push(MemberRef::decode(&mut reader)?);
        }

        let type_count = reader.read_u32()? as usize;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            types.push(TypeDef::decode(&mut reader)?);
        }

        let attributes = decode_attributes(&mut reader)?;

        Ok(Self {
            name,
            module_refs,
            type_refs,
            member_refs,
            types,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Op;
    use crate::record::RecordBlobBuilder;
    use pretty_assertions::assert_eq;

    fn sample_module() -> Module {
        let mut module = Module::new("App.Main");
        module.module_refs.push("Tala.Android".to_string());
        module.type_refs.push(TypeRef {
            module: 0,
            name: "Tala.Android.App.Activity".to_string(),
        });
        module.member_refs.push(MemberRef {
            owner: TypeIndex::Ref(0),
            name: ".ctor".to_string(),
            signature: "(Tala.Interop.NativeHandle,Tala.Interop.OwnershipTransfer)void"
                .to_string(),
        });

        let blob = RecordBlobBuilder::new()
            .fixed_str("com/example/MainActivity")
            .build();
        module.types.push(TypeDef {
            name: "App.Main.MainActivity".to_string(),
            flags: 0,
            base: Some(TypeIndex::Ref(0)),
            interfaces: vec![],
            methods: vec![MethodDef {
                name: "OnCreate".to_string(),
                flags: method_flags::VIRTUAL,
                param_types: vec!["Tala.Android.OS.Bundle".to_string()],
                return_type: "void".to_string(),
                body: Some(MethodBody {
                    ops: vec![Op::LoadArg(0), Op::Ret],
                    regions: vec![],
                }),
                attributes: vec![],
            }],
            attributes: vec![AttributeRecord {
                ctor_type: TypeIndex::Ref(0),
                blob,
            }],
        });
        module
    }

    #[test]
    fn test_empty_module_roundtrip() {
        let module = Module::new("Empty");
        let bytes = module.encode();
        let decoded = Module::decode(&bytes).unwrap();
        assert_eq!(decoded, module);
    }

    #[test]
    fn test_module_roundtrip() {
        let module = sample_module();
        let bytes = module.encode();
        let decoded = Module::decode(&bytes).unwrap();
        assert_eq!(decoded, module);
    }

    #[test]
    fn test_uses_module() {
        let module = sample_module();
        assert!(module.uses_module("App.Main"));
        assert!(module.uses_module("Tala.Android"));
        assert!(!module.uses_module("Tala.Core"));
    }

    #[test]
    fn test_find_type() {
        let module = sample_module();
        assert!(module.find_type("App.Main.MainActivity").is_some());
        assert!(module.find_type("App.Main.Missing").is_none());
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample_module().encode();
        bytes[0] = b'X';
        assert!(matches!(
            Module::decode(&bytes),
            Err(ModuleError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = sample_module().encode();
        bytes[4..8].copy_from_slice(&999u32.to_le_bytes());
        assert!(matches!(
            Module::decode(&bytes),
            Err(ModuleError::UnsupportedVersion(999))
        ));
    }

    #[test]
    fn test_checksum_validation() {
        let mut bytes = sample_module().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            Module::decode(&bytes),
            Err(ModuleError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_module() {
        let bytes = sample_module().encode();
        // Corrupting the length makes the payload end early; the checksum
        // catches it before table decoding does
        let truncated = &bytes[..bytes.len() / 2];
        assert!(Module::decode(truncated).is_err());
    }

    #[test]
    fn test_method_flags() {
        let method = MethodDef {
            name: ".ctor".to_string(),
            flags: method_flags::CTOR,
            param_types: vec![],
            return_type: "void".to_string(),
            body: None,
            attributes: vec![],
        };
        assert!(method.is_ctor());
        assert!(!method.is_static());
    }
}
