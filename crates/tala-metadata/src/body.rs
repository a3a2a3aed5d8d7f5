//! Method body instruction set
//!
//! Bodies in a `.tlm` module are short, generator-oriented instruction
//! lists. Branch targets and protected region bounds are expressed as op
//! indices rather than byte offsets, so tools never have to re-measure
//! encoded operand widths when rewriting a body.

use crate::blob::{BlobReader, BlobWriter, DecodeError};
use crate::module::TypeIndex;

/// A single instruction.
///
/// Tags are single bytes followed by their operands:
/// - 0x01-0x07: loads (arguments, constants, tokens, function pointers)
/// - 0x08-0x0A: calls and type operations
/// - 0x0B-0x0F: stack, control flow and termination
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Load argument by index (0 = receiver for instance methods)
    LoadArg(u8),
    /// Push a null reference
    LoadNull,
    /// Push a pointer-sized zero
    LoadZeroNative,
    /// Push a 32-bit integer constant
    LoadConstI32(i32),
    /// Push an inline string constant
    LoadString(String),
    /// Push the runtime type token for a type
    LoadTypeToken(TypeIndex),
    /// Push the native entry address of a method defined in this module
    LoadFnPtr {
        /// Index of the declaring type definition
        type_def: u32,
        /// Method index within the declaring type
        method: u32,
    },
    /// Call a member reference as a plain (non-virtual) call
    Call(u32),
    /// Allocate and construct via a constructor member reference
    NewObj(u32),
    /// Cast the top of stack to a type
    CastClass(TypeIndex),
    /// Duplicate the top of stack
    Dup,
    /// Pop two values, branch to the op index when equal
    BranchEq(u32),
    /// Exit a protected region, branching to the op index
    Leave(u32),
    /// Return from the method
    Ret,
    /// Throw the value on top of the stack
    Throw,
}

impl Op {
    fn tag(&self) -> u8 {
        match self {
            Op::LoadArg(_) => 0x01,
            Op::LoadNull => 0x02,
            Op::LoadZeroNative => 0x03,
            Op::LoadConstI32(_) => 0x04,
            Op::LoadString(_) => 0x05,
            Op::LoadTypeToken(_) => 0x06,
            Op::LoadFnPtr { .. } => 0x07,
            Op::Call(_) => 0x08,
            Op::NewObj(_) => 0x09,
            Op::CastClass(_) => 0x0A,
            Op::Dup => 0x0B,
            Op::BranchEq(_) => 0x0C,
            Op::Leave(_) => 0x0D,
            Op::Ret => 0x0E,
            Op::Throw => 0x0F,
        }
    }

    fn encode(&self, writer: &mut BlobWriter) {
        writer.write_u8(self.tag());
        match self {
            Op::LoadArg(index) => writer.write_u8(*index),
            Op::LoadConstI32(value) => writer.write_i32(*value),
            Op::LoadString(value) => writer.write_str(value),
            Op::LoadTypeToken(ty) => ty.encode(writer),
            Op::LoadFnPtr { type_def, method } => {
                writer.write_u32(*type_def);
                writer.write_u32(*method);
            }
            Op::Call(member) | Op::NewObj(member) => writer.write_u32(*member),
            Op::CastClass(ty) => ty.encode(writer),
            Op::BranchEq(target) | Op::Leave(target) => writer.write_u32(*target),
            Op::LoadNull | Op::LoadZeroNative | Op::Dup | Op::Ret | Op::Throw => {}
        }
    }

    fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        let start = reader.position();
        let tag = reader.read_u8()?;
        Ok(match tag {
            0x01 => Op::LoadArg(reader.read_u8()?),
            0x02 => Op::LoadNull,
            0x03 => Op::LoadZeroNative,
            0x04 => Op::LoadConstI32(reader.read_i32()?),
            0x05 => Op::LoadString(reader.read_str()?),
            0x06 => Op::LoadTypeToken(TypeIndex::decode(reader)?),
            0x07 => Op::LoadFnPtr {
                type_def: reader.read_u32()?,
                method: reader.read_u32()?,
            },
            0x08 => Op::Call(reader.read_u32()?),
            0x09 => Op::NewObj(reader.read_u32()?),
            0x0A => Op::CastClass(TypeIndex::decode(reader)?),
            0x0B => Op::Dup,
            0x0C => Op::BranchEq(reader.read_u32()?),
            0x0D => Op::Leave(reader.read_u32()?),
            0x0E => Op::Ret,
            0x0F => Op::Throw,
            other => return Err(DecodeError::InvalidOp(other, start)),
        })
    }
}

/// A protected region covering a range of ops with an error handler.
///
/// Bounds are op indices; `try_start..try_end` and
/// `handler_start..handler_end` are half-open ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedRegion {
    /// First op of the protected range
    pub try_start: u32,
    /// One past the last op of the protected range
    pub try_end: u32,
    /// First op of the handler
    pub handler_start: u32,
    /// One past the last op of the handler
    pub handler_end: u32,
    /// Error type the handler catches
    pub catch_type: TypeIndex,
}

impl ProtectedRegion {
    fn encode(&self, writer: &mut BlobWriter) {
        writer.write_u32(self.try_start);
        writer.write_u32(self.try_end);
        writer.write_u32(self.handler_start);
        writer.write_u32(self.handler_end);
        self.catch_type.encode(writer);
    }

    fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            try_start: reader.read_u32()?,
            try_end: reader.read_u32()?,
            handler_start: reader.read_u32()?,
            handler_end: reader.read_u32()?,
            catch_type: TypeIndex::decode(reader)?,
        })
    }
}

/// A method body: instruction list plus protected regions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodBody {
    /// Instructions in execution order
    pub ops: Vec<Op>,
    /// Protected regions, outermost first
    pub regions: Vec<ProtectedRegion>,
}

impl MethodBody {
    /// Create an empty body
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an op, returning its index
    pub fn push(&mut self, op: Op) -> u32 {
        self.ops.push(op);
        (self.ops.len() - 1) as u32
    }

    /// Index the next pushed op will receive
    pub fn next_index(&self) -> u32 {
        self.ops.len() as u32
    }

    /// Encode the body into a writer
    pub(crate) fn encode(&self, writer: &mut BlobWriter) {
        writer.write_u32(self.ops.len() as u32);
        for op in &self.ops {
            op.encode(writer);
        }
        writer.write_u32(self.regions.len() as u32);
        for region in &self.regions {
            region.encode(writer);
        }
    }

    /// Decode a body from a reader
    pub(crate) fn decode(reader: &mut BlobReader<'_>) -> Result<Self, DecodeError> {
        let op_count = reader.read_u32()? as usize;
        let mut ops = Vec::with_capacity(op_count);
        for _ in 0..op_count {
            ops.push(Op::decode(reader)?);
        }
        let region_count = reader.read_u32()? as usize;
        let mut regions = Vec::with_capacity(region_count);
        for _ in 0..region_count {
            regions.push(ProtectedRegion::decode(reader)?);
        }
        Ok(Self { ops, regions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_roundtrip() {
        let mut body = MethodBody::new();
        body.push(Op::LoadArg(0));
        body.push(Op::LoadArg(1));
        body.push(Op::Call(3));
        body.push(Op::LoadZeroNative);
        body.push(Op::Leave(6));
        body.push(Op::Throw);
        body.push(Op::Ret);
        body.regions.push(ProtectedRegion {
            try_start: 0,
            try_end: 5,
            handler_start: 5,
            handler_end: 6,
            catch_type: TypeIndex::Ref(2),
        });

        let mut writer = BlobWriter::new();
        body.encode(&mut writer);

        let mut reader = BlobReader::new(writer.buffer());
        let decoded = MethodBody::decode(&mut reader).unwrap();
        assert_eq!(decoded, body);
        assert!(!reader.has_more());
    }

    #[test]
    fn test_all_ops_roundtrip() {
        let ops = vec![
            Op::LoadArg(2),
            Op::LoadNull,
            Op::LoadZeroNative,
            Op::LoadConstI32(-7),
            Op::LoadString("no activation constructor".to_string()),
            Op::LoadTypeToken(TypeIndex::Def(4)),
            Op::LoadFnPtr {
                type_def: 1,
                method: 3,
            },
            Op::Call(0),
            Op::NewObj(9),
            Op::CastClass(TypeIndex::Ref(5)),
            Op::Dup,
            Op::BranchEq(12),
            Op::Leave(13),
            Op::Ret,
            Op::Throw,
        ];
        let body = MethodBody {
            ops: ops.clone(),
            regions: Vec::new(),
        };

        let mut writer = BlobWriter::new();
        body.encode(&mut writer);
        let mut reader = BlobReader::new(writer.buffer());
        let decoded = MethodBody::decode(&mut reader).unwrap();
        assert_eq!(decoded.ops, ops);
    }

    #[test]
    fn test_invalid_op_tag() {
        let mut writer = BlobWriter::new();
        writer.write_u32(1);
        writer.write_u8(0x7E);

        let mut reader = BlobReader::new(writer.buffer());
        assert!(matches!(
            MethodBody::decode(&mut reader),
            Err(DecodeError::InvalidOp(0x7E, _))
        ));
    }

    #[test]
    fn test_push_returns_index() {
        let mut body = MethodBody::new();
        assert_eq!(body.push(Op::LoadArg(0)), 0);
        assert_eq!(body.push(Op::Ret), 1);
        assert_eq!(body.next_index(), 2);
    }
}
