//! Declarative attribute record blobs
//!
//! Record blobs follow a compact convention: a `u16` prolog (`0x0001`), a
//! fixed-argument count byte, the fixed arguments as optional serialized
//! strings, then a `u16` named-argument count followed by
//! `(kind, element-type, name, value)` entries. Readers are lenient by
//! contract: a malformed blob parses to "no record", and an unrecognized
//! named-argument element type stops parsing instead of erroring, keeping
//! everything already read.

use crate::blob::{BlobReader, BlobWriter};

/// Record prolog value
pub const PROLOG: u16 = 0x0001;

/// Named-argument kind byte: field
pub const KIND_FIELD: u8 = 0x53;
/// Named-argument kind byte: property
pub const KIND_PROPERTY: u8 = 0x54;

/// Element type byte: boolean
pub const ELEM_BOOL: u8 = 0x02;
/// Element type byte: string
pub const ELEM_STRING: u8 = 0x0E;

/// A named argument value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedValue {
    /// Boolean value
    Bool(bool),
    /// String value
    Str(String),
}

/// A parsed named argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArg {
    /// Field or property name
    pub name: String,
    /// The value
    pub value: NamedValue,
}

/// Builder for record blobs
#[derive(Debug, Default)]
pub struct RecordBlobBuilder {
    fixed: Vec<Option<String>>,
    named: Vec<NamedArg>,
}

impl RecordBlobBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fixed string argument
    pub fn fixed_str(mut self, value: impl Into<String>) -> Self {
        self.fixed.push(Some(value.into()));
        self
    }

    /// Append a null fixed argument
    pub fn fixed_null(mut self) -> Self {
        self.fixed.push(None);
        self
    }

    /// Append a named boolean argument
    pub fn named_bool(mut self, name: impl Into<String>, value: bool) -> Self {
        self.named.push(NamedArg {
            name: name.into(),
            value: NamedValue::Bool(value),
        });
        self
    }

    /// Append a named string argument
    pub fn named_str(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.push(NamedArg {
            name: name.into(),
            value: NamedValue::Str(value.into()),
        });
        self
    }

    /// Encode the record blob
    pub fn build(self) -> Vec<u8> {
        let mut writer = BlobWriter::new();
        writer.write_u16(PROLOG);
        writer.write_u8(self.fixed.len() as u8);
        for arg in &self.fixed {
            writer.write_opt_str(arg.as_deref());
        }
        writer.write_u16(self.named.len() as u16);
        for arg in &self.named {
            writer.write_u8(KIND_PROPERTY);
            match &arg.value {
                NamedValue::Bool(value) => {
                    writer.write_u8(ELEM_BOOL);
                    writer.write_str(&arg.name);
                    writer.write_u8(u8::from(*value));
                }
                NamedValue::Str(value) => {
                    writer.write_u8(ELEM_STRING);
                    writer.write_str(&arg.name);
                    writer.write_str(value);
                }
            }
        }
        writer.into_bytes()
    }
}

/// A record blob parsed into fixed and named arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Fixed arguments in order; `None` entries were the null sentinel
    pub fixed: Vec<Option<String>>,
    /// Named arguments read before parsing stopped
    pub named: Vec<NamedArg>,
}

impl ParsedRecord {
    /// Parse a record blob. Returns `None` when the prolog or the fixed
    /// arguments are malformed; named-argument parsing stops silently at
    /// the first unrecognized entry.
    pub fn parse(blob: &[u8]) -> Option<Self> {
        let mut reader = BlobReader::new(blob);

        if reader.read_u16().ok()? != PROLOG {
            return None;
        }

        let fixed_count = reader.read_u8().ok()? as usize;
        let mut fixed = Vec::with_capacity(fixed_count);
        for _ in 0..fixed_count {
            fixed.push(reader.read_opt_str().ok()?);
        }

        let mut named = Vec::new();
        if reader.remaining() >= 2 {
            let named_count = reader.read_u16().unwrap_or(0) as usize;
            for _ in 0..named_count {
                match Self::parse_named(&mut reader) {
                    Some(arg) => named.push(arg),
                    // Unrecognized trailing field: stop, keep what we have
                    None => break,
                }
            }
        }

        Some(Self { fixed, named })
    }

    fn parse_named(reader: &mut BlobReader<'_>) -> Option<NamedArg> {
        let kind = reader.read_u8().ok()?;
        if kind != KIND_FIELD && kind != KIND_PROPERTY {
            return None;
        }
        let elem = reader.read_u8().ok()?;
        let name = reader.read_str().ok()?;
        let value = match elem {
            ELEM_BOOL => NamedValue::Bool(reader.read_u8().ok()? != 0),
            ELEM_STRING => NamedValue::Str(reader.read_str().ok()?),
            _ => return None,
        };
        Some(NamedArg { name, value })
    }

    /// Fixed argument at `index`, when present and non-null
    pub fn string(&self, index: usize) -> Option<&str> {
        self.fixed.get(index)?.as_deref()
    }

    /// Named boolean argument by name
    pub fn named_bool(&self, name: &str) -> Option<bool> {
        self.named.iter().find_map(|arg| match &arg.value {
            NamedValue::Bool(value) if arg.name == name => Some(*value),
            _ => None,
        })
    }

    /// Named string argument by name
    pub fn named_str(&self, name: &str) -> Option<&str> {
        self.named.iter().find_map(|arg| match &arg.value {
            NamedValue::Str(value) if arg.name == name => Some(value.as_str()),
            _ => None,
        })
    }
}
