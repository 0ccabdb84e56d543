use procdata_base::{fail, ErrorKind, Result};

use crate::codec::{Codec, CODECS};

/// Every scalar kind the host can place in a column. The ordinal is the
/// index into the codec table; the host's own type code is [`ColumnType::code`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ColumnType {
    Bytes = 0,
    Char1 = 1,
    Char2 = 2,
    Char4 = 3,
    Char8 = 4,
    Char16 = 5,
    Char32 = 6,
    Char64 = 7,
    Char128 = 8,
    Char256 = 9,
    Date = 10,
    DateTime = 11,
    Decimal = 12,
    Double = 13,
    Float = 14,
    Int = 15,
    Int8 = 16,
    Int16 = 17,
    Ipv4 = 18,
    Long = 19,
    String = 20,
    Time = 21,
    Timestamp = 22,
}

impl ColumnType {
    pub const ALL: [ColumnType; 23] = [
        ColumnType::Bytes,
        ColumnType::Char1,
        ColumnType::Char2,
        ColumnType::Char4,
        ColumnType::Char8,
        ColumnType::Char16,
        ColumnType::Char32,
        ColumnType::Char64,
        ColumnType::Char128,
        ColumnType::Char256,
        ColumnType::Date,
        ColumnType::DateTime,
        ColumnType::Decimal,
        ColumnType::Double,
        ColumnType::Float,
        ColumnType::Int,
        ColumnType::Int8,
        ColumnType::Int16,
        ColumnType::Ipv4,
        ColumnType::Long,
        ColumnType::String,
        ColumnType::Time,
        ColumnType::Timestamp,
    ];

    pub fn code(self) -> u64 {
        match self {
            ColumnType::Bytes => 0x0000002,
            ColumnType::Char1 => 0x0080000,
            ColumnType::Char2 => 0x0100000,
            ColumnType::Char4 => 0x0001000,
            ColumnType::Char8 => 0x0002000,
            ColumnType::Char16 => 0x0004000,
            ColumnType::Char32 => 0x0200000,
            ColumnType::Char64 => 0x0400000,
            ColumnType::Char128 => 0x0800000,
            ColumnType::Char256 => 0x1000000,
            ColumnType::Date => 0x2000000,
            ColumnType::DateTime => 0x0000200,
            ColumnType::Decimal => 0x8000000,
            ColumnType::Double => 0x0000010,
            ColumnType::Float => 0x0000020,
            ColumnType::Int => 0x0000040,
            ColumnType::Int8 => 0x0020000,
            ColumnType::Int16 => 0x0040000,
            ColumnType::Ipv4 => 0x0008000,
            ColumnType::Long => 0x0000080,
            ColumnType::String => 0x0000001,
            ColumnType::Time => 0x4000000,
            ColumnType::Timestamp => 0x0010000,
        }
    }

    pub fn from_code(code: u64) -> Result<Self> {
        match ColumnType::ALL.iter().find(|ty| ty.code() == code) {
            Some(ty) => Ok(*ty),
            None => fail(ErrorKind::Format, format!("unknown column type code {:#x}", code)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Bytes => "bytes",
            ColumnType::Char1 => "char1",
            ColumnType::Char2 => "char2",
            ColumnType::Char4 => "char4",
            ColumnType::Char8 => "char8",
            ColumnType::Char16 => "char16",
            ColumnType::Char32 => "char32",
            ColumnType::Char64 => "char64",
            ColumnType::Char128 => "char128",
            ColumnType::Char256 => "char256",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Decimal => "decimal",
            ColumnType::Double => "double",
            ColumnType::Float => "float",
            ColumnType::Int => "int",
            ColumnType::Int8 => "int8",
            ColumnType::Int16 => "int16",
            ColumnType::Ipv4 => "ipv4",
            ColumnType::Long => "long",
            ColumnType::String => "string",
            ColumnType::Time => "time",
            ColumnType::Timestamp => "timestamp",
        }
    }

    pub fn codec(self) -> &'static Codec {
        &CODECS[self as usize]
    }

    /// Bytes per row in the data file; 8 (an offset) for variable-length kinds.
    pub fn width(self) -> usize {
        self.codec().width
    }

    pub fn is_var(self) -> bool {
        self.codec().is_var()
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
