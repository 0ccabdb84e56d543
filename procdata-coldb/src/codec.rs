use std::net::Ipv4Addr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use ordered_float::OrderedFloat;
use procdata_base::{err, fail, ErrorKind, Result};

use crate::{
    coltype::ColumnType,
    value::{Decimal, Value},
};

/// Decode one element from exactly `width` bytes.
pub type DecodeFn = fn(&[u8]) -> Result<Value>;
/// Encode one element into exactly `width` bytes.
pub type EncodeFn = fn(&Value, &mut [u8]) -> Result<()>;

pub enum Slot {
    /// The value lives in the data file slot.
    Fixed { decode: DecodeFn, encode: EncodeFn },
    /// The slot holds a u64 payload offset. `decode` sees the payload with
    /// any terminator already removed.
    Var { terminated: bool, decode: fn(&[u8]) -> Value },
}

pub struct Codec {
    pub ty: ColumnType,
    pub width: usize,
    pub slot: Slot,
}

// Indexed by `ColumnType as usize`.
pub(crate) static CODECS: [Codec; 23] = [
    Codec::var(ColumnType::Bytes, false, decode_bytes),
    Codec::char(ColumnType::Char1, 1),
    Codec::char(ColumnType::Char2, 2),
    Codec::char(ColumnType::Char4, 4),
    Codec::char(ColumnType::Char8, 8),
    Codec::char(ColumnType::Char16, 16),
    Codec::char(ColumnType::Char32, 32),
    Codec::char(ColumnType::Char64, 64),
    Codec::char(ColumnType::Char128, 128),
    Codec::char(ColumnType::Char256, 256),
    Codec::fixed(ColumnType::Date, 4, decode_date, encode_date),
    Codec::fixed(ColumnType::DateTime, 8, decode_datetime, encode_datetime),
    Codec::fixed(ColumnType::Decimal, 8, decode_decimal, encode_decimal),
    Codec::fixed(ColumnType::Double, 8, decode_double, encode_double),
    Codec::fixed(ColumnType::Float, 4, decode_float, encode_float),
    Codec::fixed(ColumnType::Int, 4, decode_int32, encode_int32),
    Codec::fixed(ColumnType::Int8, 1, decode_int8, encode_int8),
    Codec::fixed(ColumnType::Int16, 2, decode_int16, encode_int16),
    Codec::fixed(ColumnType::Ipv4, 4, decode_ipv4, encode_ipv4),
    Codec::fixed(ColumnType::Long, 8, decode_int64, encode_int64),
    Codec::var(ColumnType::String, true, decode_string),
    Codec::fixed(ColumnType::Time, 4, decode_time, encode_time),
    Codec::fixed(ColumnType::Timestamp, 8, decode_timestamp, encode_timestamp),
];

impl Codec {
    const fn fixed(ty: ColumnType, width: usize, decode: DecodeFn, encode: EncodeFn) -> Self {
        Codec { ty, width, slot: Slot::Fixed { decode, encode } }
    }

    const fn char(ty: ColumnType, width: usize) -> Self {
        Codec::fixed(ty, width, decode_char_slot, encode_char_slot)
    }

    // Variable-length slots hold a u64 offset.
    const fn var(ty: ColumnType, terminated: bool, decode: fn(&[u8]) -> Value) -> Self {
        Codec { ty, width: 8, slot: Slot::Var { terminated, decode } }
    }

    pub fn is_var(&self) -> bool {
        matches!(self.slot, Slot::Var { .. })
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.slot, Slot::Var { terminated: true, .. })
    }

    fn fixed_fns(&self) -> Result<(DecodeFn, EncodeFn)> {
        match self.slot {
            Slot::Fixed { decode, encode } => Ok((decode, encode)),
            Slot::Var { .. } => fail(ErrorKind::Type, format!("{} is variable-length", self.ty)),
        }
    }

    fn slot_range(&self, index: usize, count: usize) -> Result<std::ops::Range<usize>> {
        let lo = index.checked_mul(self.width);
        let hi = index.checked_add(count).and_then(|n| n.checked_mul(self.width));
        match (lo, hi) {
            (Some(lo), Some(hi)) => Ok(lo..hi),
            _ => fail(
                ErrorKind::Range,
                format!("row {} overflows {} slot arithmetic", index, self.ty),
            ),
        }
    }

    /// Decode element `index` of a fixed-width buffer.
    pub fn decode(&self, buf: &[u8], index: usize) -> Result<Value> {
        let (decode, _) = self.fixed_fns()?;
        let range = self.slot_range(index, 1)?;
        match buf.get(range) {
            Some(slot) => decode(slot),
            None => fail(
                ErrorKind::EndOfData,
                format!("{} row {} past end of data", self.ty, index),
            ),
        }
    }

    pub fn encode(&self, buf: &mut [u8], index: usize, val: &Value) -> Result<()> {
        let (_, encode) = self.fixed_fns()?;
        let range = self.slot_range(index, 1)?;
        match buf.get_mut(range) {
            Some(slot) => encode(val, slot),
            None => fail(ErrorKind::Range, format!("{} row {} past end of data", self.ty, index)),
        }
    }

    /// Decode `count` consecutive elements starting at `index` in one pass.
    pub fn decode_run(&self, buf: &[u8], index: usize, count: usize) -> Result<Vec<Value>> {
        let (decode, _) = self.fixed_fns()?;
        let range = self.slot_range(index, count)?;
        let Some(run) = buf.get(range) else {
            return fail(
                ErrorKind::EndOfData,
                format!("{} rows {}..{} past end of data", self.ty, index, index + count),
            );
        };
        run.chunks_exact(self.width).map(decode).collect()
    }

    pub fn encode_run(&self, buf: &mut [u8], index: usize, vals: &[Value]) -> Result<()> {
        let (_, encode) = self.fixed_fns()?;
        let range = self.slot_range(index, vals.len())?;
        let Some(run) = buf.get_mut(range) else {
            return fail(
                ErrorKind::Range,
                format!("{} rows from {} past end of data", self.ty, index),
            );
        };
        for (slot, val) in run.chunks_exact_mut(self.width).zip(vals) {
            encode(val, slot)?;
        }
        Ok(())
    }

    /// Decode a variable-length payload exactly as it sits in the payload
    /// file, terminator included.
    pub fn decode_payload(&self, payload: &[u8]) -> Result<Value> {
        match self.slot {
            Slot::Var { terminated, decode } => {
                let body = if terminated && !payload.is_empty() {
                    &payload[..payload.len() - 1]
                } else {
                    payload
                };
                Ok(decode(body))
            }
            Slot::Fixed { .. } => fail(ErrorKind::Type, format!("{} is fixed-width", self.ty)),
        }
    }

    /// The bytes a variable-length value contributes to the payload file,
    /// not counting the terminator.
    pub fn var_payload<'a>(&self, val: &'a Value) -> Result<&'a [u8]> {
        match (&self.slot, val) {
            (Slot::Var { terminated: true, .. }, Value::Str(s)) => Ok(s.as_bytes()),
            (Slot::Var { terminated: false, .. }, Value::Bytes(b)) => Ok(b),
            (Slot::Var { terminated: false, .. }, Value::Str(s)) => Ok(s.as_bytes()),
            _ => Err(mismatch(self.ty, val)),
        }
    }
}

fn mismatch(ty: ColumnType, val: &Value) -> procdata_base::Error {
    err(ErrorKind::Type, format!("cannot store {} value in {} column", val.kind_name(), ty))
}

fn array<const N: usize>(slot: &[u8]) -> Result<[u8; N]> {
    Ok(<[u8; N]>::try_from(slot)?)
}

fn fit<T: TryFrom<i64>>(v: i64, ty: ColumnType) -> Result<T> {
    match T::try_from(v) {
        Ok(v) => Ok(v),
        Err(_) => fail(ErrorKind::Type, format!("{} out of range for {} column", v, ty)),
    }
}

// Integers

macro_rules! int_codec {
    ($decode:ident, $encode:ident, $t:ty, $variant:ident, $colty:expr) => {
        fn $decode(slot: &[u8]) -> Result<Value> {
            Ok(Value::$variant(<$t>::from_le_bytes(array(slot)?)))
        }
        fn $encode(val: &Value, slot: &mut [u8]) -> Result<()> {
            let Some(v) = val.as_i64() else {
                return Err(mismatch($colty, val));
            };
            let v: $t = fit(v, $colty)?;
            slot.copy_from_slice(&v.to_le_bytes());
            Ok(())
        }
    };
}

int_codec!(decode_int8, encode_int8, i8, Int8, ColumnType::Int8);
int_codec!(decode_int16, encode_int16, i16, Int16, ColumnType::Int16);
int_codec!(decode_int32, encode_int32, i32, Int32, ColumnType::Int);
int_codec!(decode_int64, encode_int64, i64, Int64, ColumnType::Long);

fn decode_timestamp(slot: &[u8]) -> Result<Value> {
    Ok(Value::Timestamp(i64::from_le_bytes(array(slot)?)))
}

fn encode_timestamp(val: &Value, slot: &mut [u8]) -> Result<()> {
    let v = match val {
        Value::Timestamp(v) => *v,
        _ => val.as_i64().ok_or_else(|| mismatch(ColumnType::Timestamp, val))?,
    };
    slot.copy_from_slice(&v.to_le_bytes());
    Ok(())
}

fn decode_ipv4(slot: &[u8]) -> Result<Value> {
    let v = i32::from_le_bytes(array(slot)?);
    Ok(Value::Ipv4(Ipv4Addr::from(v as u32)))
}

fn encode_ipv4(val: &Value, slot: &mut [u8]) -> Result<()> {
    let v = match val {
        Value::Ipv4(addr) => u32::from(*addr) as i32,
        _ => {
            let v = val.as_i64().ok_or_else(|| mismatch(ColumnType::Ipv4, val))?;
            if v < i64::from(i32::MIN) || v > i64::from(u32::MAX) {
                return fail(ErrorKind::Type, format!("{} out of range for ipv4 column", v));
            }
            v as u32 as i32
        }
    };
    slot.copy_from_slice(&v.to_le_bytes());
    Ok(())
}

// Floating and fixed point

fn decode_float(slot: &[u8]) -> Result<Value> {
    Ok(Value::Float(OrderedFloat(f32::from_le_bytes(array(slot)?))))
}

fn encode_float(val: &Value, slot: &mut [u8]) -> Result<()> {
    let v = match val {
        Value::Float(v) => v.0,
        Value::Double(v) => {
            let narrow = v.0 as f32;
            if v.0.is_finite() && !narrow.is_finite() {
                return fail(ErrorKind::Type, format!("{} out of range for float column", v.0));
            }
            narrow
        }
        _ => val.as_i64().ok_or_else(|| mismatch(ColumnType::Float, val))? as f32,
    };
    slot.copy_from_slice(&v.to_le_bytes());
    Ok(())
}

fn decode_double(slot: &[u8]) -> Result<Value> {
    Ok(Value::Double(OrderedFloat(f64::from_le_bytes(array(slot)?))))
}

fn encode_double(val: &Value, slot: &mut [u8]) -> Result<()> {
    let v = match val {
        Value::Float(v) => f64::from(v.0),
        Value::Double(v) => v.0,
        _ => val.as_i64().ok_or_else(|| mismatch(ColumnType::Double, val))? as f64,
    };
    slot.copy_from_slice(&v.to_le_bytes());
    Ok(())
}

fn decode_decimal(slot: &[u8]) -> Result<Value> {
    Ok(Value::Decimal(Decimal::from_units(i64::from_le_bytes(array(slot)?))))
}

fn encode_decimal(val: &Value, slot: &mut [u8]) -> Result<()> {
    let units = match val {
        Value::Decimal(d) => d.units(),
        Value::Float(_) | Value::Double(_) => {
            let v = val.as_f64().unwrap_or_default();
            Decimal::from_f64(v)?.units()
        }
        _ => {
            let v = val.as_i64().ok_or_else(|| mismatch(ColumnType::Decimal, val))?;
            match v.checked_mul(Decimal::SCALE) {
                Some(units) => units,
                None => {
                    return fail(ErrorKind::Type, format!("{} out of range for decimal column", v));
                }
            }
        }
    };
    slot.copy_from_slice(&units.to_le_bytes());
    Ok(())
}

// Chars
//
// The host stores charN values null padded on the right and then byte
// reversed as a whole. Both directions are kept as standalone helpers so
// the quirk is pinned down by tests rather than by the column code.

/// Left-justify `val` into `slot` (truncating), pad with NULs, reverse.
pub fn encode_char(val: &[u8], slot: &mut [u8]) {
    let n = val.len().min(slot.len());
    slot.fill(0);
    slot[..n].copy_from_slice(&val[..n]);
    slot.reverse();
}

/// Reverse a slot and strip the NUL padding.
pub fn decode_char(slot: &[u8]) -> String {
    let mut bytes = slot.to_vec();
    bytes.reverse();
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
    bytes.truncate(end);
    String::from_utf8_lossy(&bytes).into_owned()
}

fn decode_char_slot(slot: &[u8]) -> Result<Value> {
    Ok(Value::Str(decode_char(slot)))
}

fn encode_char_slot(val: &Value, slot: &mut [u8]) -> Result<()> {
    match val {
        Value::Str(s) => {
            encode_char(s.as_bytes(), slot);
            Ok(())
        }
        _ => fail(
            ErrorKind::Type,
            format!("cannot store {} value in char{} column", val.kind_name(), slot.len()),
        ),
    }
}

// Variable-length

fn decode_bytes(payload: &[u8]) -> Value {
    Value::Bytes(payload.to_vec())
}

fn decode_string(payload: &[u8]) -> Value {
    Value::Str(String::from_utf8_lossy(payload).into_owned())
}

// Dates and times
//
//   date      i32  (year-1900)<<21 | month<<17 | day<<12
//   time      u32  hour<<26 | minute<<20 | second<<14 | milli<<4
//   datetime  i64  (year-1900)<<53 | month<<49 | day<<44
//                  | hour<<39 | minute<<33 | second<<27 | milli<<17
//
// Low bits below each layout are left zero on encode and ignored on decode.

fn millis(t: &impl Timelike) -> u32 {
    // Leap seconds report nanos past 1e9; the layout has no room for them.
    (t.nanosecond() / 1_000_000).min(999)
}

// The year field is 11 signed bits in both date layouts.
const YEAR_BIAS: i32 = 1900;
const YEAR_SPAN: std::ops::RangeInclusive<i32> = -1024..=1023;

fn year_field(year: i32, ty: ColumnType) -> Result<i32> {
    let field = year - YEAR_BIAS;
    if !YEAR_SPAN.contains(&field) {
        let (lo, hi) = (YEAR_BIAS + YEAR_SPAN.start(), YEAR_BIAS + YEAR_SPAN.end());
        return fail(
            ErrorKind::Type,
            format!("year {} outside {}..={} for {} column", year, lo, hi, ty),
        );
    }
    Ok(field)
}

pub fn pack_date(d: NaiveDate) -> Result<i32> {
    let year = year_field(d.year(), ColumnType::Date)?;
    Ok((year << 21) | ((d.month() as i32) << 17) | ((d.day() as i32) << 12))
}

pub fn unpack_date(v: i32) -> Result<NaiveDate> {
    let year = YEAR_BIAS + (v >> 21);
    let month = ((v >> 17) & 0b1111) as u32;
    let day = ((v >> 12) & 0b11111) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| err(ErrorKind::Format, format!("invalid packed date {:#x}", v)))
}

pub fn pack_time(t: NaiveTime) -> u32 {
    (t.hour() << 26) | (t.minute() << 20) | (t.second() << 14) | (millis(&t) << 4)
}

pub fn unpack_time(v: u32) -> Result<NaiveTime> {
    let hour = v >> 26;
    let minute = (v >> 20) & 0b111111;
    let second = (v >> 14) & 0b111111;
    let milli = (v >> 4) & 0b1111111111;
    NaiveTime::from_hms_milli_opt(hour, minute, second, milli)
        .ok_or_else(|| err(ErrorKind::Format, format!("invalid packed time {:#x}", v)))
}

pub fn pack_datetime(dt: NaiveDateTime) -> Result<i64> {
    let year = year_field(dt.year(), ColumnType::DateTime)?;
    Ok((i64::from(year) << 53)
        | (i64::from(dt.month()) << 49)
        | (i64::from(dt.day()) << 44)
        | (i64::from(dt.hour()) << 39)
        | (i64::from(dt.minute()) << 33)
        | (i64::from(dt.second()) << 27)
        | (i64::from(millis(&dt)) << 17))
}

pub fn unpack_datetime(v: i64) -> Result<NaiveDateTime> {
    let year = YEAR_BIAS + (v >> 53) as i32;
    let month = ((v >> 49) & 0b1111) as u32;
    let day = ((v >> 44) & 0b11111) as u32;
    let hour = ((v >> 39) & 0b11111) as u32;
    let minute = ((v >> 33) & 0b111111) as u32;
    let second = ((v >> 27) & 0b111111) as u32;
    let milli = ((v >> 17) & 0b1111111111) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_milli_opt(hour, minute, second, milli))
        .ok_or_else(|| err(ErrorKind::Format, format!("invalid packed datetime {:#x}", v)))
}

fn decode_date(slot: &[u8]) -> Result<Value> {
    Ok(Value::Date(unpack_date(i32::from_le_bytes(array(slot)?))?))
}

fn encode_date(val: &Value, slot: &mut [u8]) -> Result<()> {
    match val {
        Value::Date(d) => {
            slot.copy_from_slice(&pack_date(*d)?.to_le_bytes());
            Ok(())
        }
        _ => Err(mismatch(ColumnType::Date, val)),
    }
}

fn decode_time(slot: &[u8]) -> Result<Value> {
    Ok(Value::Time(unpack_time(u32::from_le_bytes(array(slot)?))?))
}

fn encode_time(val: &Value, slot: &mut [u8]) -> Result<()> {
    match val {
        Value::Time(t) => {
            slot.copy_from_slice(&pack_time(*t).to_le_bytes());
            Ok(())
        }
        _ => Err(mismatch(ColumnType::Time, val)),
    }
}

fn decode_datetime(slot: &[u8]) -> Result<Value> {
    Ok(Value::DateTime(unpack_datetime(i64::from_le_bytes(array(slot)?))?))
}

fn encode_datetime(val: &Value, slot: &mut [u8]) -> Result<()> {
    match val {
        Value::DateTime(dt) => {
            slot.copy_from_slice(&pack_datetime(*dt)?.to_le_bytes());
            Ok(())
        }
        _ => Err(mismatch(ColumnType::DateTime, val)),
    }
}
