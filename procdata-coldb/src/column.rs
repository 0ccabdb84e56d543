use std::path::Path;

use procdata_base::{fail, ErrorKind, Result};
use procdata_mmap::{MappedBuffer, Reader, Writer};
use tracing::{debug, warn};

use crate::{coltype::ColumnType, slice::Slice, value::Value};

const NULL: u8 = 1;
const NOT_NULL: u8 = 0;

/// Rows decoded per step by [`ColumnIter`] and [`Batches`].
pub const ITER_BATCH: usize = 1024;

/// Anything that can be parsed out of a column record in the control
/// manifest. Tables are generic over this.
pub trait ColumnRecord: Sized {
    fn read_from(rd: &mut impl Reader) -> Result<Self>;
    fn name(&self) -> &str;
    fn size(&self) -> usize;
}

// The state shared by both column flavours. `pos` is the append cursor and
// only moves on output columns.
#[derive(Debug)]
pub(crate) struct ColumnCore {
    name: String,
    ty: ColumnType,
    size: usize,
    writable: bool,
    pos: usize,
    data: MappedBuffer,
    nulls: Option<MappedBuffer>,
    var_data: Option<MappedBuffer>,
}

fn non_empty(path: String) -> Option<String> {
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

impl ColumnCore {
    fn attach(
        name: String,
        ty: ColumnType,
        data: Option<&Path>,
        nulls: Option<&Path>,
        var: Option<&Path>,
        writable: bool,
    ) -> Result<Self> {
        let (data, size) = match data {
            Some(path) => {
                let buf = MappedBuffer::open(path, writable)?;
                let size = buf.len() / ty.width();
                (buf, size)
            }
            None => (MappedBuffer::new(), 0),
        };
        let nulls = nulls.map(|path| MappedBuffer::open(path, writable)).transpose()?;
        let var_data = match var {
            Some(path) if ty.is_var() => Some(MappedBuffer::open(path, writable)?),
            Some(path) => {
                let path = path.display();
                warn!(column = %name, %ty, %path, "ignoring payload file on fixed-width column");
                None
            }
            None if ty.is_var() && size > 0 => {
                return fail(
                    ErrorKind::Format,
                    format!("{} column {} has rows but no payload file", ty, name),
                );
            }
            None => None,
        };
        debug!(column = %name, %ty, size, nullable = nulls.is_some(), writable, "attached column");
        Ok(ColumnCore { name, ty, size, writable, pos: 0, data, nulls, var_data })
    }

    fn read_record(rd: &mut impl Reader, writable: bool) -> Result<Self> {
        let name = rd.read_string()?;
        let ty = ColumnType::from_code(rd.read_u64()?)?;
        let data = non_empty(rd.read_string()?);
        let nulls = non_empty(rd.read_string()?);
        let var = non_empty(rd.read_string()?);
        ColumnCore::attach(
            name,
            ty,
            data.as_deref().map(Path::new),
            nulls.as_deref().map(Path::new),
            var.as_deref().map(Path::new),
            writable,
        )
    }

    fn row(&self, index: i64) -> Result<usize> {
        let size = self.size as i64;
        let row = if index < 0 { index + size } else { index };
        if row < 0 || row >= size {
            return fail(
                ErrorKind::Range,
                format!(
                    "index {} out of range for column {} of {} rows",
                    index,
                    self.name,
                    self.size
                ),
            );
        }
        Ok(row as usize)
    }

    fn is_null(&self, row: usize) -> bool {
        match &self.nulls {
            Some(nulls) => nulls.bytes().get(row) == Some(&NULL),
            None => false,
        }
    }

    fn var(&self) -> Result<&MappedBuffer> {
        match &self.var_data {
            Some(var) => Ok(var),
            None => fail(
                ErrorKind::Format,
                format!("{} column {} has no payload file", self.ty, self.name),
            ),
        }
    }

    fn offset(&self, row: usize) -> Result<usize> {
        let start = row * 8;
        match self.data.bytes().get(start..start + 8) {
            Some(slot) => {
                let mut buf = [0_u8; 8];
                buf.copy_from_slice(slot);
                Ok(usize::try_from(u64::from_le_bytes(buf))?)
            }
            None => fail(
                ErrorKind::EndOfData,
                format!("offset {} past end of column {}", row, self.name),
            ),
        }
    }

    // A row ends where the next one starts. The last row ends at the end of
    // the payload, which for a column still being written is its cursor.
    fn payload(&self, row: usize) -> Result<&[u8]> {
        let var = self.var()?;
        let (rows, end_of_payload) = if self.writable {
            (self.pos, var.pos())
        } else {
            (self.size, var.len())
        };
        if row >= rows {
            return fail(
                ErrorKind::Range,
                format!("row {} of column {} has not been written", row, self.name),
            );
        }
        let start = self.offset(row)?;
        let end = if row + 1 < rows { self.offset(row + 1)? } else { end_of_payload };
        match var.bytes().get(start..end) {
            Some(payload) => Ok(payload),
            None => fail(
                ErrorKind::Format,
                format!("bad payload bounds {}..{} in column {}", start, end, self.name),
            ),
        }
    }

    fn read_row(&self, row: usize) -> Result<Option<Value>> {
        if self.is_null(row) {
            return Ok(None);
        }
        let codec = self.ty.codec();
        if codec.is_var() {
            codec.decode_payload(self.payload(row)?).map(Some)
        } else {
            codec.decode(self.data.bytes(), row).map(Some)
        }
    }

    fn get(&self, index: i64) -> Result<Option<Value>> {
        let row = self.row(index)?;
        self.read_row(row)
    }

    fn get_slice(&self, slice: Slice) -> Result<Vec<Option<Value>>> {
        let resolved = slice.resolve(self.size)?;
        if resolved.count == 0 {
            return Ok(Vec::new());
        }
        let codec = self.ty.codec();
        match resolved.as_range() {
            // Nulls may sit over bytes that do not decode, so only a
            // non-nullable fixed column takes the single-pass route.
            Some(range) if self.nulls.is_none() && !codec.is_var() => {
                let vals = codec.decode_run(self.data.bytes(), range.start, range.len())?;
                Ok(vals.into_iter().map(Some).collect())
            }
            _ => resolved.rows().map(|row| self.read_row(row)).collect(),
        }
    }

    fn set_null_flag(&mut self, row: usize, null: bool) -> Result<()> {
        let Some(nulls) = &mut self.nulls else {
            if null {
                return fail(ErrorKind::Type, format!("column {} is not nullable", self.name));
            }
            return Ok(());
        };
        match nulls.bytes_mut()?.get_mut(row) {
            Some(flag) => {
                *flag = if null { NULL } else { NOT_NULL };
                Ok(())
            }
            None => fail(
                ErrorKind::Range,
                format!("row {} past end of null flags for {}", row, self.name),
            ),
        }
    }

    fn check_null_allowed(&self, val: &Option<Value>) -> Result<()> {
        if val.is_none() && self.nulls.is_none() {
            return fail(ErrorKind::Type, format!("column {} is not nullable", self.name));
        }
        Ok(())
    }

    fn write_fixed(&mut self, row: usize, val: Option<&Value>) -> Result<()> {
        match val {
            None => self.set_null_flag(row, true),
            Some(v) => {
                self.ty.codec().encode(self.data.bytes_mut()?, row, v)?;
                self.set_null_flag(row, false)
            }
        }
    }

    fn write_offset(&mut self, row: usize, offset: usize) -> Result<()> {
        let start = row * 8;
        match self.data.bytes_mut()?.get_mut(start..start + 8) {
            Some(slot) => {
                slot.copy_from_slice(&(offset as u64).to_le_bytes());
                Ok(())
            }
            None => fail(
                ErrorKind::Range,
                format!("offset {} past end of column {}", row, self.name),
            ),
        }
    }

    fn reject_var(&self, op: &str) -> Result<()> {
        if self.ty.is_var() {
            return fail(
                ErrorKind::Type,
                format!("cannot {} in variable-length column {}", op, self.name),
            );
        }
        Ok(())
    }

    fn set(&mut self, index: i64, val: Option<Value>) -> Result<()> {
        self.reject_var("set values")?;
        let row = self.row(index)?;
        self.check_null_allowed(&val)?;
        self.write_fixed(row, val.as_ref())
    }

    fn set_slice(&mut self, slice: Slice, vals: Vec<Option<Value>>) -> Result<()> {
        self.reject_var("set values")?;
        let resolved = slice.resolve(self.size)?;
        if vals.len() != resolved.count {
            return fail(
                ErrorKind::Validation,
                format!(
                    "slice of {} rows cannot take {} values in column {}",
                    resolved.count,
                    vals.len(),
                    self.name
                ),
            );
        }
        for val in vals.iter() {
            self.check_null_allowed(val)?;
        }
        match resolved.as_range() {
            // No null flags to keep in step, so the run is encoded in one pass.
            Some(range) if self.nulls.is_none() => {
                let vals: Vec<Value> = vals.into_iter().flatten().collect();
                self.ty.codec().encode_run(self.data.bytes_mut()?, range.start, &vals)
            }
            _ => {
                for (row, val) in resolved.rows().zip(vals.iter()) {
                    self.write_fixed(row, val.as_ref())?;
                }
                Ok(())
            }
        }
    }

    fn append(&mut self, val: Option<Value>) -> Result<usize> {
        let row = self.pos;
        if row >= self.size {
            return fail(
                ErrorKind::Capacity,
                format!("insufficient table size for column {} ({} rows)", self.name, self.size),
            );
        }
        self.check_null_allowed(&val)?;
        let codec = self.ty.codec();
        if codec.is_var() {
            let payload = match &val {
                Some(v) => Some(codec.var_payload(v)?),
                None => None,
            };
            let offset = self.var()?.pos();
            self.write_offset(row, offset)?;
            if let Some(payload) = payload {
                let Some(var) = &mut self.var_data else {
                    return fail(
                        ErrorKind::Format,
                        format!("{} column {} has no payload file", self.ty, self.name),
                    );
                };
                var.write(payload, codec.is_terminated())?;
            }
            self.set_null_flag(row, val.is_none())?;
        } else {
            self.write_fixed(row, val.as_ref())?;
        }
        self.pos += 1;
        Ok(row)
    }

    fn extend(&mut self, vals: impl IntoIterator<Item = Option<Value>>) -> Result<usize> {
        let mut count = 0;
        for val in vals {
            self.append(val)?;
            count += 1;
        }
        Ok(count)
    }

    fn reserve(&mut self, size: usize) -> Result<()> {
        let Some(bytes) = size.checked_mul(self.ty.width()) else {
            return fail(ErrorKind::Range, format!("size {} overflows column {}", size, self.name));
        };
        self.data.remap(Some(bytes))?;
        if let Some(nulls) = &mut self.nulls {
            nulls.remap(Some(size))?;
        }
        self.size = size;
        debug!(column = %self.name, size, "reserved column");
        Ok(())
    }

    fn complete(&mut self) -> Result<()> {
        if let Some(var) = &mut self.var_data {
            var.truncate()?;
        }
        self.data.flush()?;
        if let Some(nulls) = &self.nulls {
            nulls.flush()?;
        }
        Ok(())
    }

    fn batches(&self) -> Batches<'_> {
        Batches { core: self, next: 0 }
    }
}

/// Lazily decodes a column [`ITER_BATCH`] rows at a time.
pub struct Batches<'a> {
    core: &'a ColumnCore,
    next: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Vec<Option<Value>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.core.size {
            return None;
        }
        let start = self.next;
        let stop = (start + ITER_BATCH).min(self.core.size);
        self.next = stop;
        let res = self.core.get_slice(Slice::range(start as i64, stop as i64));
        if res.is_err() {
            // One error ends the walk.
            self.next = self.core.size;
        }
        Some(res)
    }
}

/// Row-at-a-time view over [`Batches`].
pub struct ColumnIter<'a> {
    batches: Batches<'a>,
    current: std::vec::IntoIter<Option<Value>>,
}

impl Iterator for ColumnIter<'_> {
    type Item = Result<Option<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(val) = self.current.next() {
                return Some(Ok(val));
            }
            match self.batches.next()? {
                Ok(batch) => self.current = batch.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

macro_rules! column_reads {
    ($col:ident) => {
        impl $col {
            pub fn name(&self) -> &str {
                &self.core.name
            }

            pub fn ty(&self) -> ColumnType {
                self.core.ty
            }

            pub fn is_nullable(&self) -> bool {
                self.core.nulls.is_some()
            }

            pub fn size(&self) -> usize {
                self.core.size
            }

            pub fn len(&self) -> usize {
                self.core.size
            }

            pub fn is_empty(&self) -> bool {
                self.core.size == 0
            }

            /// One row; negative indices count from the end.
            pub fn get(&self, index: i64) -> Result<Option<Value>> {
                self.core.get(index)
            }

            pub fn get_slice(&self, slice: impl Into<Slice>) -> Result<Vec<Option<Value>>> {
                self.core.get_slice(slice.into())
            }

            pub fn iter(&self) -> ColumnIter<'_> {
                ColumnIter { batches: self.core.batches(), current: Vec::new().into_iter() }
            }

            pub fn batches(&self) -> Batches<'_> {
                self.core.batches()
            }
        }

        impl ColumnRecord for $col {
            fn read_from(rd: &mut impl Reader) -> Result<Self> {
                Ok($col { core: ColumnCore::read_record(rd, $col::WRITABLE)? })
            }

            fn name(&self) -> &str {
                &self.core.name
            }

            fn size(&self) -> usize {
                self.core.size
            }
        }

        impl<'a> IntoIterator for &'a $col {
            type Item = Result<Option<Value>>;
            type IntoIter = ColumnIter<'a>;

            fn into_iter(self) -> ColumnIter<'a> {
                self.iter()
            }
        }
    };
}

/// A read-only column the host filled before launch.
#[derive(Debug)]
pub struct InputColumn {
    core: ColumnCore,
}

/// A writable column. It has no rows until its table is sized.
#[derive(Debug)]
pub struct OutputColumn {
    core: ColumnCore,
}

column_reads!(InputColumn);
column_reads!(OutputColumn);

impl InputColumn {
    const WRITABLE: bool = false;

    /// Attach to files directly rather than through a manifest record.
    pub fn attach(
        name: impl Into<String>,
        ty: ColumnType,
        data: Option<&Path>,
        nulls: Option<&Path>,
        var: Option<&Path>,
    ) -> Result<Self> {
        Ok(InputColumn { core: ColumnCore::attach(name.into(), ty, data, nulls, var, false)? })
    }
}

impl OutputColumn {
    const WRITABLE: bool = true;

    pub fn attach(
        name: impl Into<String>,
        ty: ColumnType,
        data: Option<&Path>,
        nulls: Option<&Path>,
        var: Option<&Path>,
    ) -> Result<Self> {
        Ok(OutputColumn { core: ColumnCore::attach(name.into(), ty, data, nulls, var, true)? })
    }

    /// Overwrite one row. Variable-length columns only take appends.
    pub fn set(&mut self, index: i64, val: Option<Value>) -> Result<()> {
        self.core.set(index, val)
    }

    /// Overwrite every row the slice selects. The value count must match
    /// the selection exactly; nothing is written otherwise.
    pub fn set_slice(
        &mut self,
        slice: impl Into<Slice>,
        vals: impl IntoIterator<Item = Option<Value>>,
    ) -> Result<()> {
        self.core.set_slice(slice.into(), vals.into_iter().collect())
    }

    /// Write at the append cursor and advance it. Returns the row written.
    pub fn append(&mut self, val: Option<Value>) -> Result<usize> {
        self.core.append(val)
    }

    /// Append each value in turn, returning how many were written. On
    /// error the cursor stays after the last row that succeeded.
    pub fn extend(&mut self, vals: impl IntoIterator<Item = Option<Value>>) -> Result<usize> {
        self.core.extend(vals)
    }

    /// Stream every row of `src` onto the end of this column.
    pub fn extend_from(&mut self, src: &InputColumn) -> Result<usize> {
        let mut count = 0;
        for batch in src.batches() {
            count += self.core.extend(batch?)?;
        }
        Ok(count)
    }

    /// Rows appended so far.
    pub fn written(&self) -> usize {
        self.core.pos
    }

    pub(crate) fn reserve(&mut self, size: usize) -> Result<()> {
        self.core.reserve(size)
    }

    pub(crate) fn complete(&mut self) -> Result<()> {
        self.core.complete()
    }
}
