use std::collections::BTreeMap;

use procdata_base::{fail, ErrorKind, Result};
use procdata_mmap::Reader;
use tracing::debug;

use crate::column::{ColumnRecord, InputColumn, OutputColumn};

/// An ordered, name-indexed set of columns sharing a row count.
#[derive(Debug)]
pub struct Table<C> {
    name: String,
    columns: Vec<C>,
    by_name: BTreeMap<String, usize>,
    size: usize,
}

pub type InputTable = Table<InputColumn>;
pub type OutputTable = Table<OutputColumn>;

impl<C: ColumnRecord> Table<C> {
    /// Parse a table record: name, column count, then each column record.
    pub fn read_from(rd: &mut impl Reader) -> Result<Self> {
        let name = rd.read_string()?;
        let count = rd.read_u64()?;
        let mut columns = Vec::new();
        for _ in 0..count {
            columns.push(C::read_from(rd)?);
        }
        Ok(Table::new(name, columns))
    }

    /// The row count starts as the shortest column's, or 0 with no columns.
    /// On a name collision the later column wins the name lookup.
    pub fn new(name: impl Into<String>, columns: Vec<C>) -> Self {
        let name = name.into();
        let by_name = columns.iter().enumerate().map(|(i, c)| (c.name().to_owned(), i)).collect();
        let size = columns.iter().map(|c| c.size()).min().unwrap_or(0);
        debug!(table = %name, columns = columns.len(), size, "loaded table");
        Table { name, columns, by_name, size }
    }
}

impl<C> Table<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        match self.by_name.get(name) {
            Some(i) => Ok(*i),
            None => fail(ErrorKind::Key, format!("no column {} in table {}", name, self.name)),
        }
    }

    pub fn column(&self, index: usize) -> Result<&C> {
        match self.columns.get(index) {
            Some(c) => Ok(c),
            None => fail(
                ErrorKind::Range,
                format!("column {} out of range for table {}", index, self.name),
            ),
        }
    }

    pub fn column_by_name(&self, name: &str) -> Result<&C> {
        let i = self.index_of(name)?;
        self.column(i)
    }

    pub fn columns(&self) -> &[C] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        self.columns.iter()
    }

    pub fn column_mut(&mut self, index: usize) -> Result<&mut C> {
        let name = &self.name;
        match self.columns.get_mut(index) {
            Some(c) => Ok(c),
            None => fail(
                ErrorKind::Range,
                format!("column {} out of range for table {}", index, name),
            ),
        }
    }

    pub fn column_by_name_mut(&mut self, name: &str) -> Result<&mut C> {
        let i = self.index_of(name)?;
        self.column_mut(i)
    }

    pub fn columns_mut(&mut self) -> &mut [C] {
        &mut self.columns
    }
}

impl<'a, C> IntoIterator for &'a Table<C> {
    type Item = &'a C;
    type IntoIter = std::slice::Iter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

impl OutputTable {
    /// Size every column for `size` rows. Meant to happen once, before any
    /// writes; payload offsets already written are not carried over.
    pub fn set_size(&mut self, size: i64) -> Result<()> {
        let Ok(size) = usize::try_from(size) else {
            return fail(
                ErrorKind::Validation,
                format!("invalid size {} for table {}", size, self.name),
            );
        };
        for column in self.columns.iter_mut() {
            column.reserve(size)?;
        }
        self.size = size;
        debug!(table = %self.name, size, "sized output table");
        Ok(())
    }

    pub(crate) fn complete(&mut self) -> Result<()> {
        for column in self.columns.iter_mut() {
            column.complete()?;
        }
        Ok(())
    }
}
