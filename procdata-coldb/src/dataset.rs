use std::collections::BTreeMap;

use procdata_base::{fail, ErrorKind, Result};
use procdata_mmap::Reader;

use crate::{
    column::{ColumnRecord, InputColumn, OutputColumn},
    table::{OutputTable, Table},
};

/// The tables on one side of a session.
#[derive(Debug)]
pub struct Dataset<C> {
    name: &'static str,
    tables: Vec<Table<C>>,
    by_name: BTreeMap<String, usize>,
}

pub type InputDataset = Dataset<InputColumn>;
pub type OutputDataset = Dataset<OutputColumn>;

impl<C: ColumnRecord> Dataset<C> {
    pub fn read_from(name: &'static str, rd: &mut impl Reader) -> Result<Self> {
        let count = rd.read_u64()?;
        let mut tables = Vec::new();
        for _ in 0..count {
            tables.push(Table::read_from(rd)?);
        }
        Ok(Dataset::new(name, tables))
    }

    pub fn new(name: &'static str, tables: Vec<Table<C>>) -> Self {
        let by_name = tables.iter().enumerate().map(|(i, t)| (t.name().to_owned(), i)).collect();
        Dataset { name, tables, by_name }
    }
}

impl<C> Dataset<C> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        match self.by_name.get(name) {
            Some(i) => Ok(*i),
            None => fail(ErrorKind::Key, format!("no table {} in {} data", name, self.name)),
        }
    }

    pub fn table(&self, index: usize) -> Result<&Table<C>> {
        match self.tables.get(index) {
            Some(t) => Ok(t),
            None => fail(
                ErrorKind::Range,
                format!("table {} out of range for {} data", index, self.name),
            ),
        }
    }

    pub fn table_by_name(&self, name: &str) -> Result<&Table<C>> {
        let i = self.index_of(name)?;
        self.table(i)
    }

    pub fn tables(&self) -> &[Table<C>] {
        &self.tables
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Table<C>> {
        self.tables.iter()
    }

    pub fn table_mut(&mut self, index: usize) -> Result<&mut Table<C>> {
        let name = self.name;
        match self.tables.get_mut(index) {
            Some(t) => Ok(t),
            None => fail(
                ErrorKind::Range,
                format!("table {} out of range for {} data", index, name),
            ),
        }
    }

    pub fn table_by_name_mut(&mut self, name: &str) -> Result<&mut Table<C>> {
        let i = self.index_of(name)?;
        self.table_mut(i)
    }

    pub fn tables_mut(&mut self) -> &mut [Table<C>] {
        &mut self.tables
    }
}

impl<'a, C> IntoIterator for &'a Dataset<C> {
    type Item = &'a Table<C>;
    type IntoIter = std::slice::Iter<'a, Table<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

impl Dataset<OutputColumn> {
    /// Finalize every output column. The session does this right before
    /// writing the results manifest.
    pub fn complete(&mut self) -> Result<()> {
        self.tables.iter_mut().try_for_each(OutputTable::complete)
    }
}
