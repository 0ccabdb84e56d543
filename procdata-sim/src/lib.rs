// Plays the host side of a proc invocation, for tests and local runs.
//
// A Simulator lays out input column files exactly as the host would, creates
// empty files for every output column, and writes a control file naming all
// of them. After the proc has run, the returned SimRun reads back the
// results manifest, the status file and any output column the way the host
// does: read-only, trusting only the file lengths the proc left behind.

use std::path::{Path, PathBuf};

use procdata_base::{fail, ErrorKind, Result};
use procdata_coldb::{ColumnType, InputColumn, Value};
use procdata_mmap::{Dict, MappedBuffer, Reader, Writer};
use tracing::debug;


/// Control file version written unless [`Simulator::with_version`] says otherwise.
pub const DEFAULT_VERSION: u64 = 2;

#[derive(Clone, Debug)]
pub struct SimColumn {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    /// Rows for an input column; `None` marks an output column.
    pub values: Option<Vec<Option<Value>>>,
}

impl SimColumn {
    pub fn input(
        name: impl Into<String>,
        ty: ColumnType,
        nullable: bool,
        values: Vec<Option<Value>>,
    ) -> Self {
        SimColumn { name: name.into(), ty, nullable, values: Some(values) }
    }

    pub fn output(name: impl Into<String>, ty: ColumnType, nullable: bool) -> Self {
        SimColumn { name: name.into(), ty, nullable, values: None }
    }
}

#[derive(Clone, Debug)]
pub struct SimTable {
    pub name: String,
    pub columns: Vec<SimColumn>,
}

impl SimTable {
    pub fn new(name: impl Into<String>, columns: Vec<SimColumn>) -> Self {
        SimTable { name: name.into(), columns }
    }
}

/// Where one column's files live. An absent file is recorded as an empty
/// path in the control file.
#[derive(Clone, Debug, Default)]
pub struct SimPaths {
    pub data: PathBuf,
    pub nulls: Option<PathBuf>,
    pub var: Option<PathBuf>,
}

pub struct Simulator {
    dir: PathBuf,
    version: u64,
    request_info: Dict,
    params: Dict,
    bin_params: Dict,
    inputs: Vec<SimTable>,
    outputs: Vec<SimTable>,
}

fn path_str(path: Option<&Path>) -> String {
    path.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default()
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut buf = MappedBuffer::open(path, true)?;
    buf.remap(Some(0))?;
    buf.write(bytes, false)?;
    buf.truncate()?;
    buf.flush()
}

// Encode rows into the three files the host would hand over.
fn encode_column(col: &SimColumn, rows: &[Option<Value>]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let codec = col.ty.codec();
    let mut data = vec![0_u8; rows.len() * codec.width];
    let mut nulls = Vec::with_capacity(rows.len());
    let mut var = Vec::new();
    for (row, val) in rows.iter().enumerate() {
        if val.is_none() && !col.nullable {
            return fail(
                ErrorKind::Type,
                format!("null row {} in non-nullable column {}", row, col.name),
            );
        }
        nulls.push(u8::from(val.is_none()));
        if codec.is_var() {
            let start = row * 8;
            data[start..start + 8].copy_from_slice(&(var.len() as u64).to_le_bytes());
            if let Some(v) = val {
                var.extend_from_slice(codec.var_payload(v)?);
                if codec.is_terminated() {
                    var.push(0);
                }
            }
        } else if let Some(v) = val {
            codec.encode(&mut data, row, v)?;
        }
    }
    Ok((data, nulls, var))
}

impl Simulator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Simulator {
            dir: dir.into(),
            version: DEFAULT_VERSION,
            request_info: Dict::new(),
            params: Dict::new(),
            bin_params: Dict::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Any number is written as-is, so unsupported versions can be staged.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_request_info(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.request_info.insert(k.into(), v.into());
        self
    }

    pub fn with_param(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.params.insert(k.into(), v.into());
        self
    }

    pub fn with_bin_param(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.bin_params.insert(k.into(), v.into());
        self
    }

    pub fn add_input(mut self, table: SimTable) -> Self {
        self.inputs.push(table);
        self
    }

    pub fn add_output(mut self, table: SimTable) -> Self {
        self.outputs.push(table);
        self
    }

    fn stage_column(&self, side: &str, t: usize, c: usize, col: &SimColumn) -> Result<SimPaths> {
        let base = self.dir.join(format!("{}_{}_{}", side, t, c));
        let paths = SimPaths {
            data: base.with_extension("data"),
            nulls: col.nullable.then(|| base.with_extension("nulls")),
            var: col.ty.is_var().then(|| base.with_extension("var")),
        };
        let (data, nulls, var) = match &col.values {
            Some(rows) => encode_column(col, rows)?,
            None => Default::default(),
        };
        write_file(&paths.data, &data)?;
        if let Some(path) = &paths.nulls {
            write_file(path, &nulls)?;
        }
        if let Some(path) = &paths.var {
            write_file(path, &var)?;
        }
        Ok(paths)
    }

    fn write_dataset(
        &self,
        w: &mut impl Writer,
        side: &str,
        tables: &[SimTable],
    ) -> Result<Vec<Vec<SimPaths>>> {
        let mut staged = Vec::new();
        w.write_u64(tables.len() as u64)?;
        for (t, table) in tables.iter().enumerate() {
            w.write_string(&table.name)?;
            w.write_u64(table.columns.len() as u64)?;
            let mut cols = Vec::new();
            for (c, col) in table.columns.iter().enumerate() {
                let paths = self.stage_column(side, t, c, col)?;
                w.write_string(&col.name)?;
                w.write_u64(col.ty.code())?;
                w.write_string(&path_str(Some(paths.data.as_path())))?;
                w.write_string(&path_str(paths.nulls.as_deref()))?;
                w.write_string(&path_str(paths.var.as_deref()))?;
                cols.push(paths);
            }
            staged.push(cols);
        }
        Ok(staged)
    }

    /// Lay out every file and the control file naming them.
    pub fn write(&self) -> Result<SimRun> {
        let control_file = self.dir.join("control.pcf");
        let results_file = self.dir.join("results.bin");
        let status_file = (self.version >= 2).then(|| self.dir.join("status.bin"));

        let mut w = MappedBuffer::open(&control_file, true)?;
        w.remap(Some(0))?;
        w.write_u64(self.version)?;
        w.write_dict(&self.request_info)?;
        // The legacy request-info map; nothing to overlay.
        w.write_dict(&Dict::new())?;
        w.write_dict(&self.params)?;
        w.write_dict(&self.bin_params)?;
        self.write_dataset(&mut w, "in", &self.inputs)?;
        let outputs = self.write_dataset(&mut w, "out", &self.outputs)?;
        w.write_string(&path_str(Some(results_file.as_path())))?;
        if let Some(path) = &status_file {
            w.write_string(&path_str(Some(path.as_path())))?;
            write_file(path, &[])?;
        }
        w.truncate()?;
        w.flush()?;
        write_file(&results_file, &[])?;
        debug!(control = %control_file.display(), version = self.version, "wrote control file");

        let outputs = self
            .outputs
            .iter()
            .zip(outputs)
            .map(|(table, paths)| (table.clone(), paths))
            .collect();
        Ok(SimRun { control_file, results_file, status_file, outputs })
    }
}

/// The files of one staged invocation.
#[derive(Debug)]
pub struct SimRun {
    pub control_file: PathBuf,
    pub results_file: PathBuf,
    pub status_file: Option<PathBuf>,
    outputs: Vec<(SimTable, Vec<SimPaths>)>,
}

impl SimRun {
    /// The host considers a proc finished once its results file is non-empty.
    pub fn is_complete(&self) -> Result<bool> {
        Ok(std::fs::metadata(&self.results_file)?.len() > 0)
    }

    pub fn read_results(&self) -> Result<(Dict, Dict)> {
        let mut rd = MappedBuffer::open(&self.results_file, false)?;
        let version = rd.read_u64()?;
        if version != 1 {
            return fail(ErrorKind::Format, format!("unexpected results version {}", version));
        }
        let results = rd.read_dict()?;
        let bin_results = rd.read_dict()?;
        Ok((results, bin_results))
    }

    /// Decode an output column from the files the proc left behind.
    pub fn read_output(&self, table: &str, column: &str) -> Result<Vec<Option<Value>>> {
        for (t, paths) in self.outputs.iter() {
            if t.name != table {
                continue;
            }
            for (col, paths) in t.columns.iter().zip(paths) {
                if col.name == column {
                    let col = InputColumn::attach(
                        column,
                        col.ty,
                        Some(paths.data.as_path()),
                        paths.nulls.as_deref(),
                        paths.var.as_deref(),
                    )?;
                    return col.get_slice(..);
                }
            }
        }
        fail(ErrorKind::Key, format!("no output column {}.{}", table, column))
    }

    /// The last status the proc published, if any.
    pub fn read_status(&self) -> Result<Option<String>> {
        let Some(path) = &self.status_file else {
            return Ok(None);
        };
        let mut rd = MappedBuffer::open(path, false)?;
        if rd.is_empty() {
            return Ok(None);
        }
        rd.lock(false)?;
        let res = rd.read_string();
        rd.unlock()?;
        res.map(Some)
    }
}
