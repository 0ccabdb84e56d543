// A proc is launched by the host with one environment variable naming a
// control file. Everything else (request metadata, parameters, the schema
// and file paths of every input and output column, where to write results
// and where to report status) comes out of that file.
//
// A proc opens one Session at entry, reads input columns, sizes and fills
// output tables, fills in the results maps and finally completes the
// session. Completion is the signal the host waits for: a proc that exits
// without completing has failed, whatever else it wrote.

mod config;
mod copy;
mod manifest;
mod session;


pub use config::{SessionConfig, CONTROL_FILE_VAR};
pub use copy::copy_tables;
pub use manifest::{Manifest, ManifestVersion, RESULTS_VERSION};
pub use session::Session;

pub use procdata_base::{Error, ErrorKind, Result};
pub use procdata_coldb::{
    ColumnType, Decimal, InputColumn, InputDataset, InputTable, OutputColumn, OutputDataset,
    OutputTable, Slice, Value,
};
pub use procdata_mmap::Dict;
