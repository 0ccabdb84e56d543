use std::path::PathBuf;

use procdata_base::{fail, ErrorKind, Result};
use procdata_coldb::{InputDataset, OutputDataset};
use procdata_mmap::{Dict, Reader};
use tracing::debug;

/// Version tag written at the head of the results manifest.
pub const RESULTS_VERSION: u64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ManifestVersion {
    V1,
    /// Adds the status file path at the end.
    V2,
}

impl ManifestVersion {
    pub fn from_u64(v: u64) -> Result<Self> {
        match v {
            1 => Ok(ManifestVersion::V1),
            2 => Ok(ManifestVersion::V2),
            _ => fail(ErrorKind::Configuration, format!("unrecognized control file version {}", v)),
        }
    }

    pub fn to_u64(self) -> u64 {
        match self {
            ManifestVersion::V1 => 1,
            ManifestVersion::V2 => 2,
        }
    }
}

/// Everything in a control file, with every column already attached.
#[derive(Debug)]
pub struct Manifest {
    pub version: ManifestVersion,
    pub request_info: Dict,
    pub params: Dict,
    pub bin_params: Dict,
    pub input: InputDataset,
    pub output: OutputDataset,
    pub results_path: PathBuf,
    pub status_path: Option<PathBuf>,
}

// Control file layout, all little-endian:
//
//   u64      version (1 or 2)
//   dict     request info
//   dict     legacy request info, overlaid onto the above
//   dict     params
//   dict     binary params
//   dataset  input:  u64 table count, then tables
//   dataset  output: same shape
//   string   results manifest path
//   string   status file path (version 2 only)

impl Manifest {
    pub fn read(rd: &mut impl Reader) -> Result<Self> {
        let version = ManifestVersion::from_u64(rd.read_u64()?)?;
        let mut request_info = rd.read_dict()?;
        rd.read_dict_into(&mut request_info)?;
        let params = rd.read_dict()?;
        let bin_params = rd.read_dict()?;
        let input = InputDataset::read_from("input", rd)?;
        let output = OutputDataset::read_from("output", rd)?;
        let results_path = PathBuf::from(rd.read_string()?);
        let status_path = match version {
            ManifestVersion::V1 => None,
            ManifestVersion::V2 => {
                let path = rd.read_string()?;
                (!path.is_empty()).then(|| PathBuf::from(path))
            }
        };
        debug!(
            ?version,
            input_tables = input.len(),
            output_tables = output.len(),
            results = %results_path.display(),
            "read control file"
        );
        Ok(Manifest {
            version,
            request_info,
            params,
            bin_params,
            input,
            output,
            results_path,
            status_path,
        })
    }
}
