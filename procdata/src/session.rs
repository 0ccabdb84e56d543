use std::path::{Path, PathBuf};

use procdata_base::Result;
use procdata_coldb::{InputDataset, OutputDataset};
use procdata_mmap::{Dict, MappedBuffer, Writer};
use tracing::{debug, info};

use crate::{
    config::SessionConfig,
    manifest::{Manifest, ManifestVersion, RESULTS_VERSION},
};

/// The proc's whole view of one host request.
///
/// Build one at entry and hand it to whatever needs it. [`Session::complete`]
/// consumes it, so a session cannot be completed twice and nothing can be
/// written through it afterwards.
#[derive(Debug)]
pub struct Session {
    version: ManifestVersion,
    request_info: Dict,
    params: Dict,
    bin_params: Dict,
    input: InputDataset,
    output: OutputDataset,
    results_path: PathBuf,
    status_file: Option<MappedBuffer>,
    status: String,
    results: Dict,
    bin_results: Dict,
}

impl Session {
    /// Read the control file and attach every column it names. Any failure
    /// drops whatever was already mapped.
    pub fn open(config: &SessionConfig) -> Result<Self> {
        let mut control = MappedBuffer::open(&config.control_file, false)?;
        let manifest = Manifest::read(&mut control)?;
        control.unmap();
        let status_file = match &manifest.status_path {
            Some(path) => Some(MappedBuffer::open(path, true)?),
            None => None,
        };
        info!(
            control = %config.control_file.display(),
            version = ?manifest.version,
            input_tables = manifest.input.len(),
            output_tables = manifest.output.len(),
            "opened session"
        );
        Ok(Session {
            version: manifest.version,
            request_info: manifest.request_info,
            params: manifest.params,
            bin_params: manifest.bin_params,
            input: manifest.input,
            output: manifest.output,
            results_path: manifest.results_path,
            status_file,
            status: String::new(),
            results: Dict::new(),
            bin_results: Dict::new(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Session::open(&SessionConfig::from_env()?)
    }

    pub fn version(&self) -> ManifestVersion {
        self.version
    }

    pub fn request_info(&self) -> &Dict {
        &self.request_info
    }

    pub fn params(&self) -> &Dict {
        &self.params
    }

    pub fn bin_params(&self) -> &Dict {
        &self.bin_params
    }

    pub fn input_data(&self) -> &InputDataset {
        &self.input
    }

    pub fn output_data(&self) -> &OutputDataset {
        &self.output
    }

    pub fn output_data_mut(&mut self) -> &mut OutputDataset {
        &mut self.output
    }

    /// Both sides at once, for copying input into output.
    pub fn datasets_mut(&mut self) -> (&InputDataset, &mut OutputDataset) {
        (&self.input, &mut self.output)
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn results(&self) -> &Dict {
        &self.results
    }

    pub fn results_mut(&mut self) -> &mut Dict {
        &mut self.results
    }

    pub fn bin_results(&self) -> &Dict {
        &self.bin_results
    }

    pub fn bin_results_mut(&mut self) -> &mut Dict {
        &mut self.bin_results
    }

    /// The last status set, whether or not the host is listening.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Publish a status string for the host to poll. Each write happens
    /// under an exclusive lock so the host never reads a torn string.
    pub fn set_status(&mut self, status: &str) -> Result<()> {
        self.status = status.to_owned();
        let Some(file) = &mut self.status_file else {
            return Ok(());
        };
        file.lock(true)?;
        let res = file.seek(0).and_then(|()| file.write_string(status));
        file.unlock()?;
        res?;
        debug!(status, "published status");
        Ok(())
    }

    /// Finalize every output column and write the results manifest. This
    /// must be the last thing a proc does.
    pub fn complete(mut self) -> Result<()> {
        self.output.complete()?;
        let mut results = MappedBuffer::open(&self.results_path, true)?;
        results.write_u64(RESULTS_VERSION)?;
        results.write_dict(&self.results)?;
        results.write_dict(&self.bin_results)?;
        results.truncate()?;
        results.flush()?;
        info!(
            results = %self.results_path.display(),
            entries = self.results.len(),
            bin_entries = self.bin_results.len(),
            "completed session"
        );
        Ok(())
    }
}
