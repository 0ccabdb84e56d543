use std::path::PathBuf;

use procdata_base::{fail, ErrorKind, Result};

/// The one variable the host sets when launching a proc.
pub const CONTROL_FILE_VAR: &str = "KINETICA_PCF";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub control_file: PathBuf,
}

impl SessionConfig {
    pub fn new(control_file: impl Into<PathBuf>) -> Self {
        SessionConfig { control_file: control_file.into() }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Like [`SessionConfig::from_env`] but reading through `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        match lookup(CONTROL_FILE_VAR) {
            Some(path) if !path.is_empty() => Ok(SessionConfig::new(path)),
            _ => fail(
                ErrorKind::Configuration,
                format!("no control file specified in {}", CONTROL_FILE_VAR),
            ),
        }
    }
}
