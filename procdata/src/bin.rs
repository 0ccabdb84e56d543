use std::process::ExitCode;

use procdata::{copy_tables, Result, Session};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn run() -> Result<()> {
    let mut session = Session::from_env()?;
    session.set_status("copying")?;
    copy_tables(&mut session)?;
    session.set_status("done")?;
    session.complete()
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("proc failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
