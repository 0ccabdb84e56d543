use procdata_base::Result;
use tracing::info;

use crate::session::Session;

/// Copy each input table into the output table at the same position,
/// column by column, and echo the parameters back as results. Tables and
/// columns beyond the shorter side are left alone.
pub fn copy_tables(session: &mut Session) -> Result<()> {
    let (input, output) = session.datasets_mut();
    for (src, dst) in input.iter().zip(output.tables_mut().iter_mut()) {
        dst.set_size(src.size() as i64)?;
        for (from, to) in src.iter().zip(dst.columns_mut().iter_mut()) {
            to.extend_from(from)?;
        }
        info!(from = src.name(), to = dst.name(), rows = src.size(), "copied table");
    }
    let params = session.params().clone();
    session.results_mut().extend(params);
    let bin_params = session.bin_params().clone();
    session.bin_results_mut().extend(bin_params);
    Ok(())
}
