pub mod create;
pub mod list;
pub mod logs;
pub mod remove;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use tend_core::Supervisor;

use crate::config::TendConfig;

/// Open a supervisor over the configured data directory with every
/// persisted daemon registered.
async fn open_supervisor(config: &TendConfig) -> Result<Supervisor> {
    let supervisor = Supervisor::new(config.supervisor_config());
    supervisor.load().await.with_context(|| {
        format!(
            "Failed to load daemons from {}",
            config.data_dir.display()
        )
    })?;
    Ok(supervisor)
}
