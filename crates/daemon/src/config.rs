use std::path::PathBuf;
use std::time::Duration;

use pulse_core::config::EngineConfig;

/// How often each background job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCadences {
    pub task_tick: Duration,
    pub stage_runner: Duration,
    pub health_sweep: Duration,
    pub distribution: Duration,
    pub decay: Duration,
    pub daily_publish: Duration,
}

impl Default for JobCadences {
    fn default() -> Self {
        Self {
            task_tick: Duration::from_secs(30),
            stage_runner: Duration::from_secs(30),
            health_sweep: Duration::from_secs(3600),
            distribution: Duration::from_secs(6 * 3600),
            decay: Duration::from_secs(3600),
            daily_publish: Duration::from_secs(24 * 3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub listen: String,
    /// SQLite file; `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    pub admin_secret: String,
    pub jobs_enabled: bool,
    pub cadences: JobCadences,
    pub engine: EngineConfig,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}
