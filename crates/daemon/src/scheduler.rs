use std::sync::Arc;
use std::time::Duration;

use pulse_core::{now_ms, EpochMs, Result};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::JobCadences;
use crate::state::Engine;

/// Background jobs. Each runs on its own interval, independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    TaskTick,
    StageRunner,
    HealthSweep,
    ReferenceDistribution,
    Decay,
    DailyPublish,
}

impl Job {
    pub const ALL: [Job; 6] = [
        Job::TaskTick,
        Job::StageRunner,
        Job::HealthSweep,
        Job::ReferenceDistribution,
        Job::Decay,
        Job::DailyPublish,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Job::TaskTick => "task_tick",
            Job::StageRunner => "stage_runner",
            Job::HealthSweep => "health_sweep",
            Job::ReferenceDistribution => "reference_distribution",
            Job::Decay => "decay",
            Job::DailyPublish => "daily_publish",
        }
    }

    pub fn cadence(self, c: &JobCadences) -> Duration {
        match self {
            Job::TaskTick => c.task_tick,
            Job::StageRunner => c.stage_runner,
            Job::HealthSweep => c.health_sweep,
            Job::ReferenceDistribution => c.distribution,
            Job::Decay => c.decay,
            Job::DailyPublish => c.daily_publish,
        }
    }

    /// One synchronous run.
    pub fn run(self, engine: &Engine, now: EpochMs) -> Result<()> {
        let cfg = &engine.config;
        match self {
            Job::TaskTick => {
                engine.tasks.tick(now)?;
            }
            Job::StageRunner => {
                engine
                    .orchestrator
                    .run_due_stages(now, cfg.pipeline.stage_batch_size)?;
            }
            Job::HealthSweep => {
                engine.health.sweep(now)?;
            }
            Job::ReferenceDistribution => {
                engine.distributor.run(now)?;
            }
            Job::Decay => {
                engine.popularity.decay(cfg.popularity.decay_step)?;
                let purged = engine.popularity.purge_marks(now)?;
                if purged > 0 {
                    info!(purged, "expired dedup markers purged");
                }
            }
            Job::DailyPublish => {
                engine
                    .popularity
                    .publish_batch(cfg.popularity.daily_batch_size, now)?;
            }
        }
        Ok(())
    }
}

/// Spawns one loop per job. The first run happens one period after start.
pub fn spawn_jobs(engine: Arc<Engine>, cadences: &JobCadences) -> Vec<JoinHandle<()>> {
    Job::ALL
        .iter()
        .map(|&job| spawn_job(engine.clone(), job, job.cadence(cadences)))
        .collect()
}

fn spawn_job(engine: Arc<Engine>, job: Job, period: Duration) -> JoinHandle<()> {
    let period = period.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(job = job.name(), period_secs = period.as_secs(), "job scheduled");
        loop {
            tick.tick().await;
            let engine = engine.clone();
            match tokio::task::spawn_blocking(move || job.run(&engine, now_ms())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("{} tick error: {e:?}", job.name()),
                Err(e) => warn!("{} tick panicked: {e:?}", job.name()),
            }
        }
    })
}
