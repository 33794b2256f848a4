//! Simulation configuration

use serde::{Deserialize, Serialize};

use cosim_core::{CosimError, CosimResult, SimTime, TimeUnit};
use cosim_federate::Federate;
use cosim_time::VirtualClock;

use crate::{SimWorld, SyncScheduler};

/// Simulation configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Resolution to switch to before the run; `None` keeps nanoseconds
    pub resolution: Option<TimeUnit>,
    /// Stop the run at this time; `None` runs until the queue is empty
    pub stop_time: Option<String>,
    /// Last time an in-process federate will grant
    pub federate_end_time: Option<String>,
    /// Emit JSON log lines
    pub json_logs: bool,
}

impl SimulationConfig {
    pub fn from_json(text: &str) -> CosimResult<Self> {
        serde_json::from_str(text).map_err(|e| CosimError::InvalidConfig(e.to_string()))
    }

    pub fn to_json(&self) -> CosimResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CosimError::InvalidConfig(e.to_string()))
    }

    /// Configuration for a run bounded at `stop_time`
    pub fn bounded(stop_time: &str) -> Self {
        SimulationConfig {
            stop_time: Some(stop_time.to_string()),
            ..Default::default()
        }
    }

    /// Set the resolution and stop time on an idle scheduler
    pub fn apply<W: SimWorld, F: Federate>(
        &self,
        scheduler: &mut SyncScheduler<W, F>,
    ) -> CosimResult<()> {
        if let Some(unit) = self.resolution {
            scheduler.set_resolution(unit)?;
        }
        if let Some(stop) = &self.stop_time {
            let at = scheduler.clock().parse(stop)?;
            scheduler.stop_at(at)?;
        }
        Ok(())
    }

    /// Federate end time expressed in whole `unit`s
    pub fn federate_end(&self, clock: &VirtualClock, unit: TimeUnit) -> CosimResult<Option<u64>> {
        let Some(text) = &self.federate_end_time else {
            return Ok(None);
        };
        let end: SimTime = clock.parse(text)?;
        u64::try_from(clock.to_integer(end, unit))
            .map(Some)
            .map_err(|_| CosimError::InvalidConfig(format!("negative federate end time {text:?}")))
    }
}
