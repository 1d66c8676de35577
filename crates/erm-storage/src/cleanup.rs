//! Offline cleanup batch: deletes manually created missions while preserving
//! generated ones. Runs Scan -> Classify -> Act once per invocation; each
//! deletion is attempted independently so one failure never aborts the batch.

use crate::{MissionStore, StorageError};
use erm_core::{partition_by_origin, Mission, MissionOrigin};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct FailedDeletion {
    pub id: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub scanned: usize,
    pub automatic: Vec<Mission>,
    pub manual: Vec<Mission>,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDeletion>,
    /// Collection size re-read after the deletion pass; `None` when the batch
    /// ended as a no-op before acting.
    pub remaining: Option<usize>,
}

impl CleanupReport {
    pub fn was_noop(&self) -> bool {
        self.manual.is_empty()
    }

    /// `Some(false)` means the post-run count differs from the automatic set,
    /// which the caller should surface as a warning, not an error.
    pub fn residual_matches(&self) -> Option<bool> {
        self.remaining
            .map(|remaining| remaining == self.automatic.len())
    }
}

/// Preflight check used before running the batch for real.
pub fn has_manual_missions(store: &MissionStore) -> Result<bool, StorageError> {
    Ok(store
        .missions()?
        .iter()
        .any(|mission| mission.origin() == MissionOrigin::Manual))
}

pub fn clean_manual_missions(store: &MissionStore) -> Result<CleanupReport, StorageError> {
    // Scan
    let missions = store.missions()?;
    let mut report = CleanupReport {
        scanned: missions.len(),
        ..Default::default()
    };
    if missions.is_empty() {
        info!("missions collection is empty, nothing to clean");
        return Ok(report);
    }

    // Classify
    let (automatic, manual) = partition_by_origin(missions);
    info!(
        automatic = automatic.len(),
        manual = manual.len(),
        "classified missions"
    );
    report.automatic = automatic;
    report.manual = manual;
    if report.manual.is_empty() {
        info!("no manual missions found, nothing to delete");
        return Ok(report);
    }

    // Act: sequential, one record per failure
    for mission in &report.manual {
        match store.delete_mission(&mission.id) {
            Ok(()) => {
                info!(mission_id = %mission.id, name = %mission.name, "deleted manual mission");
                report.deleted.push(mission.id.clone());
            }
            Err(err) => {
                warn!(
                    mission_id = %mission.id,
                    error = %err,
                    "failed to delete mission, skipping"
                );
                report.failed.push(FailedDeletion {
                    id: mission.id.clone(),
                    name: mission.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    // Verify: no rollback, a mismatch is only reported
    let remaining = store.missions()?.len();
    report.remaining = Some(remaining);
    if remaining != report.automatic.len() {
        warn!(
            remaining,
            expected = report.automatic.len(),
            "residual mission count does not match the automatic set"
        );
    }

    Ok(report)
}
