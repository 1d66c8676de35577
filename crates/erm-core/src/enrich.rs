//! Pre-write enrichment seam for security measures. The store calls the hook
//! before persisting; a failing hook aborts the write entirely.

use crate::{SecurityMeasureInput, SecurityMeasurePatch};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("enrichment failed: {reason}")]
pub struct EnrichmentError {
    pub reason: String,
}

impl EnrichmentError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Opaque `enrich(record) -> record` collaborator. Implementations must not
/// mutate anything besides the returned value.
pub trait MeasureEnrichment {
    fn enrich_new(
        &self,
        measure: SecurityMeasureInput,
    ) -> Result<SecurityMeasureInput, EnrichmentError>;

    fn enrich_update(
        &self,
        patch: SecurityMeasurePatch,
    ) -> Result<SecurityMeasurePatch, EnrichmentError>;
}

/// Identity hook, used when no enrichment collaborator is wired in.
pub struct PassthroughEnrichment;

impl MeasureEnrichment for PassthroughEnrichment {
    fn enrich_new(
        &self,
        measure: SecurityMeasureInput,
    ) -> Result<SecurityMeasureInput, EnrichmentError> {
        Ok(measure)
    }

    fn enrich_update(
        &self,
        patch: SecurityMeasurePatch,
    ) -> Result<SecurityMeasurePatch, EnrichmentError> {
        Ok(patch)
    }
}
