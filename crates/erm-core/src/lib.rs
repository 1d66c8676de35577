use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub mod document;
pub mod enrich;

/// Tag written into `generatedBy` by the internal mission generator.
pub const AUTO_GENERATOR_TAG: &str = "AutoMissionGeneratorService";

/// A risk-assessment engagement, the primary aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: MissionStatus,
    #[serde(default, rename = "assignedTo")]
    pub assigned_to: Vec<String>,
    #[serde(default, rename = "organizationContext")]
    pub organization_context: Option<Value>,
    #[serde(default, rename = "isAutoGenerated")]
    pub is_auto_generated: bool,
    #[serde(default, rename = "generatedBy")]
    pub generated_by: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    /// The automatic/manual predicate. Every consumer (cleanup batch,
    /// preflight check, CLI) must go through here rather than re-deriving
    /// it from the flags.
    pub fn origin(&self) -> MissionOrigin {
        if self.is_auto_generated || self.generated_by.as_deref() == Some(AUTO_GENERATOR_TAG) {
            MissionOrigin::Automatic
        } else {
            MissionOrigin::Manual
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissionOrigin {
    Automatic,
    Manual,
}

impl MissionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionOrigin::Automatic => "automatic",
            MissionOrigin::Manual => "manual",
        }
    }
}

impl fmt::Display for MissionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits missions into (automatic, manual), preserving input order.
pub fn partition_by_origin(missions: Vec<Mission>) -> (Vec<Mission>, Vec<Mission>) {
    missions
        .into_iter()
        .partition(|mission| mission.origin() == MissionOrigin::Automatic)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

impl Default for MissionStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Draft => "draft",
            MissionStatus::Active => "active",
            MissionStatus::Completed => "completed",
            MissionStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "draft" => Ok(MissionStatus::Draft),
            "active" => Ok(MissionStatus::Active),
            "completed" => Ok(MissionStatus::Completed),
            "archived" => Ok(MissionStatus::Archived),
            other => Err(format!("Unknown status: {other}")),
        }
    }
}

/// Fields supplied by the caller when creating a mission. Identifier and
/// timestamps are always assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<MissionStatus>,
    #[serde(default, rename = "assignedTo")]
    pub assigned_to: Vec<String>,
    #[serde(default, rename = "organizationContext")]
    pub organization_context: Option<Value>,
    #[serde(default, rename = "isAutoGenerated")]
    pub is_auto_generated: bool,
    #[serde(default, rename = "generatedBy")]
    pub generated_by: Option<String>,
}

/// Partial mission update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<MissionStatus>,
    #[serde(default, rename = "assignedTo")]
    pub assigned_to: Option<Vec<String>>,
    #[serde(default, rename = "organizationContext")]
    pub organization_context: Option<Value>,
    #[serde(default, rename = "isAutoGenerated")]
    pub is_auto_generated: Option<bool>,
    #[serde(default, rename = "generatedBy")]
    pub generated_by: Option<String>,
}

/// A mitigation record attached to a mission. `mission_id` is a plain
/// foreign reference; integrity is not enforced at this layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityMeasure {
    pub id: String,
    #[serde(rename = "missionId")]
    pub mission_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "controlType")]
    pub control_type: Option<String>,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityMeasureInput {
    #[serde(rename = "missionId")]
    pub mission_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "controlType")]
    pub control_type: Option<String>,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// Partial measure update. `extra` entries are merged key by key into the
/// stored map; other absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityMeasurePatch {
    #[serde(default, rename = "missionId")]
    pub mission_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "controlType")]
    pub control_type: Option<String>,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// Canonical form for user-id sets: sorted, deduplicated.
pub fn canonical_user_set(user_ids: Vec<String>) -> Vec<String> {
    user_ids
        .into_iter()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}
