use chrono::{DateTime, Duration, Utc};
use erm_core::document::{measure_from_document, mission_from_document, RawDocument};
use erm_core::enrich::{EnrichmentError, MeasureEnrichment, PassthroughEnrichment};
use erm_core::{
    canonical_user_set, Mission, MissionInput, MissionPatch, MissionStatus, SecurityMeasure,
    SecurityMeasureInput, SecurityMeasurePatch,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

pub mod cleanup;

pub const STORE_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("{collection} record not found: {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },
    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

/// Document store for the `missions` and `security_measures` collections.
/// Identifiers and timestamps are always assigned here, never by callers.
pub struct MissionStore {
    conn: Connection,
    enrichment: Box<dyn MeasureEnrichment>,
}

impl MissionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            enrichment: Box::new(PassthroughEnrichment),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            enrichment: Box::new(PassthroughEnrichment),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn with_enrichment(mut self, enrichment: Box<dyn MeasureEnrichment>) -> Self {
        self.enrichment = enrichment;
        self
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let current = self.schema_version()?;
        if current > STORE_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: STORE_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_collections.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    // --- missions: queries ---

    pub fn missions(&self) -> Result<Vec<Mission>, StorageError> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions ORDER BY created_at DESC, id ASC"
        ))?;

        let rows = statement.query_map([], mission_document_from_row)?;
        let mut missions = Vec::new();
        for row in rows {
            missions.push(mission_from_document(&row?));
        }
        Ok(missions)
    }

    pub fn mission_by_id(&self, id: &str) -> Result<Option<Mission>, StorageError> {
        let doc = self
            .conn
            .query_row(
                &format!("SELECT {MISSION_COLUMNS} FROM missions WHERE id = ?1"),
                [id],
                mission_document_from_row,
            )
            .optional()?;
        Ok(doc.map(|doc| mission_from_document(&doc)))
    }

    pub fn missions_by_status(
        &self,
        status: MissionStatus,
    ) -> Result<Vec<Mission>, StorageError> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {MISSION_COLUMNS} FROM missions WHERE status = ?1 ORDER BY created_at DESC, id ASC"
        ))?;

        let rows = statement.query_map([status.as_str()], mission_document_from_row)?;
        let mut missions = Vec::new();
        for row in rows {
            missions.push(mission_from_document(&row?));
        }
        Ok(missions)
    }

    /// Missions whose assigned-user set contains `user_id`, newest first.
    /// Membership is evaluated over the canonical (deduplicated) set.
    pub fn missions_by_assigned_user(&self, user_id: &str) -> Result<Vec<Mission>, StorageError> {
        let missions = self.missions()?;
        Ok(missions
            .into_iter()
            .filter(|mission| mission.assigned_to.iter().any(|member| member == user_id))
            .collect())
    }

    // --- missions: mutations ---

    pub fn create_mission(&self, input: MissionInput) -> Result<Mission, StorageError> {
        let now = Utc::now();
        let mission = Mission {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            status: input.status.unwrap_or_default(),
            assigned_to: canonical_user_set(input.assigned_to),
            organization_context: input.organization_context,
            is_auto_generated: input.is_auto_generated,
            generated_by: input.generated_by,
            created_at: now,
            updated_at: now,
        };

        let assigned_to_json = serde_json::to_string(&mission.assigned_to)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let organization_context_json = mission
            .organization_context
            .as_ref()
            .map(|context| {
                serde_json::to_string(context)
                    .map_err(|err| StorageError::Serialization(err.to_string()))
            })
            .transpose()?;

        self.conn.execute(
            "
            INSERT INTO missions (
                id,
                name,
                description,
                status,
                assigned_to_json,
                organization_context_json,
                is_auto_generated,
                generated_by,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                mission.id,
                mission.name,
                mission.description,
                mission.status.as_str(),
                assigned_to_json,
                organization_context_json,
                if mission.is_auto_generated { 1_i64 } else { 0_i64 },
                mission.generated_by,
                mission.created_at.to_rfc3339(),
                mission.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(mission)
    }

    /// Splices `patch` into the re-read prior state. `created_at` is never
    /// touched; `updated_at` advances strictly. Fails if the record is gone,
    /// including between the read and the write.
    pub fn update_mission(&self, id: &str, patch: MissionPatch) -> Result<Mission, StorageError> {
        let Some(prior) = self.mission_by_id(id)? else {
            return Err(StorageError::NotFound {
                collection: "missions",
                id: id.to_string(),
            });
        };

        let mut mission = prior.clone();
        if let Some(name) = patch.name {
            mission.name = name;
        }
        if let Some(description) = patch.description {
            mission.description = description;
        }
        if let Some(status) = patch.status {
            mission.status = status;
        }
        if let Some(assigned_to) = patch.assigned_to {
            mission.assigned_to = canonical_user_set(assigned_to);
        }
        if let Some(context) = patch.organization_context {
            mission.organization_context = Some(context);
        }
        if let Some(flag) = patch.is_auto_generated {
            mission.is_auto_generated = flag;
        }
        if let Some(tag) = patch.generated_by {
            mission.generated_by = Some(tag);
        }
        mission.updated_at = next_update_stamp(prior.updated_at);

        let assigned_to_json = serde_json::to_string(&mission.assigned_to)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let organization_context_json = mission
            .organization_context
            .as_ref()
            .map(|context| {
                serde_json::to_string(context)
                    .map_err(|err| StorageError::Serialization(err.to_string()))
            })
            .transpose()?;

        let changes = self.conn.execute(
            "
            UPDATE missions SET
                name = ?2,
                description = ?3,
                status = ?4,
                assigned_to_json = ?5,
                organization_context_json = ?6,
                is_auto_generated = ?7,
                generated_by = ?8,
                updated_at = ?9
            WHERE id = ?1
            ",
            params![
                mission.id,
                mission.name,
                mission.description,
                mission.status.as_str(),
                assigned_to_json,
                organization_context_json,
                if mission.is_auto_generated { 1_i64 } else { 0_i64 },
                mission.generated_by,
                mission.updated_at.to_rfc3339(),
            ],
        )?;

        if changes == 0 {
            return Err(StorageError::NotFound {
                collection: "missions",
                id: id.to_string(),
            });
        }

        Ok(mission)
    }

    /// Unconditional delete; removing an absent id is not an error.
    pub fn delete_mission(&self, id: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM missions WHERE id = ?1", [id])?;
        Ok(())
    }

    // --- security measures ---

    pub fn measures_by_mission(
        &self,
        mission_id: &str,
    ) -> Result<Vec<SecurityMeasure>, StorageError> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {MEASURE_COLUMNS} FROM security_measures WHERE mission_id = ?1"
        ))?;

        let rows = statement.query_map([mission_id], measure_document_from_row)?;
        let mut measures = Vec::new();
        for row in rows {
            measures.push(measure_from_document(&row?));
        }
        Ok(measures)
    }

    pub fn measure_by_id(&self, id: &str) -> Result<Option<SecurityMeasure>, StorageError> {
        let doc = self
            .conn
            .query_row(
                &format!("SELECT {MEASURE_COLUMNS} FROM security_measures WHERE id = ?1"),
                [id],
                measure_document_from_row,
            )
            .optional()?;
        Ok(doc.map(|doc| measure_from_document(&doc)))
    }

    /// Runs the payload through the enrichment hook, then persists. A failing
    /// hook aborts before anything reaches the store.
    pub fn create_security_measure(
        &self,
        input: SecurityMeasureInput,
    ) -> Result<SecurityMeasure, StorageError> {
        let input = self.enrichment.enrich_new(input)?;

        let now = Utc::now();
        let measure = SecurityMeasure {
            id: Uuid::new_v4().to_string(),
            mission_id: input.mission_id,
            name: input.name,
            description: input.description,
            control_type: input.control_type,
            extra: input.extra,
            created_at: now,
            updated_at: now,
        };

        let extra_json = serde_json::to_string(&measure.extra)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.conn.execute(
            "
            INSERT INTO security_measures (
                id,
                mission_id,
                name,
                description,
                control_type,
                extra_json,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                measure.id,
                measure.mission_id,
                measure.name,
                measure.description,
                measure.control_type,
                extra_json,
                measure.created_at.to_rfc3339(),
                measure.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(measure)
    }

    pub fn update_security_measure(
        &self,
        id: &str,
        patch: SecurityMeasurePatch,
    ) -> Result<SecurityMeasure, StorageError> {
        let patch = self.enrichment.enrich_update(patch)?;

        let Some(prior) = self.measure_by_id(id)? else {
            return Err(StorageError::NotFound {
                collection: "security_measures",
                id: id.to_string(),
            });
        };

        let mut measure = prior.clone();
        if let Some(mission_id) = patch.mission_id {
            measure.mission_id = mission_id;
        }
        if let Some(name) = patch.name {
            measure.name = name;
        }
        if let Some(description) = patch.description {
            measure.description = description;
        }
        if let Some(control_type) = patch.control_type {
            measure.control_type = Some(control_type);
        }
        for (key, value) in patch.extra {
            measure.extra.insert(key, value);
        }
        measure.updated_at = next_update_stamp(prior.updated_at);

        let extra_json = serde_json::to_string(&measure.extra)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let changes = self.conn.execute(
            "
            UPDATE security_measures SET
                mission_id = ?2,
                name = ?3,
                description = ?4,
                control_type = ?5,
                extra_json = ?6,
                updated_at = ?7
            WHERE id = ?1
            ",
            params![
                measure.id,
                measure.mission_id,
                measure.name,
                measure.description,
                measure.control_type,
                extra_json,
                measure.updated_at.to_rfc3339(),
            ],
        )?;

        if changes == 0 {
            return Err(StorageError::NotFound {
                collection: "security_measures",
                id: id.to_string(),
            });
        }

        Ok(measure)
    }

    pub fn delete_security_measure(&self, id: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM security_measures WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        let exists = self
            .conn
            .query_row(
                "
                SELECT 1
                FROM sqlite_master
                WHERE type='table' AND name = ?1
                LIMIT 1
                ",
                [table_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }
}

const MISSION_COLUMNS: &str = "id, name, description, status, assigned_to_json, \
     organization_context_json, is_auto_generated, generated_by, created_at, updated_at";

const MEASURE_COLUMNS: &str =
    "id, mission_id, name, description, control_type, extra_json, created_at, updated_at";

fn mission_document_from_row(row: &rusqlite::Row) -> rusqlite::Result<RawDocument> {
    let mut doc = RawDocument::new(row.get::<_, String>(0)?);
    doc.fields
        .insert("name".to_string(), Value::String(row.get(1)?));
    doc.fields
        .insert("description".to_string(), Value::String(row.get(2)?));
    doc.fields
        .insert("status".to_string(), Value::String(row.get(3)?));

    let assigned_to_json: String = row.get(4)?;
    let assigned_to: Value = serde_json::from_str(&assigned_to_json)
        .map_err(|err| json_column_error(4, err))?;
    doc.fields.insert("assignedTo".to_string(), assigned_to);

    if let Some(context_json) = row.get::<_, Option<String>>(5)? {
        let context: Value =
            serde_json::from_str(&context_json).map_err(|err| json_column_error(5, err))?;
        doc.fields.insert("organizationContext".to_string(), context);
    }

    doc.fields.insert(
        "isAutoGenerated".to_string(),
        Value::Bool(row.get::<_, i64>(6)? != 0),
    );
    if let Some(generated_by) = row.get::<_, Option<String>>(7)? {
        doc.fields
            .insert("generatedBy".to_string(), Value::String(generated_by));
    }
    if let Some(created_at) = row.get::<_, Option<String>>(8)? {
        doc.fields
            .insert("createdAt".to_string(), Value::String(created_at));
    }
    if let Some(updated_at) = row.get::<_, Option<String>>(9)? {
        doc.fields
            .insert("updatedAt".to_string(), Value::String(updated_at));
    }

    Ok(doc)
}

fn measure_document_from_row(row: &rusqlite::Row) -> rusqlite::Result<RawDocument> {
    let mut doc = RawDocument::new(row.get::<_, String>(0)?);

    let extra_json: String = row.get(5)?;
    let extra: Map<String, Value> =
        serde_json::from_str(&extra_json).map_err(|err| json_column_error(5, err))?;
    doc.fields.extend(extra);

    doc.fields
        .insert("missionId".to_string(), Value::String(row.get(1)?));
    doc.fields
        .insert("name".to_string(), Value::String(row.get(2)?));
    doc.fields
        .insert("description".to_string(), Value::String(row.get(3)?));
    if let Some(control_type) = row.get::<_, Option<String>>(4)? {
        doc.fields
            .insert("controlType".to_string(), Value::String(control_type));
    }
    if let Some(created_at) = row.get::<_, Option<String>>(6)? {
        doc.fields
            .insert("createdAt".to_string(), Value::String(created_at));
    }
    if let Some(updated_at) = row.get::<_, Option<String>>(7)? {
        doc.fields
            .insert("updatedAt".to_string(), Value::String(updated_at));
    }

    Ok(doc)
}

fn json_column_error(index: usize, err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

// Store clock stamps can tie at clock resolution on immediate rewrites; nudge
// forward so updated_at stays strictly increasing per record.
fn next_update_stamp(prior: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > prior {
        now
    } else {
        prior + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn draft_input(name: &str) -> MissionInput {
        MissionInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn measure_input(mission_id: &str, name: &str) -> SecurityMeasureInput {
        SecurityMeasureInput {
            mission_id: mission_id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    struct TaggingEnrichment;

    impl MeasureEnrichment for TaggingEnrichment {
        fn enrich_new(
            &self,
            mut measure: SecurityMeasureInput,
        ) -> Result<SecurityMeasureInput, EnrichmentError> {
            measure
                .extra
                .insert("isoCategory".to_string(), json!("5.17"));
            Ok(measure)
        }

        fn enrich_update(
            &self,
            mut patch: SecurityMeasurePatch,
        ) -> Result<SecurityMeasurePatch, EnrichmentError> {
            patch.extra.insert("reviewed".to_string(), json!(true));
            Ok(patch)
        }
    }

    struct FailingEnrichment;

    impl MeasureEnrichment for FailingEnrichment {
        fn enrich_new(
            &self,
            _measure: SecurityMeasureInput,
        ) -> Result<SecurityMeasureInput, EnrichmentError> {
            Err(EnrichmentError::new("upstream model unavailable"))
        }

        fn enrich_update(
            &self,
            _patch: SecurityMeasurePatch,
        ) -> Result<SecurityMeasurePatch, EnrichmentError> {
            Err(EnrichmentError::new("upstream model unavailable"))
        }
    }

    #[test]
    fn migration_creates_both_collections() {
        let db = MissionStore::open_in_memory().expect("open db");
        for table in ["missions", "security_measures"] {
            assert!(db.table_exists(table).expect("table check"));
        }
        assert_eq!(
            db.schema_version().expect("schema version"),
            STORE_SCHEMA_VERSION
        );
    }

    #[test]
    fn refuses_future_schema_versions() {
        let db = MissionStore::open_in_memory().expect("open db");
        db.conn
            .execute("PRAGMA user_version = 99", [])
            .expect("bump version");

        match db.migrate() {
            Err(StorageError::UnsupportedSchemaVersion { found, supported }) => {
                assert_eq!(found, 99);
                assert_eq!(supported, STORE_SCHEMA_VERSION);
            }
            other => panic!("expected UnsupportedSchemaVersion, got {other:?}"),
        }
    }

    #[test]
    fn create_applies_draft_and_empty_assignment_defaults() {
        let db = MissionStore::open_in_memory().expect("open db");
        let mission = db
            .create_mission(draft_input("Pilot assessment"))
            .expect("create");

        assert!(!mission.id.is_empty());
        assert_eq!(mission.status, MissionStatus::Draft);
        assert!(mission.assigned_to.is_empty());
        assert_eq!(mission.created_at, mission.updated_at);

        let loaded = db
            .mission_by_id(&mission.id)
            .expect("lookup")
            .expect("present");
        assert_eq!(loaded, mission);
    }

    #[test]
    fn missions_are_ordered_newest_first() {
        let db = MissionStore::open_in_memory().expect("open db");
        let first = db.create_mission(draft_input("first")).expect("create");
        let second = db.create_mission(draft_input("second")).expect("create");
        let third = db.create_mission(draft_input("third")).expect("create");

        let ids: Vec<String> = db
            .missions()
            .expect("list")
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[test]
    fn status_filter_matches_exactly_and_keeps_ordering() {
        let db = MissionStore::open_in_memory().expect("open db");
        db.create_mission(draft_input("stays draft")).expect("create");
        let active_a = db
            .create_mission(MissionInput {
                status: Some(MissionStatus::Active),
                ..draft_input("active a")
            })
            .expect("create");
        let active_b = db
            .create_mission(MissionInput {
                status: Some(MissionStatus::Active),
                ..draft_input("active b")
            })
            .expect("create");

        let active = db
            .missions_by_status(MissionStatus::Active)
            .expect("filter");
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|m| m.status == MissionStatus::Active));
        assert_eq!(active[0].id, active_b.id);
        assert_eq!(active[1].id, active_a.id);

        assert!(db
            .missions_by_status(MissionStatus::Archived)
            .expect("empty filter")
            .is_empty());
    }

    #[test]
    fn assigned_user_filter_checks_set_membership() {
        let db = MissionStore::open_in_memory().expect("open db");
        let mission = db
            .create_mission(MissionInput {
                status: Some(MissionStatus::Active),
                assigned_to: vec!["u1".to_string(), "u2".to_string()],
                ..draft_input("shared mission")
            })
            .expect("create");

        let for_u1 = db.missions_by_assigned_user("u1").expect("query");
        assert_eq!(for_u1.len(), 1);
        assert_eq!(for_u1[0].id, mission.id);

        assert!(db
            .missions_by_assigned_user("u3")
            .expect("query")
            .is_empty());
    }

    #[test]
    fn update_splices_fields_and_keeps_created_at() {
        let db = MissionStore::open_in_memory().expect("open db");
        let mission = db
            .create_mission(MissionInput {
                description: "initial description".to_string(),
                ..draft_input("renamed later")
            })
            .expect("create");

        let updated = db
            .update_mission(
                &mission.id,
                MissionPatch {
                    name: Some("renamed".to_string()),
                    status: Some(MissionStatus::Active),
                    ..Default::default()
                },
            )
            .expect("update");

        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.status, MissionStatus::Active);
        assert_eq!(updated.description, "initial description");
        assert_eq!(updated.created_at, mission.created_at);
        assert!(updated.updated_at > mission.updated_at);

        let again = db
            .update_mission(
                &mission.id,
                MissionPatch {
                    description: Some("revised".to_string()),
                    ..Default::default()
                },
            )
            .expect("second update");
        assert!(again.updated_at > updated.updated_at);
        assert_eq!(again.created_at, mission.created_at);
    }

    #[test]
    fn update_fails_when_the_record_is_gone() {
        let db = MissionStore::open_in_memory().expect("open db");
        let mission = db.create_mission(draft_input("short lived")).expect("create");
        db.delete_mission(&mission.id).expect("delete");

        match db.update_mission(&mission.id, MissionPatch::default()) {
            Err(StorageError::NotFound { collection, id }) => {
                assert_eq!(collection, "missions");
                assert_eq!(id, mission.id);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn delete_is_idempotent_and_lookup_turns_absent() {
        let db = MissionStore::open_in_memory().expect("open db");
        let mission = db.create_mission(draft_input("to delete")).expect("create");

        db.delete_mission(&mission.id).expect("first delete");
        assert!(db.mission_by_id(&mission.id).expect("lookup").is_none());
        db.delete_mission(&mission.id).expect("second delete");
    }

    #[test]
    fn legacy_rows_without_timestamps_map_with_fallback() {
        let db = MissionStore::open_in_memory().expect("open db");
        let before = Utc::now();
        db.conn
            .execute(
                "INSERT INTO missions (id, name) VALUES ('legacy-1', 'Imported mission')",
                [],
            )
            .expect("raw insert");

        let loaded = db
            .mission_by_id("legacy-1")
            .expect("lookup")
            .expect("present");
        assert!(loaded.created_at >= before);
        assert!(loaded.updated_at >= before);
        assert_eq!(loaded.status, MissionStatus::Draft);
    }

    #[test]
    fn store_survives_reopen() {
        let file = NamedTempFile::new().expect("temp db");
        let mission = {
            let db = MissionStore::open(file.path()).expect("open db");
            db.create_mission(draft_input("durable")).expect("create")
        };

        let db = MissionStore::open(file.path()).expect("reopen db");
        let loaded = db
            .mission_by_id(&mission.id)
            .expect("lookup")
            .expect("present");
        assert_eq!(loaded, mission);
    }

    #[test]
    fn measure_create_applies_hook_output() {
        let db = MissionStore::open_in_memory()
            .expect("open db")
            .with_enrichment(Box::new(TaggingEnrichment));

        let measure = db
            .create_security_measure(measure_input("m-1", "MFA"))
            .expect("create");
        assert_eq!(measure.extra.get("isoCategory"), Some(&json!("5.17")));

        let stored = db.measures_by_mission("m-1").expect("query");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].extra.get("isoCategory"), Some(&json!("5.17")));
    }

    #[test]
    fn failing_hook_persists_nothing() {
        let db = MissionStore::open_in_memory()
            .expect("open db")
            .with_enrichment(Box::new(FailingEnrichment));

        match db.create_security_measure(measure_input("m-1", "MFA")) {
            Err(StorageError::Enrichment(err)) => {
                assert_eq!(err.reason, "upstream model unavailable");
            }
            other => panic!("expected Enrichment error, got {other:?}"),
        }
        assert!(db.measures_by_mission("m-1").expect("query").is_empty());
    }

    #[test]
    fn measure_update_merges_extra_and_advances_updated_at() {
        let db = MissionStore::open_in_memory().expect("open db");
        let measure = db
            .create_security_measure(SecurityMeasureInput {
                extra: [("effectiveness".to_string(), json!(2))].into_iter().collect(),
                ..measure_input("m-1", "Segmentation")
            })
            .expect("create");

        let updated = db
            .update_security_measure(
                &measure.id,
                SecurityMeasurePatch {
                    description: Some("zoned networks".to_string()),
                    extra: [("effectiveness".to_string(), json!(4))].into_iter().collect(),
                    ..Default::default()
                },
            )
            .expect("update");

        assert_eq!(updated.mission_id, "m-1");
        assert_eq!(updated.description, "zoned networks");
        assert_eq!(updated.extra.get("effectiveness"), Some(&json!(4)));
        assert_eq!(updated.created_at, measure.created_at);
        assert!(updated.updated_at > measure.updated_at);

        match db.update_security_measure("missing", SecurityMeasurePatch::default()) {
            Err(StorageError::NotFound { collection, .. }) => {
                assert_eq!(collection, "security_measures");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn measures_outlive_their_mission() {
        let db = MissionStore::open_in_memory().expect("open db");
        let mission = db.create_mission(draft_input("doomed")).expect("create");
        db.create_security_measure(measure_input(&mission.id, "Logging"))
            .expect("create measure");

        db.delete_mission(&mission.id).expect("delete mission");
        assert_eq!(db.measures_by_mission(&mission.id).expect("query").len(), 1);

        let measure_id = db.measures_by_mission(&mission.id).expect("query")[0]
            .id
            .clone();
        db.delete_security_measure(&measure_id).expect("delete");
        db.delete_security_measure(&measure_id)
            .expect("idempotent delete");
        assert!(db.measure_by_id(&measure_id).expect("lookup").is_none());
    }
}
