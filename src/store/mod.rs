//! Embedded scenario store. Records are caller-opaque JSON blobs (the deal
//! inputs and the derived summary preview); the store only round-trips them
//! and maintains identifiers and timestamps.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use ulid::Ulid;

const BOOTSTRAP_SQL: &str = include_str!("migrations/0001_bootstrap.sql");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scenario not found: {0}")]
    NotFound(String),
    #[error("datastore error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),
    #[error("stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stored timestamp is invalid: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecord {
    pub id: String,
    pub name: String,
    pub inputs: Value,
    pub derived: Value,
    pub show_derived: bool,
    pub columns: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full payload for create and full-replace updates.
#[derive(Debug, Clone)]
pub struct NewScenario {
    pub name: String,
    pub inputs: Value,
    pub derived: Value,
    pub show_derived: bool,
    pub columns: Value,
}

/// Sparse payload for partial updates; unset fields keep their stored value.
#[derive(Debug, Default, Clone)]
pub struct ScenarioPatch {
    pub name: Option<String>,
    pub inputs: Option<Value>,
    pub derived: Option<Value>,
    pub show_derived: Option<bool>,
    pub columns: Option<Value>,
}

pub struct ScenarioStore {
    conn: Connection,
}

impl ScenarioStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(conn)
    }

    fn prepare(mut conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_millis(250))?;
        Migrations::new(vec![M::up(BOOTSTRAP_SQL)]).to_latest(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn create(&self, new: NewScenario) -> StoreResult<ScenarioRecord> {
        let id = Ulid::new().to_string();
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO scenarios \
             (id, name, inputs, derived, show_derived, columns, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                new.name,
                new.inputs.to_string(),
                new.derived.to_string(),
                new.show_derived,
                new.columns.to_string(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        self.get(&id)
    }

    /// All scenarios, most recently updated first.
    pub fn list(&self) -> StoreResult<Vec<ScenarioRecord>> {
        let mut statement = self.conn.prepare(
            "SELECT id, name, inputs, derived, show_derived, columns, created_at, updated_at \
             FROM scenarios ORDER BY updated_at DESC, id DESC",
        )?;
        let rows = statement.query_map([], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }

    pub fn get(&self, id: &str) -> StoreResult<ScenarioRecord> {
        let record = self
            .conn
            .query_row(
                "SELECT id, name, inputs, derived, show_derived, columns, created_at, updated_at \
                 FROM scenarios WHERE id = ?1",
                params![id],
                record_from_row,
            )
            .optional()?;
        match record {
            Some(parsed) => parsed,
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    pub fn update_full(&self, id: &str, new: NewScenario) -> StoreResult<ScenarioRecord> {
        let now = Utc::now();
        let changed = self.conn.execute(
            "UPDATE scenarios SET name = ?2, inputs = ?3, derived = ?4, \
             show_derived = ?5, columns = ?6, updated_at = ?7 WHERE id = ?1",
            params![
                id,
                new.name,
                new.inputs.to_string(),
                new.derived.to_string(),
                new.show_derived,
                new.columns.to_string(),
                now.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.get(id)
    }

    pub fn update_partial(&self, id: &str, patch: ScenarioPatch) -> StoreResult<ScenarioRecord> {
        let existing = self.get(id)?;
        self.update_full(
            id,
            NewScenario {
                name: patch.name.unwrap_or(existing.name),
                inputs: patch.inputs.unwrap_or(existing.inputs),
                derived: patch.derived.unwrap_or(existing.derived),
                show_derived: patch.show_derived.unwrap_or(existing.show_derived),
                columns: patch.columns.unwrap_or(existing.columns),
            },
        )
    }

    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM scenarios WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

// Row mapping is done in two stages: rusqlite pulls raw columns, then the
// JSON and timestamp columns are parsed into a StoreResult so column-level
// and parse-level failures stay distinguishable.
fn record_from_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<ScenarioRecord>> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let inputs: String = row.get(2)?;
    let derived: String = row.get(3)?;
    let show_derived: bool = row.get(4)?;
    let columns: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(parse_record(
        id,
        name,
        inputs,
        derived,
        show_derived,
        columns,
        created_at,
        updated_at,
    ))
}

#[allow(clippy::too_many_arguments)]
fn parse_record(
    id: String,
    name: String,
    inputs: String,
    derived: String,
    show_derived: bool,
    columns: String,
    created_at: String,
    updated_at: String,
) -> StoreResult<ScenarioRecord> {
    Ok(ScenarioRecord {
        id,
        name,
        inputs: serde_json::from_str(&inputs)?,
        derived: serde_json::from_str(&derived)?,
        show_derived,
        columns: serde_json::from_str(&columns)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)?.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_scenario(name: &str) -> NewScenario {
        NewScenario {
            name: name.to_string(),
            inputs: json!({"purchasePrice": 250000, "depositPct": 0.25}),
            derived: json!({"score": 42.5, "capRate": 0.051}),
            show_derived: true,
            columns: json!(["score", "capRate", "npv"]),
        }
    }

    #[test]
    fn create_then_get_round_trips_opaque_blobs() {
        let store = ScenarioStore::open_in_memory().unwrap();
        let created = store.create(sample_scenario("Two-bed terrace")).unwrap();

        assert!(!created.id.is_empty());
        assert_eq!(created.created_at, created.updated_at);

        let fetched = store.get(&created.id).unwrap();
        assert_eq!(fetched.name, "Two-bed terrace");
        assert_eq!(fetched.inputs["purchasePrice"], 250_000);
        assert_eq!(fetched.derived["score"], 42.5);
        assert!(fetched.show_derived);
        assert_eq!(fetched.columns, json!(["score", "capRate", "npv"]));
    }

    #[test]
    fn list_orders_by_most_recently_updated() {
        let store = ScenarioStore::open_in_memory().unwrap();
        let first = store.create(sample_scenario("first")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.create(sample_scenario("second")).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["second".to_string(), "first".to_string()]);

        // Touching the older record moves it to the front.
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .update_partial(
                &first.id,
                ScenarioPatch {
                    name: Some("first (edited)".to_string()),
                    ..ScenarioPatch::default()
                },
            )
            .unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[0].name, "first (edited)");
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn partial_update_preserves_unset_fields() {
        let store = ScenarioStore::open_in_memory().unwrap();
        let created = store.create(sample_scenario("keep me")).unwrap();

        let patched = store
            .update_partial(
                &created.id,
                ScenarioPatch {
                    derived: Some(json!({"score": 99.0})),
                    ..ScenarioPatch::default()
                },
            )
            .unwrap();

        assert_eq!(patched.name, "keep me");
        assert_eq!(patched.inputs, created.inputs);
        assert_eq!(patched.derived["score"], 99.0);
        assert_eq!(patched.created_at, created.created_at);
        assert!(patched.updated_at >= created.updated_at);
    }

    #[test]
    fn full_update_replaces_every_field() {
        let store = ScenarioStore::open_in_memory().unwrap();
        let created = store.create(sample_scenario("before")).unwrap();

        let replaced = store
            .update_full(
                &created.id,
                NewScenario {
                    name: "after".to_string(),
                    inputs: json!({"purchasePrice": 1}),
                    derived: json!({}),
                    show_derived: false,
                    columns: json!([]),
                },
            )
            .unwrap();

        assert_eq!(replaced.name, "after");
        assert_eq!(replaced.inputs, json!({"purchasePrice": 1}));
        assert!(!replaced.show_derived);
    }

    #[test]
    fn missing_ids_surface_not_found() {
        let store = ScenarioStore::open_in_memory().unwrap();
        assert!(matches!(
            store.get("nope"),
            Err(StoreError::NotFound(id)) if id == "nope"
        ));
        assert!(matches!(
            store.update_full("nope", sample_scenario("x")),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update_partial("nope", ScenarioPatch::default()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("nope"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_removes_the_record() {
        let store = ScenarioStore::open_in_memory().unwrap();
        let created = store.create(sample_scenario("gone soon")).unwrap();
        store.delete(&created.id).unwrap();
        assert!(matches!(
            store.get(&created.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn persists_across_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("scenarios.db");

        let id = {
            let store = ScenarioStore::open(&db_path).unwrap();
            store.create(sample_scenario("durable")).unwrap().id
        };

        let reopened = ScenarioStore::open(&db_path).unwrap();
        assert_eq!(reopened.get(&id).unwrap().name, "durable");
    }
}
