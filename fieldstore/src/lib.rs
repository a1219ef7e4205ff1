mod geojson;
mod records;
mod schema;

use std::path::Path;

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

pub use geojson::ParcelImport;
pub use records::{ComparisonRow, DetectionRow, RunInfo};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot read GeoJSON file {path}")]
    GeojsonRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a GeoJSON feature collection")]
    GeojsonFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("field {0} does not exist")]
    UnknownField(String),
}

/// SQLite-backed storage for runs, their detections and stored comparisons.
/// Runs are append-only: inserted in one transaction, readable, deletable,
/// never updated.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Store, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Store, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Store, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Store { conn })
    }

    pub fn ensure_field(&self, name: &str) -> Result<i64, StoreError> {
        ensure_named(&self.conn, "Fields", name)
    }

    pub fn ensure_crop(&self, name: &str) -> Result<i64, StoreError> {
        ensure_named(&self.conn, "Crops", name)
    }

    pub fn field_id(&self, name: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT id FROM Fields WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?)
    }

    pub fn all_fields(&self) -> Result<Vec<String>, StoreError> {
        self.names_of("Fields")
    }

    pub fn all_crops(&self) -> Result<Vec<String>, StoreError> {
        self.names_of("Crops")
    }

    fn names_of(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(&format!("SELECT name FROM {table} ORDER BY name"))?;
        let names = stmt.query_map([], |row| row.get(0))?;
        Ok(names.collect::<Result<_, _>>()?)
    }

    /// Timestamped run identifier, suffixed when two runs land in the same
    /// second.
    pub fn create_run_id(&self) -> Result<String, StoreError> {
        let base = format!("run_{}", Local::now().format("%Y%m%d_%H%M%S"));
        self.disambiguate(base)
    }

    fn disambiguate(&self, base: String) -> Result<String, StoreError> {
        if !self.run_exists(&base)? {
            return Ok(base);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.run_exists(&candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    pub fn run_exists(&self, run_id: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM Runs WHERE run_id = ?1", params![run_id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Inserts a run and all of its detections in one transaction, creating
    /// the field and crop rows if needed.
    pub fn insert_run(
        &mut self,
        run_id: &str,
        field: &str,
        crop: &str,
        detections: &[DetectionRow],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let field_id = ensure_named(&tx, "Fields", field)?;
        let crop_id = ensure_named(&tx, "Crops", crop)?;
        tx.execute(
            "INSERT INTO Runs (run_id, field_id, crop_id) VALUES (?1, ?2, ?3)",
            params![run_id, field_id, crop_id],
        )?;
        for detection in detections {
            tx.execute(
                "INSERT INTO Detections (run_id, latitude, longitude, class) VALUES (?1, ?2, ?3, ?4)",
                params![run_id, detection.latitude, detection.longitude, detection.class],
            )?;
        }
        tx.commit()?;
        log::debug!("stored run {run_id} with {} detections", detections.len());
        Ok(())
    }

    pub fn detections(&self, run_id: &str) -> Result<Vec<DetectionRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT latitude, longitude, class FROM Detections WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(DetectionRow {
                latitude: row.get(0)?,
                longitude: row.get(1)?,
                class: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn field_id_for_run(&self, run_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT field_id FROM Runs WHERE run_id = ?1", params![run_id], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn runs(&self) -> Result<Vec<RunInfo>, StoreError> {
        self.run_infos("", params![])
    }

    pub fn runs_for_field(&self, field: &str) -> Result<Vec<RunInfo>, StoreError> {
        let field_id = self
            .field_id(field)?
            .ok_or_else(|| StoreError::UnknownField(field.to_string()))?;
        self.run_infos("WHERE r.field_id = ?1", params![field_id])
    }

    pub fn runs_in_timeframe(&self, start: &str, end: &str) -> Result<Vec<RunInfo>, StoreError> {
        self.run_infos("WHERE r.date_time BETWEEN ?1 AND ?2", params![start, end])
    }

    fn run_infos(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<RunInfo>, StoreError> {
        let sql = format!(
            "SELECT r.run_id, r.date_time, f.name, c.name
             FROM Runs r
             JOIN Fields f ON r.field_id = f.id
             JOIN Crops c ON r.crop_id = c.id
             {filter}
             ORDER BY r.date_time, r.run_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args, |row| {
            Ok(RunInfo {
                run_id: row.get(0)?,
                date_time: row.get(1)?,
                field: row.get(2)?,
                crop: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Removes a run; its detections and any comparison built on it cascade.
    pub fn delete_run(&mut self, run_id: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute("DELETE FROM Runs WHERE run_id = ?1", params![run_id])?;
        Ok(changed > 0)
    }

    pub fn find_compared_run(&self, run_a: &str, run_b: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM ComparedRuns WHERE run1 = ?1 AND run2 = ?2",
                params![run_a, run_b],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Stores one comparison and its classified rows, dropping any earlier
    /// comparison of the same ordered pair in the same transaction. Returns
    /// the new ComparedRuns id.
    pub fn replace_comparison(
        &mut self,
        field_id: i64,
        run_a: &str,
        run_b: &str,
        rows: &[ComparisonRow],
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM ComparedRuns WHERE run1 = ?1 AND run2 = ?2",
            params![run_a, run_b],
        )?;
        tx.execute(
            "INSERT INTO ComparedRuns (field_id, run1, run2) VALUES (?1, ?2, ?3)",
            params![field_id, run_a, run_b],
        )?;
        let id = tx.last_insert_rowid();
        for row in rows {
            tx.execute(
                "INSERT INTO Comparison (compared_run_id, latitude, longitude, category)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, row.latitude, row.longitude, row.category],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }

    pub fn comparison_rows(&self, compared_run_id: i64) -> Result<Vec<ComparisonRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT latitude, longitude, category FROM Comparison
             WHERE compared_run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![compared_run_id], |row| {
            Ok(ComparisonRow {
                latitude: row.get(0)?,
                longitude: row.get(1)?,
                category: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn import_parcels(&self, path: &Path) -> Result<ParcelImport, StoreError> {
        geojson::import(self, path)
    }
}

fn ensure_named(conn: &Connection, table: &str, name: &str) -> Result<i64, StoreError> {
    conn.execute(&format!("INSERT OR IGNORE INTO {table} (name) VALUES (?1)"), params![name])?;
    let id = conn.query_row(&format!("SELECT id FROM {table} WHERE name = ?1"), params![name], |row| {
        row.get(0)
    })?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<DetectionRow> {
        vec![
            DetectionRow { latitude: 52.0001, longitude: 4.0002, class: 1 },
            DetectionRow { latitude: 52.0003, longitude: 4.0004, class: 0 },
        ]
    }

    #[test]
    fn run_round_trip() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_a", "Field_1", "gras", &sample_rows()).unwrap();

        assert!(store.run_exists("run_a").unwrap());
        assert_eq!(store.detections("run_a").unwrap(), sample_rows());
        assert_eq!(store.field_id_for_run("run_a").unwrap(), store.field_id("Field_1").unwrap());

        let runs = store.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].field, "Field_1");
        assert_eq!(runs[0].crop, "gras");
    }

    #[test]
    fn ensure_field_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let first = store.ensure_field("Field_1").unwrap();
        let second = store.ensure_field("Field_1").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.all_fields().unwrap(), vec!["Field_1".to_string()]);
    }

    #[test]
    fn duplicate_run_id_is_rejected() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_a", "Field_1", "gras", &[]).unwrap();
        assert!(store.insert_run("run_a", "Field_1", "gras", &[]).is_err());
    }

    #[test]
    fn colliding_run_ids_get_a_suffix() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_x", "Field_1", "gras", &[]).unwrap();
        assert_eq!(store.disambiguate("run_x".to_string()).unwrap(), "run_x_2");
        store.insert_run("run_x_2", "Field_1", "gras", &[]).unwrap();
        assert_eq!(store.disambiguate("run_x".to_string()).unwrap(), "run_x_3");
        assert!(store.create_run_id().unwrap().starts_with("run_2"));
    }

    #[test]
    fn delete_run_cascades() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_a", "Field_1", "gras", &sample_rows()).unwrap();
        store.insert_run("run_b", "Field_1", "gras", &sample_rows()).unwrap();
        let field_id = store.field_id("Field_1").unwrap().unwrap();
        let comparison = store
            .replace_comparison(
                field_id,
                "run_a",
                "run_b",
                &[ComparisonRow { latitude: 52.0, longitude: 4.0, category: "stayed".into() }],
            )
            .unwrap();

        assert!(store.delete_run("run_a").unwrap());
        assert!(!store.run_exists("run_a").unwrap());
        assert!(store.detections("run_a").unwrap().is_empty());
        assert_eq!(store.find_compared_run("run_a", "run_b").unwrap(), None);
        assert!(store.comparison_rows(comparison).unwrap().is_empty());

        assert!(!store.delete_run("run_a").unwrap());
    }

    #[test]
    fn replacing_a_comparison_swaps_rows_in_one_call() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_a", "Field_1", "gras", &[]).unwrap();
        store.insert_run("run_b", "Field_1", "gras", &[]).unwrap();
        let field_id = store.field_id("Field_1").unwrap().unwrap();

        assert_eq!(store.find_compared_run("run_a", "run_b").unwrap(), None);
        let first = store
            .replace_comparison(
                field_id,
                "run_a",
                "run_b",
                &[ComparisonRow { latitude: 52.0, longitude: 4.0, category: "stayed".into() }],
            )
            .unwrap();
        assert_eq!(store.find_compared_run("run_a", "run_b").unwrap(), Some(first));

        let second = store
            .replace_comparison(
                field_id,
                "run_a",
                "run_b",
                &[ComparisonRow { latitude: 52.0, longitude: 4.0, category: "removed".into() }],
            )
            .unwrap();
        assert_ne!(second, first);
        assert_eq!(store.find_compared_run("run_a", "run_b").unwrap(), Some(second));
        assert!(store.comparison_rows(first).unwrap().is_empty());
        assert_eq!(store.comparison_rows(second).unwrap()[0].category, "removed");
    }

    #[test]
    fn runs_in_timeframe_filters() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_a", "Field_1", "gras", &[]).unwrap();
        store.insert_run("run_b", "Field_1", "gras", &[]).unwrap();

        let all = store.runs_in_timeframe("2000-01-01", "2999-12-31").unwrap();
        assert_eq!(all.len(), 2);
        assert!(store.runs_in_timeframe("1900-01-01", "1900-12-31").unwrap().is_empty());
    }

    #[test]
    fn unknown_field_listing_fails() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(store.runs_for_field("nope"), Err(StoreError::UnknownField(_))));
    }

    #[test]
    fn parcel_import_reads_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcels.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"id": 42, "gewas": "mais"}},
                {"type": "Feature", "properties": {"id": 43, "gewas": "mais "}},
                {"type": "Feature", "properties": {"id": 42}},
                {"type": "Feature", "properties": {"id": null, "gewas": "tarwe"}},
                {"type": "Feature", "properties": {"id": ""}},
                {"type": "Feature", "properties": {}}
            ]}"#,
        )
        .unwrap();

        let store = Store::open_in_memory().unwrap();
        let imported = store.import_parcels(&path).unwrap();
        assert_eq!(imported, ParcelImport { fields: 2, crops: 2 });
        assert_eq!(store.all_fields().unwrap(), vec!["Field_42".to_string(), "Field_43".to_string()]);
        assert_eq!(store.all_crops().unwrap(), vec!["mais".to_string(), "tarwe".to_string()]);
    }
}
