use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use itertools::Itertools;

use crate::error::SurveyError;

/// Horizontal placement of one mosaic in the run-global pixel frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetRecord {
    pub batch: String,
    pub offset_px: f64,
    pub shared_width_px: f64,
}

/// Cumulative offsets for a chain of stitched mosaics, in capture order.
///
/// The on-disk form is a JSON object mapping mosaic file name to
/// `[offset, shared_width]`. Keys carry a sequence number in the name, so
/// records are ordered by that number rather than lexicographically.
#[derive(Debug, Clone, Default)]
pub struct OffsetLedger {
    records: Vec<OffsetRecord>,
}

impl OffsetLedger {
    pub fn new() -> OffsetLedger {
        OffsetLedger { records: Vec::new() }
    }

    pub fn load(path: &Path) -> Result<OffsetLedger, SurveyError> {
        let text = fs::read_to_string(path)
            .map_err(|e| SurveyError::OffsetFileIo { path: path.to_path_buf(), source: e })?;
        Self::parse(&text)
            .map_err(|e| SurveyError::OffsetFileFormat { path: path.to_path_buf(), source: e })
    }

    fn parse(text: &str) -> Result<OffsetLedger, serde_json::Error> {
        let raw: HashMap<String, (f64, f64)> = serde_json::from_str(text)?;
        let records = raw
            .into_iter()
            .map(|(batch, (offset_px, shared_width_px))| OffsetRecord {
                batch,
                offset_px,
                shared_width_px,
            })
            .sorted_by(|a, b| natural_cmp(&a.batch, &b.batch))
            .collect();
        Ok(OffsetLedger { records })
    }

    pub fn save(&self, path: &Path) -> Result<(), SurveyError> {
        let mut map = serde_json::Map::new();
        for record in &self.records {
            let value = serde_json::json!([record.offset_px, record.shared_width_px]);
            map.insert(record.batch.clone(), value);
        }
        let text = serde_json::to_string_pretty(&map)
            .map_err(|e| SurveyError::OffsetFileFormat { path: path.to_path_buf(), source: e })?;
        fs::write(path, text)
            .map_err(|e| SurveyError::OffsetFileIo { path: path.to_path_buf(), source: e })
    }

    /// Appends a mosaic, deriving its offset from the previous record: the
    /// first mosaic sits at 0, every later one at the previous offset plus
    /// its own width minus the previous mosaic's shared width.
    pub fn push(&mut self, batch: &str, width_px: f64, shared_width_px: f64) {
        let offset_px = match self.records.last() {
            Some(prev) => prev.offset_px + width_px - prev.shared_width_px,
            None => 0.0,
        };
        self.records.push(OffsetRecord { batch: batch.to_string(), offset_px, shared_width_px });
    }

    pub fn get(&self, batch: &str) -> Result<&OffsetRecord, SurveyError> {
        self.records
            .iter()
            .find(|r| r.batch == batch)
            .ok_or_else(|| SurveyError::MissingOffsetData { batch: batch.to_string() })
    }

    pub fn records(&self) -> &[OffsetRecord] {
        &self.records
    }
}

/// Orders file names by the first number embedded in them, so that
/// `batch4.jpg` sorts before `batch10.jpg`. Names without a number group
/// ahead of numbered ones, in plain string order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    (embedded_number(a), a).cmp(&(embedded_number(b), b))
}

fn embedded_number(name: &str) -> Option<u64> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_accumulates_offsets() {
        let mut ledger = OffsetLedger::new();
        ledger.push("batch0.jpg", 1000.0, 200.0);
        ledger.push("batch1.jpg", 900.0, 150.0);
        ledger.push("batch2.jpg", 1100.0, 120.0);

        let offsets: Vec<f64> = ledger.records().iter().map(|r| r.offset_px).collect();
        assert_eq!(offsets, vec![0.0, 700.0, 1650.0]);
    }

    #[test]
    fn parse_orders_by_embedded_number() {
        let ledger = OffsetLedger::parse(
            r#"{"batch10.jpg": [7200.0, 130.0],
                "batch2.jpg": [800.0, 150.0],
                "batch0.jpg": [0.0, 200.0]}"#,
        )
        .unwrap();

        let names: Vec<&str> = ledger.records().iter().map(|r| r.batch.as_str()).collect();
        assert_eq!(names, vec!["batch0.jpg", "batch2.jpg", "batch10.jpg"]);
        assert_eq!(ledger.get("batch2.jpg").unwrap().offset_px, 800.0);
        assert_eq!(ledger.get("batch2.jpg").unwrap().shared_width_px, 150.0);
    }

    #[test]
    fn missing_batch_is_an_error() {
        let ledger = OffsetLedger::new();
        assert!(matches!(
            ledger.get("batch7.jpg"),
            Err(SurveyError::MissingOffsetData { .. })
        ));
    }

    #[test]
    fn save_then_load_preserves_records() {
        let mut ledger = OffsetLedger::new();
        ledger.push("batch0.jpg", 1200.0, 250.0);
        ledger.push("batch1.jpg", 1200.0, 250.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch_offset.json");
        ledger.save(&path).unwrap();

        let loaded = OffsetLedger::load(&path).unwrap();
        assert_eq!(loaded.records(), ledger.records());
    }

    #[test]
    fn natural_order_beats_lexicographic() {
        assert_eq!(natural_cmp("batch4.jpg", "batch10.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("batch10.jpg", "batch10.jpg"), Ordering::Equal);
        assert_eq!(natural_cmp("no_number_b", "no_number_a"), Ordering::Greater);
    }

    #[test]
    fn mixed_names_sort_without_cycles() {
        let mut names = vec!["y1.jpg", "x.jpg", "a5.jpg"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["x.jpg", "y1.jpg", "a5.jpg"]);

        assert_eq!(natural_cmp("x.jpg", "y1.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("y1.jpg", "a5.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("x.jpg", "a5.jpg"), Ordering::Less);
    }
}
