use std::collections::HashSet;
use std::{fs, path::Path};

use serde_json::Value;

use crate::{Store, StoreError};

/// Counts of what a parcel import touched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParcelImport {
    pub fields: usize,
    pub crops: usize,
}

/// Upserts field and crop names from a parcel-registry GeoJSON export.
/// Fields are keyed by parcel id; the registry names the crop in Dutch
/// (`gewas`).
pub(crate) fn import(store: &Store, path: &Path) -> Result<ParcelImport, StoreError> {
    let raw = fs::read_to_string(path).map_err(|source| StoreError::GeojsonRead {
        path: path.display().to_string(),
        source,
    })?;
    let doc: Value = serde_json::from_str(&raw).map_err(|source| StoreError::GeojsonFormat {
        path: path.display().to_string(),
        source,
    })?;

    let mut imported = ParcelImport::default();
    let Some(features) = doc.get("features").and_then(Value::as_array) else {
        log::warn!("{} has no features array", path.display());
        return Ok(imported);
    };

    let mut seen_fields = HashSet::new();
    let mut seen_crops = HashSet::new();
    for feature in features {
        let Some(properties) = feature.get("properties").and_then(Value::as_object) else {
            continue;
        };
        // Some registry rows carry a null or empty id; they name no field.
        let id = match properties.get("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Null) | Some(Value::String(_)) | None => None,
            Some(other) => Some(other.to_string()),
        };
        if let Some(id) = id {
            if seen_fields.insert(id.clone()) {
                store.ensure_field(&format!("Field_{id}"))?;
                imported.fields += 1;
            }
        }
        if let Some(crop) = properties.get("gewas").and_then(Value::as_str) {
            // Registry exports pad some crop names with whitespace.
            if seen_crops.insert(crop.trim().to_string()) {
                store.ensure_crop(crop.trim())?;
                imported.crops += 1;
            }
        }
    }

    log::info!(
        "imported {} parcels and {} crop names from {}",
        imported.fields,
        imported.crops,
        path.display()
    );
    Ok(imported)
}
