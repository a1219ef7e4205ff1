use std::fmt;

use fieldstore::{ComparisonRow, DetectionRow, Store};
use geo::{Distance, Geodesic, Point};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::SurveyError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonCategory {
    Stayed,
    Removed,
    New,
}

impl ComparisonCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonCategory::Stayed => "stayed",
            ComparisonCategory::Removed => "removed",
            ComparisonCategory::New => "new",
        }
    }
}

impl fmt::Display for ComparisonCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of diffing two runs: stayed and removed keep the first run's
/// coordinates, new carries the second run's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunDiff {
    pub stayed: Vec<DetectionRow>,
    pub removed: Vec<DetectionRow>,
    pub new: Vec<DetectionRow>,
}

impl RunDiff {
    pub fn rows(&self) -> Vec<ComparisonRow> {
        let mut rows = Vec::new();
        for (points, category) in [
            (&self.stayed, ComparisonCategory::Stayed),
            (&self.removed, ComparisonCategory::Removed),
            (&self.new, ComparisonCategory::New),
        ] {
            rows.extend(points.iter().map(|p| ComparisonRow {
                latitude: p.latitude,
                longitude: p.longitude,
                category: category.as_str().to_string(),
            }));
        }
        rows
    }
}

struct IndexedPoint {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Signed (east, north) meters from the reference, measured along the
/// parallel and the meridian through the reference.
fn planar_offset(reference: &DetectionRow, point: &DetectionRow) -> [f64; 2] {
    let origin = Point::new(reference.longitude, reference.latitude);
    let east = Geodesic::distance(origin, Point::new(point.longitude, reference.latitude));
    let north = Geodesic::distance(origin, Point::new(reference.longitude, point.latitude));
    [
        if point.longitude < reference.longitude { -east } else { east },
        if point.latitude < reference.latitude { -north } else { north },
    ]
}

/// Greedy directional diff: every first-run point claims the first
/// unconsumed same-class second-run point within the radius. Candidates
/// come back in index order, not nearest-first, so swapping the runs can
/// change the outcome.
pub fn classify(run_a: &[DetectionRow], run_b: &[DetectionRow], delta_cm: f64) -> RunDiff {
    let Some(reference) = run_a.first().or_else(|| run_b.first()).cloned() else {
        return RunDiff::default();
    };

    let tree = RTree::bulk_load(
        run_b
            .iter()
            .enumerate()
            .map(|(index, p)| IndexedPoint { index, position: planar_offset(&reference, p) })
            .collect(),
    );

    let radius_m = delta_cm / 100.0;
    let mut consumed = vec![false; run_b.len()];
    let mut diff = RunDiff::default();

    for a in run_a {
        let position = planar_offset(&reference, a);
        let matched = tree
            .locate_within_distance(position, radius_m * radius_m)
            .find(|c| !consumed[c.index] && run_b[c.index].class == a.class);
        match matched {
            Some(c) => {
                consumed[c.index] = true;
                diff.stayed.push(a.clone());
            }
            None => diff.removed.push(a.clone()),
        }
    }
    for (i, b) in run_b.iter().enumerate() {
        if !consumed[i] {
            diff.new.push(b.clone());
        }
    }
    diff
}

/// Diffs two persisted runs of the same field and stores the result,
/// replacing any earlier comparison of the same ordered pair.
pub fn compare_runs(
    store: &mut Store,
    run_a: &str,
    run_b: &str,
    delta_cm: f64,
) -> Result<i64, SurveyError> {
    let field_a = store
        .field_id_for_run(run_a)?
        .ok_or_else(|| SurveyError::NoRuns(run_a.to_string()))?;
    let field_b = store
        .field_id_for_run(run_b)?
        .ok_or_else(|| SurveyError::NoRuns(run_b.to_string()))?;
    if field_a != field_b {
        return Err(SurveyError::FieldMismatch {
            run_a: run_a.to_string(),
            run_b: run_b.to_string(),
        });
    }

    let detections_a = store.detections(run_a)?;
    let detections_b = store.detections(run_b)?;
    let diff = classify(&detections_a, &detections_b, delta_cm);
    log::info!(
        "compared {run_a} and {run_b}: {} stayed, {} removed, {} new",
        diff.stayed.len(),
        diff.removed.len(),
        diff.new.len()
    );

    Ok(store.replace_comparison(field_a, run_a, run_b, &diff.rows())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CROP: i64 = 0;
    const WEED: i64 = 1;

    fn at(latitude: f64, longitude: f64, class: i64) -> DetectionRow {
        DetectionRow { latitude, longitude, class }
    }

    #[test]
    fn nearby_weed_stays_and_far_crop_is_new() {
        let run_a = vec![at(52.0, 4.0, WEED)];
        let run_b = vec![at(52.0, 4.00001, WEED), at(52.1, 4.1, CROP)];

        let diff = classify(&run_a, &run_b, 200.0);
        assert_eq!(diff.stayed, vec![at(52.0, 4.0, WEED)]);
        assert_eq!(diff.removed, Vec::<DetectionRow>::new());
        assert_eq!(diff.new, vec![at(52.1, 4.1, CROP)]);
    }

    #[test]
    fn matching_is_directional() {
        let one = vec![at(52.0, 4.0, WEED)];
        let two = vec![at(52.0, 4.000005, WEED), at(52.0, 4.00001, WEED)];

        let forward = classify(&one, &two, 200.0);
        assert_eq!(forward.stayed.len(), 1);
        assert_eq!(forward.removed.len(), 0);
        assert_eq!(forward.new.len(), 1);

        let backward = classify(&two, &one, 200.0);
        assert_eq!(backward.stayed.len(), 1);
        assert_eq!(backward.removed.len(), 1);
        assert_eq!(backward.new.len(), 0);
    }

    #[test]
    fn consumed_points_cannot_match_twice() {
        let run_a = vec![at(52.0, 4.0, WEED), at(52.0, 4.000002, WEED)];
        let run_b = vec![at(52.0, 4.000001, WEED)];

        let diff = classify(&run_a, &run_b, 200.0);
        assert_eq!(diff.stayed, vec![at(52.0, 4.0, WEED)]);
        assert_eq!(diff.removed, vec![at(52.0, 4.000002, WEED)]);
        assert!(diff.new.is_empty());
    }

    #[test]
    fn classes_never_cross_match() {
        let run_a = vec![at(52.0, 4.0, WEED)];
        let run_b = vec![at(52.0, 4.0, CROP)];

        let diff = classify(&run_a, &run_b, 200.0);
        assert_eq!(diff.stayed.len(), 0);
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.new.len(), 1);
    }

    #[test]
    fn empty_runs_produce_empty_diffs() {
        assert_eq!(classify(&[], &[], 200.0), RunDiff::default());

        let only_a = classify(&[at(52.0, 4.0, WEED)], &[], 200.0);
        assert_eq!(only_a.removed.len(), 1);

        let only_b = classify(&[], &[at(52.0, 4.0, WEED)], 200.0);
        assert_eq!(only_b.new.len(), 1);
    }

    #[test]
    fn planar_offsets_are_signed_meters() {
        let reference = at(52.0, 4.0, WEED);

        let east = planar_offset(&reference, &at(52.0, 4.00001, WEED));
        assert_relative_eq!(east[0], 0.685, epsilon = 0.01);
        assert_relative_eq!(east[1], 0.0, epsilon = 1e-9);

        let south = planar_offset(&reference, &at(51.9999, 4.0, WEED));
        assert!(south[1] < -11.0 && south[1] > -11.3);
        assert_relative_eq!(south[0], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn stored_comparison_round_trip() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_a", "Field_1", "gras", &[at(52.0, 4.0, WEED)]).unwrap();
        store
            .insert_run(
                "run_b",
                "Field_1",
                "gras",
                &[at(52.0, 4.00001, WEED), at(52.1, 4.1, CROP)],
            )
            .unwrap();

        let id = compare_runs(&mut store, "run_a", "run_b", 200.0).unwrap();
        let rows = store.comparison_rows(id).unwrap();
        let categories: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["stayed", "new"]);
        assert_eq!(rows[0].longitude, 4.0);
        assert_eq!(rows[1].longitude, 4.1);
    }

    #[test]
    fn recomparing_replaces_the_stored_result() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_a", "Field_1", "gras", &[at(52.0, 4.0, WEED)]).unwrap();
        store.insert_run("run_b", "Field_1", "gras", &[at(52.0, 4.0, WEED)]).unwrap();

        let first = compare_runs(&mut store, "run_a", "run_b", 200.0).unwrap();
        let second = compare_runs(&mut store, "run_a", "run_b", 200.0).unwrap();

        assert_ne!(first, second);
        assert!(store.comparison_rows(first).unwrap().is_empty());
        assert_eq!(store.comparison_rows(second).unwrap().len(), 1);
        assert_eq!(store.find_compared_run("run_a", "run_b").unwrap(), Some(second));
    }

    #[test]
    fn runs_must_share_a_field() {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_run("run_a", "Field_1", "gras", &[]).unwrap();
        store.insert_run("run_b", "Field_2", "gras", &[]).unwrap();

        assert!(matches!(
            compare_runs(&mut store, "run_a", "run_b", 200.0),
            Err(SurveyError::FieldMismatch { .. })
        ));
        assert!(matches!(
            compare_runs(&mut store, "run_a", "missing", 200.0),
            Err(SurveyError::NoRuns(_))
        ));
    }
}
