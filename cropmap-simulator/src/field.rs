use rand::rngs::StdRng;
use rand::Rng;

pub const CROP: i64 = 0;
pub const WEED: i64 = 1;

/// One plant on the simulated row, in run-global pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Plant {
    pub x_global: f64,
    pub y: f64,
    pub class: i64,
}

/// Ground truth the simulated survey passes are generated from.
pub struct FieldTruth {
    pub plants: Vec<Plant>,
}

impl FieldTruth {
    /// Seeds the central band of every batch with a handful of plants,
    /// spaced so no two fall within the dedup distance.
    pub fn grow(rng: &mut StdRng, batches: usize, step_px: f64) -> FieldTruth {
        let mut plants = Vec::new();
        for batch in 0..batches {
            let band_start = batch as f64 * step_px + 280.0;
            let count = rng.gen_range(4..=8);
            let slot = 400.0 / count as f64;
            for i in 0..count {
                plants.push(Plant {
                    x_global: band_start + i as f64 * slot + slot / 2.0 + rng.gen_range(-7.0..7.0),
                    y: rng.gen_range(10.0..80.0),
                    class: if rng.gen_bool(0.35) { WEED } else { CROP },
                });
            }
        }
        FieldTruth { plants }
    }

    /// Next season on the same row: a share of the weeds is gone, a few new
    /// ones came up in the bare strip past each band, clear of every
    /// surviving plant and every vacated spot.
    pub fn next_season(&self, rng: &mut StdRng, batches: usize, step_px: f64) -> FieldTruth {
        let mut plants = Vec::new();
        let mut vacated = Vec::new();
        for plant in &self.plants {
            if plant.class == WEED && !rng.gen_bool(0.6) {
                vacated.push(plant.clone());
            } else {
                plants.push(plant.clone());
            }
        }

        let mut added = 0;
        while added < 3 {
            let batch = rng.gen_range(0..batches);
            let x_global = batch as f64 * step_px + rng.gen_range(720.0..880.0);
            let clear = |p: &Plant| (p.x_global - x_global).abs() > 40.0;
            if plants.iter().all(clear) && vacated.iter().all(clear) {
                plants.push(Plant { x_global, y: rng.gen_range(10.0..80.0), class: WEED });
                added += 1;
            }
        }
        FieldTruth { plants }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn seasons() -> (FieldTruth, FieldTruth) {
        let mut rng = StdRng::seed_from_u64(7);
        let first = FieldTruth::grow(&mut rng, 4, 950.0);
        let second = first.next_season(&mut rng, 4, 950.0);
        (first, second)
    }

    #[test]
    fn second_season_pulls_only_weeds() {
        let (first, second) = seasons();
        let gone: Vec<&Plant> =
            first.plants.iter().filter(|p| !second.plants.contains(p)).collect();
        assert!(!gone.is_empty());
        assert!(gone.iter().all(|p| p.class == WEED));
    }

    #[test]
    fn sprouted_weeds_keep_clear_of_every_old_position() {
        let (first, second) = seasons();
        let sprouted: Vec<&Plant> =
            second.plants.iter().filter(|p| !first.plants.contains(p)).collect();
        assert_eq!(sprouted.len(), 3);
        for weed in &sprouted {
            assert_eq!(weed.class, WEED);
            for old in &first.plants {
                assert!(
                    (old.x_global - weed.x_global).abs() > 40.0,
                    "weed at {:.0} sprouted on top of a plant at {:.0}",
                    weed.x_global,
                    old.x_global
                );
            }
        }
    }
}
