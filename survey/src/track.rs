use std::fmt;
use std::str::FromStr;

use geo::{Bearing, Destination, Distance, Geodesic, Point};

use crate::aggregate::CombinedPoint;
use crate::error::SurveyError;

/// One GPS coordinate, parsed from "LAT,LON".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsFix {
    pub fn new(latitude: f64, longitude: f64) -> GpsFix {
        GpsFix { latitude, longitude }
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl FromStr for GpsFix {
    type Err = String;

    fn from_str(s: &str) -> Result<GpsFix, String> {
        let (lat, lon) = s.split_once(',').ok_or_else(|| format!("expected LAT,LON, got {s}"))?;
        let latitude = lat.trim().parse::<f64>().map_err(|_| format!("invalid latitude {lat}"))?;
        let longitude = lon.trim().parse::<f64>().map_err(|_| format!("invalid longitude {lon}"))?;
        Ok(GpsFix { latitude, longitude })
    }
}

impl fmt::Display for GpsFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// A geo-referenced detection of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub class: i64,
}

/// Places pixel x-coordinates on the geodesic between the track endpoints.
///
/// Only the along-track position maps to a coordinate: the survey path is
/// assumed straight and narrow, so y is dropped on projection.
pub struct TrackProjector {
    start: Point<f64>,
    azimuth_deg: f64,
    total_distance_m: f64,
    frame_width_px: f64,
}

impl TrackProjector {
    pub fn new(start: GpsFix, end: GpsFix, frame_width_px: f64) -> Result<TrackProjector, SurveyError> {
        if start == end {
            return Err(SurveyError::InvalidPath);
        }
        let (start, end) = (start.point(), end.point());
        Ok(TrackProjector {
            start,
            azimuth_deg: Geodesic::bearing(start, end),
            total_distance_m: Geodesic::distance(start, end),
            frame_width_px,
        })
    }

    pub fn locate(&self, x_px: f64) -> Point<f64> {
        let fraction = x_px / self.frame_width_px;
        Geodesic::destination(self.start, self.azimuth_deg, fraction * self.total_distance_m)
    }

    pub fn project(&self, points: &[CombinedPoint]) -> Vec<GeoPoint> {
        points
            .iter()
            .map(|p| {
                let located = self.locate(p.position.x);
                GeoPoint { latitude: located.y(), longitude: located.x(), class: p.class }
            })
            .collect()
    }
}
