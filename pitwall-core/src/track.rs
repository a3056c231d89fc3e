//! Track geometry helpers
//!
//! Car progress is measured as a fractional index into `TrackModel::points`,
//! so `progress / points.len()` is the lap fraction used by DRS zones.

use crate::error::TrackError;
use crate::model::{Position, Sector, TrackModel};

/// DRS eligibility at a point on the lap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrsWindow {
    /// Inside a detection-to-end span and clear of the braking point
    pub available: bool,
    /// Past the activation point of that zone
    pub past_activation: bool,
}

/// Whether lap fraction `x` lies in `[start, end)`, wrapping past the line
pub fn span_contains(start: f64, end: f64, x: f64) -> bool {
    if start <= end {
        x >= start && x < end
    } else {
        x >= start || x < end
    }
}

impl TrackModel {
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Distance covered by one unit of progress
    pub fn meters_per_point(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.total_length_m / self.points.len() as f64
    }

    pub fn sector(&self, id: u8) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.id == id)
    }

    pub fn sector_for_index(&self, index: usize) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.contains(index))
    }

    pub fn sector_for_progress(&self, progress: f64) -> Option<&Sector> {
        if progress.is_nan() || progress < 0.0 {
            return None;
        }
        self.sector_for_index(progress.floor() as usize)
    }

    pub fn lap_fraction(&self, progress: f64) -> f64 {
        let n = self.points.len() as f64;
        if n == 0.0 {
            return 0.0;
        }
        progress.rem_euclid(n) / n
    }

    /// Interpolated racing-line position for a progress value
    pub fn position_at(&self, progress: f64) -> Position {
        let n = self.points.len();
        if n == 0 {
            return self.start_line;
        }
        let p = progress.rem_euclid(n as f64);
        let i = (p.floor() as usize).min(n - 1);
        let j = (i + 1) % n;
        self.points[i]
            .position()
            .lerp(self.points[j].position(), p - i as f64)
    }

    /// DRS state for a car at `progress`, `lookahead_points` before each zone end
    /// counting as the braking point into the next corner
    pub fn drs_window(&self, progress: f64, lookahead_points: f64) -> DrsWindow {
        let n = self.points.len() as f64;
        let f = self.lap_fraction(progress);

        for zone in &self.drs_zones {
            if !span_contains(zone.detection_pct, zone.end_pct, f) {
                continue;
            }
            let to_end = (zone.end_pct - f).rem_euclid(1.0) * n;
            if to_end < lookahead_points {
                continue;
            }
            return DrsWindow {
                available: true,
                past_activation: span_contains(zone.activation_pct, zone.end_pct, f),
            };
        }
        DrsWindow::default()
    }

    /// Check the structural invariants the engines rely on
    pub fn validate(&self) -> Result<(), TrackError> {
        if self.points.is_empty() {
            return Err(TrackError::NoPoints);
        }
        if !(self.total_length_m > 0.0) {
            return Err(TrackError::InvalidLength(self.total_length_m));
        }
        if self.sectors.is_empty() {
            return Err(TrackError::NoSectors);
        }

        let mut expected_start = 0;
        for (i, sector) in self.sectors.iter().enumerate() {
            let expected_id = (i + 1) as u8;
            if sector.id != expected_id {
                return Err(TrackError::SectorId {
                    expected: expected_id,
                    found: sector.id,
                });
            }
            if sector.start_index != expected_start {
                return Err(TrackError::SectorGap {
                    id: sector.id,
                    expected: expected_start,
                    found: sector.start_index,
                });
            }
            if sector.end_index <= sector.start_index {
                return Err(TrackError::EmptySector {
                    id: sector.id,
                    start: sector.start_index,
                    end: sector.end_index,
                });
            }
            expected_start = sector.end_index;
        }
        if expected_start != self.points.len() {
            return Err(TrackError::SectorCoverage {
                end: expected_start,
                points: self.points.len(),
            });
        }

        if self.drs_zones.is_empty() {
            return Err(TrackError::NoDrsZones);
        }
        let in_range = |v: f64| (0.0..1.0).contains(&v);
        for zone in &self.drs_zones {
            if !(in_range(zone.detection_pct) && in_range(zone.activation_pct) && in_range(zone.end_pct)) {
                return Err(TrackError::DrsOutOfRange(zone.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DrsZone, SectorProfile, TrackPoint};

    fn square_track() -> TrackModel {
        // 8 points around a 100x100 square, two per side
        let coords = [
            (0.0, 0.0),
            (50.0, 0.0),
            (100.0, 0.0),
            (100.0, 50.0),
            (100.0, 100.0),
            (50.0, 100.0),
            (0.0, 100.0),
            (0.0, 50.0),
        ];
        let sector_of = |i: usize| match i {
            0..=2 => 1,
            3..=5 => 2,
            _ => 3,
        };
        let points = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| TrackPoint { x, y, sector: sector_of(i) })
            .collect();
        let sector = |id: u8, start: usize, end: usize| Sector {
            id,
            name: format!("Sector {}", id),
            start_index: start,
            end_index: end,
            length_m: (end - start) as f64 * 50.0,
            profile: SectorProfile::Mixed,
            speed_ceiling_kph: 300.0,
        };

        TrackModel {
            name: "Square".to_string(),
            country: "Test".to_string(),
            total_length_m: 400.0,
            sectors: vec![sector(1, 0, 3), sector(2, 3, 6), sector(3, 6, 8)],
            drs_zones: vec![DrsZone {
                id: "drs_1".to_string(),
                detection_pct: 0.75,
                activation_pct: 0.875,
                end_pct: 0.25,
            }],
            pit_entry: Position::new(0.0, 90.0),
            pit_exit: Position::new(0.0, 10.0),
            start_line: Position::new(0.0, 0.0),
            points,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_track() {
        assert_eq!(square_track().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_sector_gap() {
        let mut track = square_track();
        track.sectors[1].start_index = 4;
        assert!(matches!(
            track.validate(),
            Err(TrackError::SectorGap { id: 2, expected: 3, found: 4 })
        ));
    }

    #[test]
    fn test_validate_rejects_short_coverage() {
        let mut track = square_track();
        track.sectors[2].end_index = 7;
        assert!(matches!(
            track.validate(),
            Err(TrackError::SectorCoverage { end: 7, points: 8 })
        ));
    }

    #[test]
    fn test_validate_requires_drs_zone() {
        let mut track = square_track();
        track.drs_zones.clear();
        assert_eq!(track.validate(), Err(TrackError::NoDrsZones));
    }

    #[test]
    fn test_sector_lookup_uses_half_open_ranges() {
        let track = square_track();
        assert_eq!(track.sector_for_index(0).map(|s| s.id), Some(1));
        assert_eq!(track.sector_for_index(2).map(|s| s.id), Some(1));
        assert_eq!(track.sector_for_index(3).map(|s| s.id), Some(2));
        assert_eq!(track.sector_for_index(7).map(|s| s.id), Some(3));
        assert_eq!(track.sector_for_index(8), None);
        assert_eq!(track.sector_for_progress(5.9).map(|s| s.id), Some(2));
        assert_eq!(track.sector_for_progress(-1.0), None);
    }

    #[test]
    fn test_position_interpolates_and_wraps() {
        let track = square_track();
        assert_eq!(track.position_at(0.5), Position::new(25.0, 0.0));
        assert_eq!(track.position_at(7.5), Position::new(0.0, 25.0));
        assert_eq!(track.position_at(8.0), Position::new(0.0, 0.0));
    }

    #[test]
    fn test_meters_per_point() {
        assert_eq!(square_track().meters_per_point(), 50.0);
    }

    #[test]
    fn test_span_contains_wraps_past_line() {
        assert!(span_contains(0.9, 0.1, 0.95));
        assert!(span_contains(0.9, 0.1, 0.05));
        assert!(!span_contains(0.9, 0.1, 0.5));
        assert!(span_contains(0.2, 0.4, 0.3));
        assert!(!span_contains(0.2, 0.4, 0.4));
    }

    #[test]
    fn test_drs_window_phases() {
        let track = square_track();

        // before detection
        assert_eq!(track.drs_window(5.0, 1.0), DrsWindow::default());

        // detection reached, activation not yet
        let w = track.drs_window(6.0, 1.0);
        assert!(w.available);
        assert!(!w.past_activation);

        // past activation, across the line
        let w = track.drs_window(0.5, 1.0);
        assert!(w.available);
        assert!(w.past_activation);

        // within the lookahead of the zone end
        let w = track.drs_window(1.5, 1.0);
        assert!(!w.available);
    }
}
