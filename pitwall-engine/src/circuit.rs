//! Built-in circuit and roster data
//!
//! The default layout fits a 1000x700 canvas: start/finish along the bottom,
//! a hairpin at the top and a chicane on the run back to the line.

use pitwall_core::model::{
    Driver, DrsZone, Position, Roster, Sector, SectorProfile, Team, TrackModel, TrackPoint,
};
use std::f64::consts::PI;

// =============================================================================
// Circuit de Strategie
// =============================================================================

const START_Y: f64 = 550.0;

/// Fraction of the lap at which sectors 2 and 3 begin
const SECTOR_SPLITS: [f64; 2] = [0.35, 0.70];

fn layout() -> Vec<(f64, f64)> {
    let mut pts = Vec::with_capacity(226);

    // Start/finish straight
    for i in 0..25 {
        pts.push((150.0 + i as f64 * 16.0, START_Y));
    }

    // Turn 1, right-hand sweeper
    for i in 0..20 {
        let a = i as f64 / 19.0 * PI * 0.5;
        pts.push((550.0 + a.sin() * 100.0, START_Y - (1.0 - a.cos()) * 100.0));
    }

    // Back straight, heading up
    for i in 0..30 {
        pts.push((650.0, 450.0 - i as f64 * 10.0));
    }

    // Turn 2 hairpin
    for i in 0..25 {
        let a = i as f64 / 24.0 * PI;
        pts.push((650.0 - a.sin() * 120.0, 150.0 - a.cos() * 120.0));
    }

    // Top straight, heading left
    for i in 0..35 {
        pts.push((530.0 - i as f64 * 8.0, 270.0));
    }

    // Turn 3 into the middle section
    for i in 0..18 {
        let a = i as f64 / 17.0 * PI * 0.5;
        pts.push((250.0 - a.cos() * 70.0, 270.0 + a.sin() * 70.0));
    }

    // Middle straight
    for i in 0..20 {
        pts.push((180.0, 340.0 + i as f64 * 5.0));
    }

    // Turn 4 chicane
    for i in 0..25 {
        let a = i as f64 / 24.0 * PI;
        pts.push((180.0 - (a * 3.0).sin() * 35.0, 440.0 + i as f64 * 2.5));
    }

    // Final corner onto the straight
    for i in 0..20 {
        let a = i as f64 / 19.0 * PI * 0.4;
        pts.push((205.0 - a.sin() * 60.0, 502.5 + a.cos() * 50.0));
    }

    // Back to the line
    for i in 0..8 {
        pts.push((145.0 + i as f64 * 0.625, START_Y));
    }

    pts
}

/// Assign sector ids to raw coordinates from a sector list
fn points_for(coords: &[(f64, f64)], sectors: &[Sector]) -> Vec<TrackPoint> {
    coords
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| TrackPoint {
            x,
            y,
            sector: sectors
                .iter()
                .find(|s| s.contains(i))
                .map(|s| s.id)
                .unwrap_or(1),
        })
        .collect()
}

/// The default race circuit
pub fn default_track() -> TrackModel {
    let coords = layout();
    let n = coords.len();
    let s2 = (n as f64 * SECTOR_SPLITS[0]) as usize;
    let s3 = (n as f64 * SECTOR_SPLITS[1]) as usize;

    let sectors = vec![
        Sector {
            id: 1,
            name: "Sector 1".to_string(),
            start_index: 0,
            end_index: s2,
            length_m: 1847.0,
            profile: SectorProfile::Straight,
            speed_ceiling_kph: 330.0,
        },
        Sector {
            id: 2,
            name: "Sector 2".to_string(),
            start_index: s2,
            end_index: s3,
            length_m: 1654.0,
            profile: SectorProfile::Mixed,
            speed_ceiling_kph: 285.0,
        },
        Sector {
            id: 3,
            name: "Sector 3".to_string(),
            start_index: s3,
            end_index: n,
            length_m: 1499.0,
            profile: SectorProfile::Technical,
            speed_ceiling_kph: 245.0,
        },
    ];

    TrackModel {
        name: "Circuit de Strategie".to_string(),
        country: "International".to_string(),
        total_length_m: 5000.0,
        points: points_for(&coords, &sectors),
        sectors,
        drs_zones: vec![
            DrsZone {
                id: "drs_1".to_string(),
                detection_pct: 0.92,
                activation_pct: 0.02,
                end_pct: 0.15,
            },
            DrsZone {
                id: "drs_2".to_string(),
                detection_pct: 0.35,
                activation_pct: 0.40,
                end_pct: 0.55,
            },
        ],
        pit_entry: Position::new(100.0, 570.0),
        pit_exit: Position::new(400.0, 570.0),
        start_line: Position::new(150.0, 550.0),
    }
}

/// Circular track split into equal thirds with one uniform speed ceiling
///
/// Used for scenario tests and benchmarks where the layout itself should not
/// influence the result.
pub fn oval(point_count: usize, length_m: f64, ceiling_kph: f64) -> TrackModel {
    let radius = 250.0;
    let coords: Vec<(f64, f64)> = (0..point_count)
        .map(|i| {
            let a = i as f64 / point_count as f64 * 2.0 * PI;
            (500.0 + a.cos() * radius, 350.0 + a.sin() * radius)
        })
        .collect();

    let third = point_count / 3;
    let bounds = [(0, third), (third, 2 * third), (2 * third, point_count)];
    let sectors: Vec<Sector> = bounds
        .iter()
        .enumerate()
        .map(|(i, &(start, end))| Sector {
            id: (i + 1) as u8,
            name: format!("Sector {}", i + 1),
            start_index: start,
            end_index: end,
            length_m: length_m * (end - start) as f64 / point_count as f64,
            profile: SectorProfile::Mixed,
            speed_ceiling_kph: ceiling_kph,
        })
        .collect();

    TrackModel {
        name: "Test Oval".to_string(),
        country: "Nowhere".to_string(),
        total_length_m: length_m,
        points: points_for(&coords, &sectors),
        sectors,
        drs_zones: vec![DrsZone {
            id: "drs_1".to_string(),
            detection_pct: 0.85,
            activation_pct: 0.95,
            end_pct: 0.25,
        }],
        pit_entry: Position::new(500.0 - radius, 420.0),
        pit_exit: Position::new(500.0 - radius, 280.0),
        start_line: Position::new(500.0 + radius, 350.0),
    }
}

// =============================================================================
// Teams & drivers
// =============================================================================

const TEAMS: [(&str, &str, &str); 10] = [
    ("RBR", "Red Bull Racing", "#0600ef"),
    ("FER", "Ferrari", "#dc0000"),
    ("MER", "Mercedes", "#00d2be"),
    ("MCL", "McLaren", "#ff8700"),
    ("AST", "Aston Martin", "#006f62"),
    ("ALP", "Alpine", "#0090ff"),
    ("WIL", "Williams", "#005aff"),
    ("ATR", "AlphaTauri", "#2b4562"),
    ("ALF", "Alfa Romeo", "#900000"),
    ("HAS", "Haas", "#ffffff"),
];

const DRIVER_NAMES: [&str; 20] = [
    "M. Verstappen",
    "S. Perez",
    "C. Leclerc",
    "C. Sainz",
    "L. Hamilton",
    "G. Russell",
    "L. Norris",
    "O. Piastri",
    "F. Alonso",
    "L. Stroll",
    "P. Gasly",
    "E. Ocon",
    "A. Albon",
    "L. Sargeant",
    "Y. Tsunoda",
    "D. Ricciardo",
    "V. Bottas",
    "Z. Guanyu",
    "K. Magnussen",
    "N. Hulkenberg",
];

/// Roster with `num_cars` drivers, teams assigned round-robin
pub fn default_roster(num_cars: usize) -> Roster {
    let teams: Vec<Team> = TEAMS
        .iter()
        .map(|&(id, name, color)| Team {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
        })
        .collect();

    let drivers = (0..num_cars)
        .map(|i| Driver {
            name: DRIVER_NAMES
                .get(i)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("Reserve {}", i + 1)),
            team_id: teams[i % teams.len()].id.clone(),
            number: (i + 1) as u16,
        })
        .collect();

    Roster { teams, drivers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_track_is_valid() {
        let track = default_track();
        assert_eq!(track.validate(), Ok(()));
        assert_eq!(track.points.len(), 226);
        assert_eq!(track.sectors[0].end_index, 79);
        assert_eq!(track.sectors[1].end_index, 158);
        assert_eq!(track.sectors[2].end_index, 226);
    }

    #[test]
    fn test_sector_lengths_sum_to_track_length() {
        let track = default_track();
        let total: f64 = track.sectors.iter().map(|s| s.length_m).sum();
        assert_eq!(total, track.total_length_m);
    }

    #[test]
    fn test_point_sectors_match_ranges() {
        let track = default_track();
        for (i, p) in track.points.iter().enumerate() {
            assert_eq!(Some(p.sector), track.sector_for_index(i).map(|s| s.id));
        }
    }

    #[test]
    fn test_oval_is_valid() {
        let track = oval(100, 1000.0, 300.0);
        assert_eq!(track.validate(), Ok(()));
        assert_eq!(track.sectors[0].end_index, 33);
        assert_eq!(track.sectors[2].end_index, 100);
        assert_eq!(track.meters_per_point(), 10.0);
    }

    #[test]
    fn test_roster_assigns_teams_round_robin() {
        let roster = default_roster(20);
        assert_eq!(roster.teams.len(), 10);
        assert_eq!(roster.drivers.len(), 20);
        assert_eq!(roster.drivers[0].team_id, "RBR");
        assert_eq!(roster.drivers[10].team_id, "RBR");
        assert_eq!(roster.drivers[19].name, "N. Hulkenberg");
        assert_eq!(roster.drivers[19].team_id, "HAS");
    }

    #[test]
    fn test_roster_beyond_named_drivers() {
        let roster = default_roster(22);
        assert_eq!(roster.drivers[21].name, "Reserve 22");
        assert_eq!(roster.drivers[21].number, 22);
    }
}
