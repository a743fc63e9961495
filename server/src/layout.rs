//! Spatial registry: lamps, their points and each point's distance to every
//! epicenter group, built once at startup from the layout file.

use crate::error::LayoutError;
use blinker_shared::color::Rgb;
use blinker_shared::vec3::{min_distance, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One LED as described in the layout file:
/// `{"ip": "10.0.0.21", "index": 3, "x": 12.5, "y": 80.0, "z": 4.0}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    #[serde(rename = "ip")]
    pub address: String,
    pub index: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A light point within a lamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub position: Vec3,
    /// Minimum distance to each epicenter group, indexed by group
    pub radii: Vec<f64>,
    pub color: Rgb,
}

/// A networked fixture with a fixed number of points.
#[derive(Debug, Clone, PartialEq)]
pub struct Lamp {
    pub address: String,
    pub points: Vec<Point>,
}

impl Lamp {
    pub fn colors(&self) -> impl Iterator<Item = Rgb> + '_ {
        self.points.iter().map(|p| p.color)
    }
}

/// All lamps plus per-group radius bounds.
#[derive(Debug, Clone)]
pub struct Layout {
    lamps: BTreeMap<String, Lamp>,
    max_radii: Vec<f64>,
    point_count: usize,
}

impl Layout {
    /// Build the layout from point records.
    ///
    /// Every lamp must define each slot in `0..point_count` exactly once.
    pub fn load(
        records: &[PointRecord],
        groups: &[Vec<Vec3>],
        point_count: usize,
    ) -> Result<Self, LayoutError> {
        if groups.is_empty() || groups.iter().any(|g| g.is_empty()) {
            return Err(LayoutError::NoEpicenters);
        }
        if records.is_empty() {
            return Err(LayoutError::MalformedInput(
                "layout contains no points".to_string(),
            ));
        }

        let mut slots: BTreeMap<String, Vec<Option<Point>>> = BTreeMap::new();
        let mut max_radii = vec![0.0_f64; groups.len()];

        for record in records {
            let position = Vec3::new(record.x, record.y, record.z);
            if !position.is_finite() {
                return Err(LayoutError::MalformedInput(format!(
                    "lamp {} slot {} has a non-finite coordinate",
                    record.address, record.index
                )));
            }
            let index = usize::try_from(record.index)
                .ok()
                .filter(|&i| i < point_count)
                .ok_or_else(|| LayoutError::SlotIndexOutOfRange {
                    address: record.address.clone(),
                    index: record.index,
                    point_count,
                })?;

            let lamp = slots
                .entry(record.address.clone())
                .or_insert_with(|| vec![None; point_count]);
            if lamp[index].is_some() {
                return Err(LayoutError::DuplicateSlot {
                    address: record.address.clone(),
                    index,
                });
            }

            let radii: Vec<f64> = groups
                .iter()
                .map(|g| min_distance(position, g).unwrap_or(0.0))
                .collect();
            for (max, &r) in max_radii.iter_mut().zip(&radii) {
                *max = max.max(r);
            }

            lamp[index] = Some(Point {
                position,
                radii,
                color: Rgb::BLACK,
            });
        }

        let mut lamps = BTreeMap::new();
        for (address, points) in slots {
            let points = points
                .into_iter()
                .enumerate()
                .map(|(index, p)| {
                    p.ok_or_else(|| LayoutError::MissingSlot {
                        address: address.clone(),
                        index,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            lamps.insert(address.clone(), Lamp { address, points });
        }

        Ok(Self {
            lamps,
            max_radii,
            point_count,
        })
    }

    /// Parse the JSON layout file format and build the layout.
    pub fn from_json(
        data: &[u8],
        groups: &[Vec<Vec3>],
        point_count: usize,
    ) -> Result<Self, LayoutError> {
        let records: Vec<PointRecord> = serde_json::from_slice(data)?;
        Self::load(&records, groups, point_count)
    }

    pub fn lamp(&self, address: &str) -> Option<&Lamp> {
        self.lamps.get(address)
    }

    /// Lamps in address order
    pub fn lamps(&self) -> impl Iterator<Item = &Lamp> {
        self.lamps.values()
    }

    pub fn lamps_mut(&mut self) -> impl Iterator<Item = &mut Lamp> {
        self.lamps.values_mut()
    }

    pub fn lamp_count(&self) -> usize {
        self.lamps.len()
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn group_count(&self) -> usize {
        self.max_radii.len()
    }

    /// Largest point radius observed for `group`
    pub fn max_radius(&self, group: usize) -> f64 {
        self.max_radii[group]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blinker_shared::vec3::{distance, vec3};
    use proptest::prelude::*;

    fn record(address: &str, index: i64, x: f64, y: f64, z: f64) -> PointRecord {
        PointRecord {
            address: address.to_string(),
            index,
            x,
            y,
            z,
        }
    }

    fn full_lamp(address: &str, n: usize, x0: f64) -> Vec<PointRecord> {
        (0..n)
            .map(|i| record(address, i as i64, x0 + i as f64, 0.0, 0.0))
            .collect()
    }

    fn groups() -> Vec<Vec<Vec3>> {
        vec![
            vec![vec3(0.0, 0.0, 0.0), vec3(100.0, 0.0, 0.0)],
            vec![vec3(100.0, 0.0, 0.0)],
        ]
    }

    #[test]
    fn builds_lamps_with_fixed_slot_count() {
        let mut records = full_lamp("10.0.0.1", 4, 0.0);
        records.extend(full_lamp("10.0.0.2", 4, 50.0));
        let layout = Layout::load(&records, &groups(), 4).unwrap();

        assert_eq!(layout.lamp_count(), 2);
        for lamp in layout.lamps() {
            assert_eq!(lamp.points.len(), 4);
            assert!(lamp.colors().all(|c| c == Rgb::BLACK));
        }
        let lamp = layout.lamp("10.0.0.2").unwrap();
        assert_eq!(lamp.points[3].position, vec3(53.0, 0.0, 0.0));
    }

    #[test]
    fn records_may_arrive_in_any_slot_order() {
        let mut records = full_lamp("a", 3, 0.0);
        records.reverse();
        let layout = Layout::load(&records, &groups(), 3).unwrap();
        let lamp = layout.lamp("a").unwrap();
        assert_eq!(lamp.points[0].position, vec3(0.0, 0.0, 0.0));
        assert_eq!(lamp.points[2].position, vec3(2.0, 0.0, 0.0));
    }

    #[test]
    fn radius_is_min_over_group() {
        let records = vec![record("a", 0, 70.0, 0.0, 0.0)];
        let layout = Layout::load(&records, &groups(), 1).unwrap();
        let point = &layout.lamp("a").unwrap().points[0];
        assert!((point.radii[0] - 30.0).abs() < 1e-12);
        assert!((point.radii[1] - 30.0).abs() < 1e-12);

        let records = vec![record("a", 0, 10.0, 0.0, 0.0)];
        let layout = Layout::load(&records, &groups(), 1).unwrap();
        let point = &layout.lamp("a").unwrap().points[0];
        assert!((point.radii[0] - 10.0).abs() < 1e-12);
        assert!((point.radii[1] - 90.0).abs() < 1e-12);
    }

    #[test]
    fn tracks_max_radius_per_group() {
        let records = vec![
            record("a", 0, 0.0, 0.0, 0.0),
            record("a", 1, 50.0, 0.0, 0.0),
            record("b", 0, 100.0, 30.0, 0.0),
            record("b", 1, -20.0, 0.0, 0.0),
        ];
        let layout = Layout::load(&records, &groups(), 2).unwrap();
        assert_eq!(layout.group_count(), 2);
        assert!((layout.max_radius(0) - 50.0).abs() < 1e-12);
        assert!((layout.max_radius(1) - 120.0).abs() < 1e-12);
    }

    #[test]
    fn slot_index_out_of_range_rejected() {
        let mut records = full_lamp("a", 16, 0.0);
        records.push(record("a", 16, 0.0, 0.0, 0.0));
        let err = Layout::load(&records, &groups(), 16).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::SlotIndexOutOfRange { index: 16, point_count: 16, .. }
        ));
    }

    #[test]
    fn negative_slot_index_rejected() {
        let records = vec![record("a", -1, 0.0, 0.0, 0.0)];
        let err = Layout::load(&records, &groups(), 1).unwrap_err();
        assert!(matches!(err, LayoutError::SlotIndexOutOfRange { index: -1, .. }));
    }

    #[test]
    fn duplicate_slot_rejected() {
        let mut records = full_lamp("a", 2, 0.0);
        records.push(record("a", 1, 9.0, 9.0, 9.0));
        let err = Layout::load(&records, &groups(), 2).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateSlot { index: 1, .. }));
    }

    #[test]
    fn missing_slot_rejected() {
        let records = vec![record("a", 0, 0.0, 0.0, 0.0), record("a", 2, 0.0, 0.0, 0.0)];
        let err = Layout::load(&records, &groups(), 3).unwrap_err();
        assert!(matches!(err, LayoutError::MissingSlot { index: 1, .. }));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = Layout::from_json(b"[{\"ip\": \"a\", \"index\": \"zero\"}]", &groups(), 1)
            .unwrap_err();
        assert!(matches!(err, LayoutError::MalformedInput(_)));
        let err = Layout::from_json(b"not json", &groups(), 1).unwrap_err();
        assert!(matches!(err, LayoutError::MalformedInput(_)));
    }

    #[test]
    fn empty_layout_rejected() {
        let err = Layout::from_json(b"[]", &groups(), 1).unwrap_err();
        assert!(matches!(err, LayoutError::MalformedInput(_)));
    }

    #[test]
    fn empty_epicenter_group_rejected() {
        let records = full_lamp("a", 1, 0.0);
        let err = Layout::load(&records, &[vec![]], 1).unwrap_err();
        assert!(matches!(err, LayoutError::NoEpicenters));
    }

    #[test]
    fn parses_layout_file_format() {
        let json = br#"[
            {"ip": "10.0.0.21", "index": 0, "x": 3.0, "y": 4.0, "z": 0.0},
            {"ip": "10.0.0.21", "index": 1, "x": 0.0, "y": 0.0, "z": 0.0}
        ]"#;
        let layout = Layout::from_json(json, &[vec![Vec3::ZERO]], 2).unwrap();
        let lamp = layout.lamp("10.0.0.21").unwrap();
        assert!((lamp.points[0].radii[0] - 5.0).abs() < 1e-12);
        assert_eq!(lamp.points[1].radii[0], 0.0);
        assert!((layout.max_radius(0) - 5.0).abs() < 1e-12);
    }

    fn coord() -> impl Strategy<Value = f64> {
        -500.0..500.0_f64
    }

    fn point3() -> impl Strategy<Value = Vec3> {
        (coord(), coord(), coord()).prop_map(|(x, y, z)| vec3(x, y, z))
    }

    proptest! {
        #[test]
        fn radii_match_brute_force(
            positions in prop::collection::vec(point3(), 1..24),
            groups in prop::collection::vec(prop::collection::vec(point3(), 1..4), 1..4),
        ) {
            let records: Vec<PointRecord> = positions
                .iter()
                .enumerate()
                .map(|(i, p)| record("lamp", i as i64, p.x, p.y, p.z))
                .collect();
            let layout = Layout::load(&records, &groups, positions.len()).unwrap();
            let lamp = layout.lamp("lamp").unwrap();

            for (point, &pos) in lamp.points.iter().zip(&positions) {
                for (g, group) in groups.iter().enumerate() {
                    let mut best = f64::INFINITY;
                    for &c in group {
                        let d = distance(pos, c);
                        if d < best {
                            best = d;
                        }
                    }
                    prop_assert!((point.radii[g] - best).abs() < 1e-9);
                    prop_assert!(point.radii[g] <= layout.max_radius(g));
                }
            }
        }
    }
}
