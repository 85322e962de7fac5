//! Pose-derived interaction measures
//!
//! Works on pose-tracking output for two animals (per frame, per body node,
//! an x/y position). Provides the per-frame measures used alongside BORIS
//! scoring: signed distance between the animals, within-animal node
//! distances, joint angles and node speeds. [`contact_bouts`] turns a per-frame
//! contact mask into an [`IntervalSequence`] that can be cleaned with the same
//! thresholds as hand-scored bouts.

use crate::error::BoutError;
use crate::types::{Interval, IntervalSequence};
use serde::{Deserialize, Serialize};

/// Position of one body node in one frame. Missing detections are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Pose track of one animal: `frames[frame][node]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseTrack {
    nodes: usize,
    frames: Vec<Vec<Point>>,
}

impl PoseTrack {
    /// Every frame must hold the same number of nodes
    pub fn new(frames: Vec<Vec<Point>>) -> Result<Self, BoutError> {
        let nodes = frames.first().map(Vec::len).unwrap_or_default();
        if let Some(frame) = frames.iter().position(|f| f.len() != nodes) {
            return Err(BoutError::InvalidInput(format!(
                "frame {} has {} nodes, expected {}",
                frame,
                frames[frame].len(),
                nodes
            )));
        }
        Ok(Self { nodes, frames })
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes
    }

    /// Position of `node` in every frame
    pub fn node_series(&self, node: usize) -> Result<Vec<Point>, BoutError> {
        self.check_node(node)?;
        Ok(self.frames.iter().map(|f| f[node]).collect())
    }

    fn check_node(&self, node: usize) -> Result<(), BoutError> {
        if node >= self.nodes {
            return Err(BoutError::InvalidInput(format!(
                "node {} out of range, track has {} nodes",
                node, self.nodes
            )));
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for PoseTrack {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            frames: Vec<Vec<Point>>,
        }

        let raw = Raw::deserialize(deserializer)?;
        PoseTrack::new(raw.frames).map_err(serde::de::Error::custom)
    }
}

/// Which animal of a pair starts on the left (smaller x)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    First,
    Second,
}

/// Two tracks of the same recording
#[derive(Debug, Clone, PartialEq)]
pub struct PosePair {
    first: PoseTrack,
    second: PoseTrack,
}

impl PosePair {
    pub fn new(first: PoseTrack, second: PoseTrack) -> Result<Self, BoutError> {
        if first.n_frames() != second.n_frames() || first.n_nodes() != second.n_nodes() {
            return Err(BoutError::InvalidInput(format!(
                "tracks differ in shape: {}x{} vs {}x{} (frames x nodes)",
                first.n_frames(),
                first.n_nodes(),
                second.n_frames(),
                second.n_nodes()
            )));
        }
        Ok(Self { first, second })
    }

    pub fn first(&self) -> &PoseTrack {
        &self.first
    }

    pub fn second(&self) -> &PoseTrack {
        &self.second
    }

    /// Animal whose `node` has the smaller x in the first frame. Ties go to
    /// the first track.
    pub fn left_animal(&self, node: usize) -> Result<Side, BoutError> {
        let a = self.first.node_series(node)?;
        let b = self.second.node_series(node)?;
        match (a.first(), b.first()) {
            (Some(a), Some(b)) if a.x > b.x => Ok(Side::Second),
            (Some(_), Some(_)) => Ok(Side::First),
            _ => Err(BoutError::InvalidInput("tracks have no frames".to_string())),
        }
    }

    /// Per-frame distance between the animals at `node`, negative in frames
    /// where the left animal has moved past the right one
    pub fn distances_between(&self, node: usize) -> Result<Vec<f64>, BoutError> {
        let (left, right) = self.left_right(node)?;
        Ok(left
            .iter()
            .zip(&right)
            .map(|(l, r)| {
                let d = l.distance_to(r);
                if l.x > r.x {
                    -d
                } else {
                    d
                }
            })
            .collect())
    }

    /// Per-frame contact mask along x at `node`, see [`contact_frames`]
    pub fn contact(&self, node: usize, epsilon: f64) -> Result<Vec<bool>, BoutError> {
        let a: Vec<f64> = self.first.node_series(node)?.iter().map(|p| p.x).collect();
        let b: Vec<f64> = self.second.node_series(node)?.iter().map(|p| p.x).collect();
        contact_frames(&a, &b, epsilon)
    }

    fn left_right(&self, node: usize) -> Result<(Vec<Point>, Vec<Point>), BoutError> {
        let a = self.first.node_series(node)?;
        let b = self.second.node_series(node)?;
        Ok(match self.left_animal(node)? {
            Side::First => (a, b),
            Side::Second => (b, a),
        })
    }
}

/// Per-frame distance between two nodes of the same animal
pub fn node_distances(track: &PoseTrack, node_a: usize, node_b: usize) -> Result<Vec<f64>, BoutError> {
    let a = track.node_series(node_a)?;
    let b = track.node_series(node_b)?;
    Ok(a.iter().zip(&b).map(|(p, q)| p.distance_to(q)).collect())
}

/// Per-frame angle at `vertex` from `node_a` to `node_c`, in degrees within
/// `[0, 360)`
pub fn joint_angles(
    track: &PoseTrack,
    node_a: usize,
    vertex: usize,
    node_c: usize,
) -> Result<Vec<f64>, BoutError> {
    let a = track.node_series(node_a)?;
    let b = track.node_series(vertex)?;
    let c = track.node_series(node_c)?;
    Ok(a.iter()
        .zip(&b)
        .zip(&c)
        .map(|((a, b), c)| {
            let angle = ((c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x)).to_degrees();
            if angle < 0.0 {
                angle + 360.0
            } else {
                angle
            }
        })
        .collect())
}

/// Per-frame speed of `node` in units per second.
///
/// Each frame uses the displacement from the previous frame; the first frame
/// reuses the first displacement.
pub fn node_speeds(track: &PoseTrack, node: usize, fps: f64) -> Result<Vec<f64>, BoutError> {
    check_fps(fps)?;
    let series = track.node_series(node)?;
    if series.len() < 2 {
        return Ok(vec![0.0; series.len()]);
    }
    let steps: Vec<f64> = series
        .windows(2)
        .map(|w| w[0].distance_to(&w[1]) * fps)
        .collect();
    let mut speeds = Vec::with_capacity(series.len());
    speeds.push(steps[0]);
    speeds.extend(steps);
    Ok(speeds)
}

/// Per-frame contact between two animals facing each other along one axis
/// (nose x positions in a tube test).
///
/// The animal with the smaller value in the first frame is the left one. A
/// frame is in contact when the two positions are closer than `epsilon` or
/// the left animal has moved past the right one.
pub fn contact_frames(first: &[f64], second: &[f64], epsilon: f64) -> Result<Vec<bool>, BoutError> {
    if first.len() != second.len() {
        return Err(BoutError::InvalidInput(format!(
            "position series differ in length: {} vs {}",
            first.len(),
            second.len()
        )));
    }
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(BoutError::InvalidInput(format!(
            "epsilon must be a finite value >= 0, got {}",
            epsilon
        )));
    }
    let (left, right) = match (first.first(), second.first()) {
        (Some(a), Some(b)) if a > b => (second, first),
        _ => (first, second),
    };
    Ok(left
        .iter()
        .zip(right)
        .map(|(l, r)| (l - r).abs() < epsilon || l > r)
        .collect())
}

/// Runs of `true` frames as intervals in seconds. A run covering frames
/// `i..j` becomes `[i / fps, j / fps]`.
pub fn contact_bouts(mask: &[bool], fps: f64) -> Result<IntervalSequence, BoutError> {
    check_fps(fps)?;
    let mut intervals = Vec::new();
    let mut run_start = None;
    for (frame, &on) in mask.iter().enumerate() {
        match (on, run_start) {
            (true, None) => run_start = Some(frame),
            (false, Some(start)) => {
                intervals.push(Interval::new(start as f64 / fps, frame as f64 / fps)?);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        intervals.push(Interval::new(start as f64 / fps, mask.len() as f64 / fps)?);
    }
    IntervalSequence::from_sorted(intervals)
}

fn check_fps(fps: f64) -> Result<(), BoutError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(BoutError::InvalidInput(format!(
            "fps must be a finite value > 0, got {}",
            fps
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::threshold_bouts;
    use crate::types::Thresholds;
    use pretty_assertions::assert_eq;

    /// Two-node track (nose, tail) moving along x
    fn track(noses: &[(f64, f64)]) -> PoseTrack {
        PoseTrack::new(
            noses
                .iter()
                .map(|&(x, y)| vec![Point::new(x, y), Point::new(x - 3.0, y)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_ragged_frames_rejected() {
        let frames = vec![vec![Point::new(0.0, 0.0)], vec![]];
        assert!(matches!(
            PoseTrack::new(frames),
            Err(BoutError::InvalidInput(_))
        ));
        let json = r#"{"frames": [[{"x": 0.0, "y": 0.0}], []]}"#;
        assert!(serde_json::from_str::<PoseTrack>(json).is_err());
    }

    #[test]
    fn test_node_out_of_range() {
        let t = track(&[(0.0, 0.0)]);
        assert!(t.node_series(2).is_err());
        assert!(node_distances(&t, 0, 5).is_err());
    }

    #[test]
    fn test_signed_distance_between_animals() {
        // Second animal starts on the left and crosses over in frame 2
        let pair = PosePair::new(
            track(&[(10.0, 0.0), (10.0, 0.0), (10.0, 0.0)]),
            track(&[(4.0, 0.0), (6.0, 3.0), (12.0, 0.0)]),
        )
        .unwrap();
        assert_eq!(pair.left_animal(0).unwrap(), Side::Second);
        assert_eq!(pair.distances_between(0).unwrap(), vec![6.0, 5.0, -2.0]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        assert!(PosePair::new(track(&[(0.0, 0.0)]), track(&[(0.0, 0.0), (1.0, 0.0)])).is_err());
    }

    #[test]
    fn test_node_distances_within_animal() {
        let t = track(&[(5.0, 1.0), (9.0, 2.0)]);
        assert_eq!(node_distances(&t, 0, 1).unwrap(), vec![3.0, 3.0]);
    }

    #[test]
    fn test_joint_angles_wrap_to_positive() {
        let t = PoseTrack::new(vec![
            vec![Point::new(1.0, 0.0), Point::new(0.0, 0.0), Point::new(0.0, 1.0)],
            vec![Point::new(0.0, 1.0), Point::new(0.0, 0.0), Point::new(1.0, 0.0)],
        ])
        .unwrap();
        let angles = joint_angles(&t, 0, 1, 2).unwrap();
        assert!((angles[0] - 90.0).abs() < 1e-9);
        assert!((angles[1] - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_node_speeds() {
        let t = track(&[(0.0, 0.0), (3.0, 4.0), (3.0, 4.0)]);
        assert_eq!(node_speeds(&t, 0, 30.0).unwrap(), vec![150.0, 150.0, 0.0]);
        assert_eq!(node_speeds(&track(&[(1.0, 1.0)]), 0, 30.0).unwrap(), vec![0.0]);
        assert!(node_speeds(&t, 0, 0.0).is_err());
    }

    #[test]
    fn test_contact_by_proximity_or_crossing() {
        let first = [0.0, 4.0, 9.5, 12.0, 2.0];
        let second = [10.0, 10.0, 10.0, 10.0, 10.0];
        assert_eq!(
            contact_frames(&first, &second, 1.0).unwrap(),
            vec![false, false, true, true, false]
        );
        // Same answer when the right animal is passed first
        assert_eq!(
            contact_frames(&second, &first, 1.0).unwrap(),
            vec![false, false, true, true, false]
        );
    }

    #[test]
    fn test_contact_input_checks() {
        assert!(contact_frames(&[0.0], &[0.0, 1.0], 1.0).is_err());
        assert!(contact_frames(&[0.0], &[1.0], -1.0).is_err());
        assert!(contact_frames(&[], &[], 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_contact_bouts_feed_thresholding() {
        let mask = [false, true, true, false, true, false, false, false, true, true];
        let bouts = contact_bouts(&mask, 2.0).unwrap();
        assert_eq!(
            bouts.to_array(),
            vec![[0.5, 1.5], [2.0, 2.5], [4.0, 5.0]]
        );

        let cleaned = threshold_bouts(&bouts, &Thresholds::new(1.0, 1.0).unwrap());
        assert_eq!(cleaned.to_array(), vec![[0.5, 2.5], [4.0, 5.0]]);
    }
}
