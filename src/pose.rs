//! Landmark-driven head pose estimation.
//!
//! Converts a sparse facial landmark set into an approximate head rotation.
//! This is a best-effort heuristic, not a calibrated 3D pose solver: three
//! fixed landmark indices are enough to get a convincing yaw/pitch for a
//! head proxy mesh.

use serde::{Deserialize, Serialize};

/// Landmark indices with fixed semantics (MediaPipe FaceMesh numbering).
pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 263;
pub const NOSE_TIP: usize = 1;

/// Normalization constant for yaw: the horizontal nose offset is treated as
/// the opposite leg of a triangle with this adjacent leg. Empirical; chosen
/// so a nose halfway to the eye corner reads as roughly a 30 degree turn.
pub const YAW_SCALE: f32 = 0.5;

/// Empirical pitch gain, tuned so neutral forward gaze yields near-zero
/// pitch on the head proxy.
pub const PITCH_SCALE: f32 = 2.0;

/// A single facial landmark in normalized image space (0.0..=1.0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// Head rotation produced by the estimator, in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadRotation {
    /// Rotation about the horizontal axis; positive tips the head down.
    pub pitch: f32,
    /// Horizontal head turn; positive when the subject turns toward the
    /// image's right edge.
    pub yaw: f32,
}

/// Estimate head orientation from a landmark set.
///
/// Returns `None` when the set is absent or too short to contain all three
/// required indices - that is "no pose update available", never an error.
///
/// Authoritative convention (stable, documented): with `mid` the midpoint of
/// the two eye-outer landmarks,
///
/// ```text
/// yaw   = atan2(nose.x - mid.x, YAW_SCALE)
/// pitch = (nose.y - mid.y) * PITCH_SCALE
/// ```
///
/// The caller applies this as pitch about X and **negative** yaw about Y so
/// a head turned right in the source image turns the avatar right on screen.
pub fn estimate(landmarks: Option<&[Landmark]>) -> Option<HeadRotation> {
    let landmarks = landmarks?;
    let left = landmarks.get(LEFT_EYE_OUTER)?;
    let right = landmarks.get(RIGHT_EYE_OUTER)?;
    let nose = landmarks.get(NOSE_TIP)?;

    let mid_x = (left.x + right.x) / 2.0;
    let mid_y = (left.y + right.y) / 2.0;

    let yaw = (nose.x - mid_x).atan2(YAW_SCALE);
    let pitch = (nose.y - mid_y) * PITCH_SCALE;

    Some(HeadRotation { pitch, yaw })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a landmark set long enough to cover all required indices, with
    /// the three semantic points placed explicitly.
    fn sample_set(left: (f32, f32), right: (f32, f32), nose: (f32, f32)) -> Vec<Landmark> {
        let mut set = vec![Landmark::default(); RIGHT_EYE_OUTER + 1];
        set[LEFT_EYE_OUTER] = Landmark {
            x: left.0,
            y: left.1,
            z: 0.0,
        };
        set[RIGHT_EYE_OUTER] = Landmark {
            x: right.0,
            y: right.1,
            z: 0.0,
        };
        set[NOSE_TIP] = Landmark {
            x: nose.0,
            y: nose.1,
            z: 0.0,
        };
        set
    }

    #[test]
    fn test_absent_landmarks_is_no_update() {
        assert_eq!(estimate(None), None);
    }

    #[test]
    fn test_short_sets_are_no_update_never_panic() {
        assert_eq!(estimate(Some(&[])), None);
        // long enough for nose and left eye but not the right eye
        let set = vec![Landmark::default(); RIGHT_EYE_OUTER];
        assert_eq!(estimate(Some(&set)), None);
    }

    #[test]
    fn test_neutral_face_yields_zero_yaw_positive_pitch() {
        let set = sample_set((0.30, 0.40), (0.70, 0.40), (0.50, 0.55));
        let rot = estimate(Some(&set)).unwrap();

        // Nose centered between level eyes: no turn.
        assert!(rot.yaw.abs() < 1e-6, "yaw = {}", rot.yaw);
        // Nose below the eye midline by 0.15, scaled by 2.0.
        assert!((rot.pitch - 0.30).abs() < 1e-6, "pitch = {}", rot.pitch);
    }

    #[test]
    fn test_turned_head_yaw_sign_and_magnitude() {
        // Nose shifted toward the image's right edge: positive yaw.
        let set = sample_set((0.30, 0.40), (0.70, 0.40), (0.60, 0.47));
        let rot = estimate(Some(&set)).unwrap();
        assert!(rot.yaw > 0.0);
        assert!((rot.yaw - (0.10f32).atan2(YAW_SCALE)).abs() < 1e-6);

        // Mirror case turns the other way with the same magnitude.
        let mirrored = sample_set((0.30, 0.40), (0.70, 0.40), (0.40, 0.47));
        let rot_m = estimate(Some(&mirrored)).unwrap();
        assert!(rot_m.yaw < 0.0);
        assert!((rot.yaw + rot_m.yaw).abs() < 1e-6);
    }

    #[test]
    fn test_nose_above_midline_pitches_up() {
        let set = sample_set((0.30, 0.50), (0.70, 0.50), (0.50, 0.42));
        let rot = estimate(Some(&set)).unwrap();
        assert!(rot.pitch < 0.0);
    }
}
