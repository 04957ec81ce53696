use crate::scan::Sample;
use std::cmp::Ordering;

/// Projects a polar measurement into Cartesian sensor coordinates.
///
/// Pure function of the measurement; the decoders never deal in Cartesian
/// space. Returns `(x, y)` in meters, with x along the sensor's zero
/// direction.
#[inline]
pub fn to_cartesian(angle: f32, distance: f32) -> (f32, f32) {
    (angle.cos() * distance, angle.sin() * distance)
}

/// Projects a polar measurement with a display-only rotation offset applied,
/// as an interactive viewer does when the user re-orientates the picture.
/// The offset affects presentation only; recorded data keeps raw angles.
#[inline]
pub fn to_cartesian_rotated(angle: f32, distance: f32, rotation: f32) -> (f32, f32) {
    to_cartesian(angle - rotation, distance)
}

/// Sorts samples in place by ascending angle.
///
/// Decoder output is in time order, which matches angle order within a
/// rotation except around correction deltas; consumers that index by angle
/// can normalize with this.
pub fn sort_samples(samples: &mut [Sample]) {
    samples.sort_by(|a, b| a.angle.partial_cmp(&b.angle).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn cartesian_projection_of_cardinal_angles() {
        let (x, y) = to_cartesian(0.0, 2.0);
        assert!((x - 2.0).abs() < 1e-6);
        assert!(y.abs() < 1e-6);

        let (x, y) = to_cartesian(FRAC_PI_2, 1.0);
        assert!(x.abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rotation_offset_shifts_the_picture() {
        let (x, y) = to_cartesian_rotated(PI, 1.5, PI);
        assert!((x - 1.5).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn samples_sort_by_angle() {
        let mut samples: Vec<Sample> = [2.0f32, 0.5, 1.0]
            .iter()
            .map(|&angle| Sample {
                angle,
                distance: 1.0,
                quality: None,
            })
            .collect();
        sort_samples(&mut samples);
        let angles: Vec<f32> = samples.iter().map(|s| s.angle).collect();
        assert_eq!(angles, vec![0.5, 1.0, 2.0]);
    }
}
