//! Angle Arithmetic
//!
//! Facing angles are integers in a circular space of [`ANGLES`] units.
//! Angle 0 looks along +x, angles grow counter-clockwise (towards +y).

use std::f64::consts::TAU;

use crate::ANGLES;

/// Wrap any angle into `[0, ANGLES)`.
///
/// Works for arbitrarily large positive or negative inputs.
#[inline]
pub fn normalize_angle(angle: i32) -> i32 {
    angle.rem_euclid(ANGLES)
}

/// Convert an angle to radians (for presentation only).
#[inline]
pub fn angle_to_radians(angle: i32) -> f64 {
    normalize_angle(angle) as f64 / ANGLES as f64 * TAU
}

/// Angle of the bearing from `from` to `to`, both in world units.
///
/// Rounded to the nearest angle unit and normalized.
pub fn angle_toward(from: (i32, i32), to: (i32, i32)) -> i32 {
    let dx = f64::from(to.0) - f64::from(from.0);
    let dy = f64::from(to.1) - f64::from(from.1);

    let mut radians = dy.atan2(dx); // -pi..pi
    if radians < 0.0 {
        radians += TAU;
    }

    let units = (radians / TAU * ANGLES as f64).round() as i32;
    normalize_angle(units)
}
