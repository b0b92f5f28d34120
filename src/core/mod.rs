//! Core primitives.
//!
//! Small pure helpers shared by the simulation and the presentation models.

pub mod angle;
pub mod digits;
pub mod lenient;

// Re-export core helpers
pub use angle::{angle_toward, angle_to_radians, normalize_angle};
pub use digits::{layout_digits, DigitCell};
