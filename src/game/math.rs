//! Planar vector and heading helpers
//!
//! The world is the x/z ground plane. Headings are radians measured from +x
//! toward +z, matching `atan2(dz, dx)`.

use std::f64::consts::{PI, TAU};

/// Euclidean distance between two points on the ground plane
pub fn distance(ax: f64, az: f64, bx: f64, bz: f64) -> f64 {
    distance_sq(ax, az, bx, bz).sqrt()
}

/// Squared distance, for threshold checks without the square root
pub fn distance_sq(ax: f64, az: f64, bx: f64, bz: f64) -> f64 {
    let dx = bx - ax;
    let dz = bz - az;
    dx * dx + dz * dz
}

/// Heading pointing from `(fx, fz)` toward `(tx, tz)`.
/// Returns `None` when the points coincide.
pub fn bearing(fx: f64, fz: f64, tx: f64, tz: f64) -> Option<f64> {
    let dx = tx - fx;
    let dz = tz - fz;
    let len = (dx * dx + dz * dz).sqrt();
    if len > 0.0 {
        Some((dz / len).atan2(dx / len))
    } else {
        None
    }
}

/// Shortest signed angular difference from `current` to `target`, in `(-π, π]`.
///
/// Uses a Euclidean remainder so arbitrarily large (unnormalized) headings
/// still wrap correctly.
pub fn shortest_turn(current: f64, target: f64) -> f64 {
    let diff = (target - current + PI * 3.0).rem_euclid(TAU) - PI;
    if diff <= -PI {
        diff + TAU
    } else {
        diff
    }
}

/// Turn `current` toward `target` by at most `max_step` radians
pub fn turn_toward(current: f64, target: f64, max_step: f64) -> f64 {
    let diff = shortest_turn(current, target).clamp(-max_step, max_step);
    current + diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn distance_is_planar() {
        assert_approx_eq!(distance(0.0, 0.0, 3.0, 4.0), 5.0);
        assert_approx_eq!(distance_sq(1.0, 1.0, 4.0, 5.0), 25.0);
    }

    #[test]
    fn bearing_points_at_target() {
        assert_approx_eq!(bearing(0.0, 0.0, 10.0, 0.0).unwrap(), 0.0);
        assert_approx_eq!(bearing(0.0, 0.0, 0.0, 10.0).unwrap(), PI / 2.0);
        assert_approx_eq!(bearing(5.0, 5.0, -5.0, 5.0).unwrap(), PI);
        assert!(bearing(2.0, 2.0, 2.0, 2.0).is_none());
    }

    #[test]
    fn shortest_turn_takes_the_short_way() {
        assert_approx_eq!(shortest_turn(0.0, 0.5), 0.5);
        assert_approx_eq!(shortest_turn(0.5, 0.0), -0.5);
        // 350 degrees to 10 degrees is +20, not -340
        assert_approx_eq!(
            shortest_turn(350f64.to_radians(), 10f64.to_radians()),
            20f64.to_radians()
        );
    }

    #[test]
    fn shortest_turn_stays_in_half_open_range() {
        let headings = [
            -100.0, -7.0, -PI, -1.0, 0.0, 0.3, PI, 2.0 * PI, 9.5, 250.0, 1.0e4,
        ];
        for &current in &headings {
            for &target in &headings {
                let diff = shortest_turn(current, target);
                assert!(diff > -PI && diff <= PI, "{current} -> {target} gave {diff}");
            }
        }
    }

    #[test]
    fn opposite_heading_wraps_to_positive_pi() {
        assert_approx_eq!(shortest_turn(0.0, PI), PI);
        assert_approx_eq!(shortest_turn(PI, 0.0), PI);
    }

    #[test]
    fn turn_toward_is_rate_limited() {
        let step = 0.1;
        for &(current, target) in &[(0.0, 3.0), (0.0, -3.0), (40.0, -40.0), (1.0, 1.05)] {
            let next = turn_toward(current, target, step);
            assert!((next - current).abs() <= step + 1e-12);
        }
        assert_approx_eq!(turn_toward(1.0, 1.05, step), 1.05);
    }
}
