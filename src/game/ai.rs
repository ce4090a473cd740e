//! Server-controlled opponent steering

use std::f64::consts::PI;

use rand::Rng;

use super::math::{bearing, distance, turn_toward};
use super::physics::{Car, ENEMY_TURN_SPEED};

/// Radius of the circle the AI roams while holding the flag
pub const ROAM_RADIUS: f64 = 200.0;
/// Holding AI heads straight back to center once farther than this
pub const RETURN_RADIUS: f64 = 400.0;
/// Angular speed of the roam target around center, radians per second
pub const ROAM_ANGULAR_SPEED: f64 = 0.5;
/// Chase distance at which the bias offset reaches full strength
pub const BIAS_FALLOFF_DISTANCE: f64 = 300.0;
/// Maximum chase heading offset per unit of bias, radians
pub const CHASE_BIAS_WEIGHT: f64 = 0.4;
/// Bias is drawn uniformly from `[-MAX_BIAS, MAX_BIAS]` at each reset
pub const MAX_BIAS: f64 = 1.0;

/// The AI's car plus its per-match steering bias
#[derive(Debug, Clone)]
pub struct AiCar {
    pub car: Car,
    pub bias: f64,
}

impl AiCar {
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let mut ai = Self {
            car: Car::at_origin(),
            bias: 0.0,
        };
        ai.reset(rng);
        ai
    }

    /// Canonical start pose: on the roam circle at angle π, heading 2π
    pub fn start_pose() -> (f64, f64, f64) {
        (PI.cos() * ROAM_RADIUS, PI.sin() * ROAM_RADIUS, PI + PI)
    }

    /// Restore the start pose, clear flag state and draw a fresh bias
    pub fn reset<R: Rng>(&mut self, rng: &mut R) {
        let (x, z, angle) = Self::start_pose();
        self.car.place(x, z, angle);
        self.bias = rng.gen_range(-MAX_BIAS..=MAX_BIAS);
    }

    /// Heading the AI wants this tick.
    ///
    /// `holder` is the position of the flag holder when that is another car.
    /// Returns `None` when there is nothing to steer toward.
    pub fn target_heading(&self, elapsed: f64, holder: Option<(f64, f64)>) -> Option<f64> {
        let me = &self.car;

        if me.has_flag {
            if distance(me.x, me.z, 0.0, 0.0) > RETURN_RADIUS {
                return bearing(me.x, me.z, 0.0, 0.0);
            }
            let roam_angle = elapsed * ROAM_ANGULAR_SPEED + self.bias;
            let tx = roam_angle.cos() * ROAM_RADIUS;
            let tz = roam_angle.sin() * ROAM_RADIUS;
            return bearing(me.x, me.z, tx, tz);
        }

        let (hx, hz) = holder?;
        let dist = distance(me.x, me.z, hx, hz);
        let direct = bearing(me.x, me.z, hx, hz)?;
        let bias_scale = (dist / BIAS_FALLOFF_DISTANCE).min(1.0);
        Some(direct + self.bias * bias_scale * CHASE_BIAS_WEIGHT)
    }

    /// Turn toward the target heading at the AI's bounded rate
    pub fn steer(&mut self, elapsed: f64, holder: Option<(f64, f64)>, dt: f64) {
        if let Some(target) = self.target_heading(elapsed, holder) {
            self.car.angle = turn_toward(self.car.angle, target, ENEMY_TURN_SPEED * dt);
        }
    }
}
