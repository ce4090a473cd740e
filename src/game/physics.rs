//! Car model and movement constants

use std::f64::consts::PI;

/// Forward speed of the AI car, units per second
pub const BASE_SPEED: f64 = 60.0 * 3.0;
/// Human cars move this much faster than the AI
pub const PLAYER_SPEED_MULTIPLIER: f64 = 1.2;
/// Speed factor applied while carrying the flag
pub const FLAG_SPEED_MULTIPLIER: f64 = 0.8;
/// Human turn rate, radians per second
pub const TURN_SPEED: f64 = PI * 1.5;
/// AI turn rate, radians per second
pub const ENEMY_TURN_SPEED: f64 = TURN_SPEED * 0.5;
/// Side length of the square world
pub const WORLD_SIZE: f64 = 800.0 * 3.0;
pub const WORLD_HALF: f64 = WORLD_SIZE / 2.0;

/// Player steering intent (latest input wins)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnInput {
    pub left: bool,
    pub right: bool,
    /// Client-supplied or server-assigned timestamp, milliseconds.
    /// Retained but never used to reject input.
    pub timestamp: f64,
}

/// A car on the ground plane (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    pub x: f64,
    pub z: f64,
    /// Heading in radians, never normalized
    pub angle: f64,
    pub has_flag: bool,
    /// Seconds left during which the flag cannot be taken from this car
    pub immunity_timer: f64,
}

impl Car {
    pub fn new(x: f64, z: f64, angle: f64) -> Self {
        Self {
            x,
            z,
            angle,
            has_flag: false,
            immunity_timer: 0.0,
        }
    }

    /// Player spawn pose: origin, facing +x
    pub fn at_origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Put the car back at a pose and clear flag and immunity
    pub fn place(&mut self, x: f64, z: f64, angle: f64) {
        *self = Self::new(x, z, angle);
    }

    pub fn is_immune(&self) -> bool {
        self.immunity_timer > 0.0
    }

    /// Take the flag and stay protected for `immunity` seconds
    pub fn grant_flag(&mut self, immunity: f64) {
        self.has_flag = true;
        self.immunity_timer = immunity;
    }

    pub fn drop_flag(&mut self) {
        self.has_flag = false;
    }

    /// Apply a player's turn intent for one step
    pub fn steer(&mut self, input: &TurnInput, dt: f64) {
        if input.left {
            self.angle -= TURN_SPEED * dt;
        }
        if input.right {
            self.angle += TURN_SPEED * dt;
        }
    }

    /// Advance along the current heading, clamp to the world, decay immunity.
    pub fn integrate(&mut self, dt: f64, base_speed: f64) {
        let speed = base_speed
            * if self.has_flag {
                FLAG_SPEED_MULTIPLIER
            } else {
                1.0
            };

        self.x += self.angle.cos() * speed * dt;
        self.z += self.angle.sin() * speed * dt;

        self.x = self.x.clamp(-WORLD_HALF, WORLD_HALF);
        self.z = self.z.clamp(-WORLD_HALF, WORLD_HALF);

        self.immunity_timer = (self.immunity_timer - dt).max(0.0);
    }
}
