//! Contact detection and flag transfer

use super::math::distance_sq;
use super::physics::Car;
use super::session::CarId;

/// Cars closer than this (center to center) are in contact
pub const COLLISION_RADIUS: f64 = 12.0;
/// Seconds a new holder is protected from losing the flag
pub const TRANSFER_IMMUNITY: f64 = 0.5;

/// A resolved flag handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagTransfer {
    pub from: CarId,
    pub to: CarId,
}

/// Every unordered pair of cars currently in contact, as indices into `cars`.
///
/// Pairs come out in canonical order: `(i, j)` with `i < j`, ordered by `i`
/// then `j`.
pub fn detect_contacts(cars: &[(CarId, &Car)]) -> Vec<(usize, usize)> {
    let radius_sq = COLLISION_RADIUS * COLLISION_RADIUS;
    let mut contacts = Vec::new();
    for i in 0..cars.len() {
        for j in (i + 1)..cars.len() {
            let (a, b) = (cars[i].1, cars[j].1);
            if distance_sq(a.x, a.z, b.x, b.z) < radius_sq {
                contacts.push((i, j));
            }
        }
    }
    contacts
}

/// Decide the flag transfer for this tick, if any.
///
/// A contact transfers only when exactly one side holds the flag and that
/// holder is not immune. Once a transfer is chosen both cars are settled for
/// the tick, so at most one transfer comes out (there is a single holder, and
/// the receiver is immune immediately). Among several contacts with the
/// holder, the first in canonical pair order wins.
pub fn resolve_transfer(cars: &[(CarId, &Car)], contacts: &[(usize, usize)]) -> Option<FlagTransfer> {
    contacts.iter().find_map(|&(i, j)| {
        let (a_id, a) = cars[i];
        let (b_id, b) = cars[j];
        match (a.has_flag, b.has_flag) {
            (true, false) if !a.is_immune() => Some(FlagTransfer { from: a_id, to: b_id }),
            (false, true) if !b.is_immune() => Some(FlagTransfer { from: b_id, to: a_id }),
            _ => None,
        }
    })
}
