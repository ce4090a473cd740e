//! The simulation context: every car, every session and the match clock.
//!
//! `World` does no I/O. Lifecycle events and ticks return the messages they
//! produce as [`Outbound`] records and the tick driver delivers them.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::util::time::tick_delta;
use crate::ws::protocol::{Pose, ServerMsg};

use super::ai::AiCar;
use super::collision::{detect_contacts, resolve_transfer, FlagTransfer, TRANSFER_IMMUNITY};
use super::physics::{Car, TurnInput, BASE_SPEED, PLAYER_SPEED_MULTIPLIER};
use super::r#match::{MatchPhase, MatchState};
use super::session::{CarId, PlayerId, SessionRegistry};
use super::snapshot::build_snapshot;

/// Who a message goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    One(PlayerId),
    All,
    AllExcept(PlayerId),
}

impl Recipients {
    pub fn includes(&self, player_id: PlayerId) -> bool {
        match self {
            Recipients::One(id) => *id == player_id,
            Recipients::All => true,
            Recipients::AllExcept(id) => *id != player_id,
        }
    }
}

/// A message produced by the simulation, not yet delivered
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipients,
    pub msg: ServerMsg,
}

impl Outbound {
    fn one(player_id: PlayerId, msg: ServerMsg) -> Self {
        Self {
            to: Recipients::One(player_id),
            msg,
        }
    }

    fn all(msg: ServerMsg) -> Self {
        Self {
            to: Recipients::All,
            msg,
        }
    }

    fn all_except(player_id: PlayerId, msg: ServerMsg) -> Self {
        Self {
            to: Recipients::AllExcept(player_id),
            msg,
        }
    }
}

pub struct World {
    rng: ChaCha8Rng,
    ai: AiCar,
    sessions: SessionRegistry,
    state: MatchState,
}

impl World {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let ai = AiCar::new(&mut rng);
        Self {
            rng,
            ai,
            sessions: SessionRegistry::new(),
            state: MatchState::new(),
        }
    }

    pub fn ai(&self) -> &AiCar {
        &self.ai
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Connected human players
    pub fn population(&self) -> usize {
        self.sessions.len()
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase(self.population())
    }

    pub(crate) fn car_mut(&mut self, id: CarId) -> Option<&mut Car> {
        match id {
            CarId::Ai => Some(&mut self.ai.car),
            CarId::Player(player_id) => self.sessions.get_mut(player_id).map(|s| &mut s.car),
        }
    }

    /// All live cars in canonical order: AI first, then players by join order
    pub fn cars(&self) -> Vec<(CarId, &Car)> {
        std::iter::once((CarId::Ai, &self.ai.car))
            .chain(self.sessions.iter().map(|s| (CarId::Player(s.player_id), &s.car)))
            .collect()
    }

    /// Number of cars currently carrying the flag
    pub fn flag_count(&self) -> usize {
        self.cars().iter().filter(|(_, car)| car.has_flag).count()
    }

    /// Register a new player. The first arrival into an empty world starts a
    /// fresh match.
    pub fn connect(&mut self, player_id: PlayerId, now_millis: f64) -> Vec<Outbound> {
        let session = self.sessions.insert(player_id, now_millis, &mut self.rng);
        let color = session.color;
        let car = &session.car;
        let position = Pose {
            x: car.x,
            z: car.z,
            angle: car.angle,
        };

        info!(player_id = %player_id, color, "Player connected");

        let out = vec![
            Outbound::one(player_id, ServerMsg::Joined { player_id, color }),
            Outbound::all_except(
                player_id,
                ServerMsg::PlayerJoined {
                    player_id,
                    color,
                    position,
                },
            ),
        ];

        if self.population() == 1 {
            self.reset();
        }

        out
    }

    /// Remove a player. Unknown ids produce nothing.
    pub fn disconnect(&mut self, player_id: PlayerId) -> Vec<Outbound> {
        let Some(session) = self.sessions.remove(player_id) else {
            return Vec::new();
        };
        info!(player_id = %player_id, "Player disconnected");

        let mut out = vec![Outbound::all(ServerMsg::PlayerLeft { player_id })];

        if self.sessions.is_empty() {
            self.reset();
        } else if session.car.has_flag {
            let departed = CarId::Player(player_id);
            let to = self.give_flag_to_random_car();
            info!(from = %departed, to = %to, "Holder left, flag reassigned");
            out.push(Outbound::all(ServerMsg::FlagTransfer {
                from_player_id: departed,
                to_player_id: to,
            }));
        }

        out
    }

    /// Store the latest steering intent. Returns false for unknown players.
    pub fn apply_input(&mut self, player_id: PlayerId, input: TurnInput) -> bool {
        self.sessions.set_input(player_id, input)
    }

    /// Start a fresh match with everyone currently present
    pub fn reset(&mut self) {
        self.state.reset();
        self.ai.reset(&mut self.rng);
        for session in self.sessions.iter_mut() {
            session.car.place(0.0, 0.0, 0.0);
        }
        let holder = self.give_flag_to_random_car();
        info!(
            holder = %holder,
            players = self.population(),
            ai_bias = self.ai.bias,
            "Match reset"
        );
    }

    /// Hand the flag to a uniformly random live car, AI included
    fn give_flag_to_random_car(&mut self) -> CarId {
        let pick = self.rng.gen_range(0..=self.sessions.len());
        let holder = match pick {
            0 => CarId::Ai,
            n => self
                .sessions
                .ids()
                .nth(n - 1)
                .map(CarId::Player)
                .unwrap_or(CarId::Ai),
        };
        if let Some(car) = self.car_mut(holder) {
            car.has_flag = true;
        }
        self.state.flag_holder = Some(holder);
        holder
    }

    /// One fixed simulation step. Does nothing while nobody is connected.
    pub fn tick(&mut self) -> Vec<Outbound> {
        if self.sessions.is_empty() {
            return Vec::new();
        }
        let dt = tick_delta();
        let mut out = Vec::new();

        // The clock stops at the duration; cars and scoring carry on.
        self.state.advance_clock();

        self.steer_ai(dt);

        self.ai.car.integrate(dt, BASE_SPEED);
        for session in self.sessions.iter_mut() {
            session.car.steer(&session.input, dt);
            session
                .car
                .integrate(dt, BASE_SPEED * PLAYER_SPEED_MULTIPLIER);
        }

        if let Some(transfer) = self.find_transfer() {
            self.execute_transfer(transfer);
            out.push(Outbound::all(ServerMsg::FlagTransfer {
                from_player_id: transfer.from,
                to_player_id: transfer.to,
            }));
        }

        self.state.accumulate_hold();
        debug_assert_eq!(self.flag_count(), 1, "exactly one car carries the flag");

        out.push(Outbound::all(build_snapshot(self)));
        out
    }

    fn steer_ai(&mut self, dt: f64) {
        let Some(holder) = self.state.flag_holder else {
            return;
        };
        let holder_pos = match holder {
            CarId::Ai => None,
            CarId::Player(player_id) => self.sessions.get(player_id).map(|s| (s.car.x, s.car.z)),
        };
        let elapsed = self.state.elapsed();
        self.ai.steer(elapsed, holder_pos, dt);
    }

    fn find_transfer(&self) -> Option<FlagTransfer> {
        let cars = self.cars();
        let contacts = detect_contacts(&cars);
        resolve_transfer(&cars, &contacts)
    }

    fn execute_transfer(&mut self, transfer: FlagTransfer) {
        if let Some(from) = self.car_mut(transfer.from) {
            from.drop_flag();
        }
        if let Some(to) = self.car_mut(transfer.to) {
            to.grant_flag(TRANSFER_IMMUNITY);
        }
        self.state.flag_holder = Some(transfer.to);
        info!(from = %transfer.from, to = %transfer.to, "Flag transferred");
    }
}

#[cfg(test)]
impl World {
    pub(crate) fn car(&self, id: CarId) -> Option<&Car> {
        match id {
            CarId::Ai => Some(&self.ai.car),
            CarId::Player(player_id) => self.sessions.get(player_id).map(|s| &s.car),
        }
    }

    /// Force the flag onto one car
    pub(crate) fn set_holder_for_test(&mut self, holder: CarId) {
        let ids: Vec<CarId> = self.cars().into_iter().map(|(id, _)| id).collect();
        for id in ids {
            if let Some(car) = self.car_mut(id) {
                car.has_flag = id == holder;
            }
        }
        self.state.flag_holder = Some(holder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ai::ROAM_RADIUS;
    use crate::game::physics::WORLD_HALF;
    use crate::game::r#match::GAME_DURATION;
    use assert_approx_eq::assert_approx_eq;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing::Level;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn world() -> World {
        World::new(42)
    }

    fn transfers(out: &[Outbound]) -> Vec<(CarId, CarId)> {
        out.iter()
            .filter_map(|o| match o.msg {
                ServerMsg::FlagTransfer {
                    from_player_id,
                    to_player_id,
                } => Some((from_player_id, to_player_id)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_world_does_not_tick() {
        let mut world = world();
        assert_eq!(world.phase(), MatchPhase::Waiting);
        assert!(world.tick().is_empty());
        assert_eq!(world.state().elapsed(), 0.0);
    }

    #[test]
    fn first_connect_starts_a_match() {
        let mut world = world();
        let id = PlayerId::generate();
        let out = world.connect(id, 0.0);

        assert_eq!(out[0].to, Recipients::One(id));
        assert!(matches!(out[0].msg, ServerMsg::Joined { .. }));
        assert_eq!(out[1].to, Recipients::AllExcept(id));

        assert_eq!(world.phase(), MatchPhase::Running);
        assert_eq!(world.state().elapsed(), 0.0);
        assert!(!world.state().finished());
        assert_eq!(world.flag_count(), 1);
        let holder = world.state().flag_holder.unwrap();
        assert!(holder == CarId::Ai || holder == CarId::Player(id));
        assert!(world.car(holder).unwrap().has_flag);
    }

    #[test]
    fn later_connects_do_not_reset() {
        let mut world = world();
        world.connect(PlayerId::generate(), 0.0);
        for _ in 0..30 {
            world.tick();
        }
        world.connect(PlayerId::generate(), 0.0);
        assert_approx_eq!(world.state().elapsed(), 0.5);
        assert_eq!(world.population(), 2);
    }

    /// AI holds the flag and sits on top of a single player, both facing the
    /// same way so they stay in contact for the next tick
    fn ai_holder_touching_player() -> (World, PlayerId) {
        let mut world = world();
        let p = PlayerId::generate();
        world.connect(p, 0.0);
        world.set_holder_for_test(CarId::Ai);
        for id in [CarId::Ai, CarId::Player(p)] {
            let car = world.car_mut(id).unwrap();
            car.x = 500.0;
            car.z = 500.0;
            car.angle = 0.0;
        }
        (world, p)
    }

    #[test]
    fn contact_transfers_flag_with_event() {
        let (mut world, p) = ai_holder_touching_player();

        let out = world.tick();
        assert_eq!(transfers(&out), vec![(CarId::Ai, CarId::Player(p))]);
        assert!(!world.ai().car.has_flag);
        let car = world.car(CarId::Player(p)).unwrap();
        assert!(car.has_flag);
        assert_eq!(car.immunity_timer, TRANSFER_IMMUNITY);
        assert_eq!(world.state().flag_holder, Some(CarId::Player(p)));
        assert_eq!(world.flag_count(), 1);
    }

    #[derive(Clone, Default)]
    struct EventLevels(Arc<Mutex<Vec<(Level, Vec<&'static str>)>>>);

    impl<S: tracing::Subscriber> Layer<S> for EventLevels {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            let fields = meta.fields().iter().map(|f| f.name()).collect();
            self.0.lock().push((*meta.level(), fields));
        }
    }

    #[test]
    fn transfers_log_at_info_like_reassignments() {
        let events = EventLevels::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());

        tracing::subscriber::with_default(subscriber, || {
            let (mut world, p) = ai_holder_touching_player();
            world.tick();

            let q = PlayerId::generate();
            world.connect(q, 0.0);
            world.disconnect(p);
        });

        let transfer_levels: Vec<Level> = events
            .0
            .lock()
            .iter()
            .filter(|(_, fields)| fields.contains(&"from") && fields.contains(&"to"))
            .map(|(level, _)| *level)
            .collect();
        assert_eq!(transfer_levels, vec![Level::INFO, Level::INFO]);
    }

    #[test]
    fn immune_holder_is_not_robbed() {
        let mut world = world();
        let p = PlayerId::generate();
        world.connect(p, 0.0);
        world.set_holder_for_test(CarId::Ai);
        {
            let ai = world.car_mut(CarId::Ai).unwrap();
            ai.x = 0.0;
            ai.z = 300.0;
            ai.angle = 0.0;
            // survives one tick of decay
            ai.immunity_timer = 0.3;
        }
        {
            let car = world.car_mut(CarId::Player(p)).unwrap();
            car.x = 0.0;
            car.z = 300.0;
            car.angle = 0.0;
        }

        let out = world.tick();
        assert!(transfers(&out).is_empty());
        assert!(world.ai().car.has_flag);
        assert_eq!(world.state().flag_holder, Some(CarId::Ai));
    }

    #[test]
    fn every_tick_ends_with_a_snapshot() {
        let mut world = world();
        world.connect(PlayerId::generate(), 0.0);
        let out = world.tick();
        let last = out.last().unwrap();
        assert_eq!(last.to, Recipients::All);
        assert!(matches!(last.msg, ServerMsg::GameState { .. }));
    }

    #[test]
    fn invariants_hold_over_a_long_busy_match() {
        let mut world = World::new(9);
        let ids: Vec<PlayerId> = (0..4).map(|_| PlayerId::generate()).collect();
        for id in &ids {
            world.connect(*id, 0.0);
        }

        for step in 0..5000u32 {
            for (k, id) in ids.iter().enumerate() {
                let phase = (step / 40 + k as u32) % 3;
                world.apply_input(
                    *id,
                    TurnInput {
                        left: phase == 0,
                        right: phase == 1,
                        timestamp: step as f64,
                    },
                );
            }
            let out = world.tick();
            assert!(transfers(&out).len() <= 1);
            assert_eq!(world.flag_count(), 1);

            let holder = world.state().flag_holder.unwrap();
            assert!(world.car(holder).unwrap().has_flag);

            for (_, car) in world.cars() {
                assert!(car.x.abs() <= WORLD_HALF && car.z.abs() <= WORLD_HALF);
                assert!(car.immunity_timer >= 0.0);
            }
        }
        assert!(world.state().finished());
        assert_eq!(world.state().elapsed(), GAME_DURATION);
        assert_approx_eq!(
            world.state().hold_time_human() + world.state().hold_time_ai(),
            5000.0 / 60.0
        );
    }

    #[test]
    fn full_match_without_contact_scores_one_side() {
        let mut world = world();
        let p = PlayerId::generate();
        world.connect(p, 0.0);
        world.set_holder_for_test(CarId::Ai);

        // The player drives straight to the +x wall and stays pinned there,
        // far outside the AI's roaming area.
        let mut changes = 0;
        for _ in 0..3600 {
            changes += transfers(&world.tick()).len();
        }

        assert_eq!(changes, 0);
        assert!(world.state().finished());
        assert_eq!(world.state().elapsed(), GAME_DURATION);
        assert_eq!(world.state().hold_time_ai(), GAME_DURATION);
        assert_eq!(world.state().hold_time_human(), 0.0);
        assert_eq!(world.car(CarId::Player(p)).unwrap().x, WORLD_HALF);

        // The clock stays at the duration while the holder keeps scoring.
        for _ in 0..600 {
            world.tick();
        }
        assert_eq!(world.state().elapsed(), GAME_DURATION);
        assert_approx_eq!(world.state().hold_time_ai(), 70.0);
        assert_eq!(world.state().hold_time_human(), 0.0);
        assert_eq!(world.phase(), MatchPhase::Finished);
    }

    #[test]
    fn last_disconnect_freezes_then_next_connect_resets() {
        let mut world = world();
        let p = PlayerId::generate();
        world.connect(p, 0.0);
        for _ in 0..90 {
            world.tick();
        }

        let out = world.disconnect(p);
        assert_eq!(out[0].msg, ServerMsg::PlayerLeft { player_id: p });
        assert_eq!(world.phase(), MatchPhase::Waiting);
        assert!(world.tick().is_empty());
        assert_eq!(world.state().elapsed(), 0.0);

        let q = PlayerId::generate();
        world.connect(q, 0.0);
        assert_eq!(world.state().elapsed(), 0.0);
        assert_eq!(world.flag_count(), 1);
        let (x, z, angle) = AiCar::start_pose();
        assert_eq!(world.ai().car.x, x);
        assert_eq!(world.ai().car.z, z);
        assert_eq!(world.ai().car.angle, angle);
        assert_approx_eq!(world.ai().car.x, -ROAM_RADIUS);
    }

    #[test]
    fn departing_holder_hands_flag_on() {
        let mut world = world();
        let a = PlayerId::generate();
        let b = PlayerId::generate();
        world.connect(a, 0.0);
        world.connect(b, 0.0);
        world.set_holder_for_test(CarId::Player(a));

        let out = world.disconnect(a);
        let moved = transfers(&out);
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].0, CarId::Player(a));
        assert_eq!(world.flag_count(), 1);
        assert_eq!(world.state().flag_holder, Some(moved[0].1));
        assert!(world.car(moved[0].1).unwrap().has_flag);
    }

    #[test]
    fn unknown_disconnect_and_input_are_ignored() {
        let mut world = world();
        world.connect(PlayerId::generate(), 0.0);
        let stranger = PlayerId::generate();
        assert!(world.disconnect(stranger).is_empty());
        assert!(!world.apply_input(stranger, TurnInput::default()));
        assert_eq!(world.population(), 1);
    }

    #[test]
    fn reset_twice_gives_same_canonical_state() {
        let mut world = world();
        world.connect(PlayerId::generate(), 0.0);
        for _ in 0..200 {
            world.tick();
        }
        world.reset();
        let first_ai = world.ai().car.clone();
        world.reset();

        assert_eq!(world.ai().car.x, first_ai.x);
        assert_eq!(world.ai().car.z, first_ai.z);
        assert_eq!(world.ai().car.angle, first_ai.angle);
        assert_eq!(world.state().elapsed(), 0.0);
        assert_eq!(world.state().hold_time_human(), 0.0);
        assert_eq!(world.state().hold_time_ai(), 0.0);
        assert_eq!(world.flag_count(), 1);
        for session in world.sessions().iter() {
            assert_eq!(session.car.x, 0.0);
            assert_eq!(session.car.z, 0.0);
        }
    }
}
