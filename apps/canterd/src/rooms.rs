//! The process-wide room registry, shared between the lobby and race tiers.
//!
//! Lock discipline: the registry mutex protects the uid map only; each room
//! sits behind its own heap-pinned mutex. The registry lock is dropped
//! before any room callback runs, so a callback can never order the two
//! locks against another thread, and no callback may reach into a second
//! room. Callers never retain room references across the callback boundary.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::datastore::Uid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    Speed,
    Magic,
    Guild,
    Tutorial,
}

impl GameMode {
    pub fn to_wire(self) -> u8 {
        match self {
            GameMode::Speed => 1,
            GameMode::Magic => 2,
            GameMode::Guild => 3,
            GameMode::Tutorial => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeamMode {
    #[default]
    Ffa,
    Team,
    Single,
}

impl TeamMode {
    pub fn to_wire(self) -> u8 {
        match self {
            TeamMode::Ffa => 1,
            TeamMode::Team => 2,
            TeamMode::Single => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerTeam {
    #[default]
    Solo,
    Red,
    Blue,
}

#[derive(Debug, Clone, Default)]
pub struct RoomDetails {
    pub name: Vec<u8>,
    pub password: Vec<u8>,
    pub mission_id: u16,
    pub course_id: u16,
    pub max_player_count: u32,
    pub game_mode: GameMode,
    pub team_mode: TeamMode,
    pub npc_race: u8,
    pub skill_bracket: u8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoomPlayer {
    is_ready: bool,
    team: PlayerTeam,
}

impl RoomPlayer {
    pub fn toggle_ready(&mut self) -> bool {
        self.is_ready = !self.is_ready;
        self.is_ready
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn set_team(&mut self, team: PlayerTeam) {
        self.team = team;
    }

    pub fn team(&self) -> PlayerTeam {
        self.team
    }
}

#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub uid: u32,
    pub details: RoomDetails,
    pub player_count: usize,
    pub is_playing: bool,
}

#[derive(Debug, Default)]
pub struct Room {
    uid: u32,
    details: RoomDetails,
    // Ordered so roster iteration (and with it racer oid assignment) is
    // stable across runs.
    queued_players: BTreeSet<Uid>,
    players: BTreeMap<Uid, RoomPlayer>,
    is_playing: bool,
}

impl Room {
    fn new(uid: u32) -> Self {
        Self {
            uid,
            ..Self::default()
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn details(&self) -> &RoomDetails {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut RoomDetails {
        &mut self.details
    }

    /// Queued reservations count against capacity so the lobby cannot
    /// oversell a room while entrants are still in transit.
    pub fn is_full(&self) -> bool {
        self.players.len() + self.queued_players.len() >= self.details.max_player_count as usize
    }

    /// Reserve a slot for a player the lobby has handed off.
    pub fn queue_player(&mut self, character_uid: Uid) -> bool {
        if self.is_full() {
            return false;
        }
        self.queued_players.insert(character_uid);
        true
    }

    /// Drop a reservation. Returns whether one existed.
    pub fn dequeue_player(&mut self, character_uid: Uid) -> bool {
        self.queued_players.remove(&character_uid)
    }

    /// Admit a player, consuming their reservation if any. In team mode the
    /// player lands on the smaller team, at random on a tie.
    pub fn add_player(&mut self, character_uid: Uid) -> bool {
        if self.players.len() >= self.details.max_player_count as usize {
            return false;
        }

        let mut player = RoomPlayer::default();
        if self.details.team_mode == TeamMode::Team {
            let red = self
                .players
                .values()
                .filter(|p| p.team() == PlayerTeam::Red)
                .count();
            let blue = self
                .players
                .values()
                .filter(|p| p.team() == PlayerTeam::Blue)
                .count();

            let team = if red > blue {
                PlayerTeam::Blue
            } else if blue > red {
                PlayerTeam::Red
            } else if rand::thread_rng().gen_bool(0.5) {
                PlayerTeam::Red
            } else {
                PlayerTeam::Blue
            };
            player.set_team(team);
        }

        self.queued_players.remove(&character_uid);
        self.players.entry(character_uid).or_insert(player);
        true
    }

    pub fn remove_player(&mut self, character_uid: Uid) {
        self.players.remove(&character_uid);
    }

    pub fn player(&mut self, character_uid: Uid) -> Option<&mut RoomPlayer> {
        self.players.get_mut(&character_uid)
    }

    pub fn players(&self) -> impl Iterator<Item = (&Uid, &RoomPlayer)> {
        self.players.iter()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            uid: self.uid,
            details: self.details.clone(),
            player_count: self.players.len(),
            is_playing: self.is_playing,
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_uid: u32,
    rooms: HashMap<u32, Arc<Mutex<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a room under a fresh monotonic uid and run the callback
    /// with exclusive access to it.
    pub fn create_room<R>(&self, f: impl FnOnce(&mut Room) -> R) -> R {
        let entry = {
            let mut inner = self.inner.lock().expect("room registry lock poisoned");
            inner.next_uid += 1;
            let uid = inner.next_uid;
            let entry = Arc::new(Mutex::new(Room::new(uid)));
            inner.rooms.insert(uid, Arc::clone(&entry));
            entry
        };

        let mut room = entry.lock().expect("room lock poisoned");
        f(&mut room)
    }

    /// Run the callback with exclusive access to an existing room.
    pub fn get_room<R>(&self, uid: u32, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        let entry = {
            let inner = self.inner.lock().expect("room registry lock poisoned");
            inner.rooms.get(&uid).cloned()
        }?;

        let mut room = entry.lock().expect("room lock poisoned");
        Some(f(&mut room))
    }

    pub fn room_exists(&self, uid: u32) -> bool {
        self.inner
            .lock()
            .expect("room registry lock poisoned")
            .rooms
            .contains_key(&uid)
    }

    /// Remove a room. Callers must ensure no other handle is live.
    pub fn delete_room(&self, uid: u32) -> bool {
        self.inner
            .lock()
            .expect("room registry lock poisoned")
            .rooms
            .remove(&uid)
            .is_some()
    }

    /// Value-type snapshots of every room, each under a brief room lock.
    pub fn rooms_snapshot(&self) -> Vec<RoomSnapshot> {
        let entries: Vec<Arc<Mutex<Room>>> = {
            let inner = self.inner.lock().expect("room registry lock poisoned");
            inner.rooms.values().cloned().collect()
        };

        let mut snapshots: Vec<RoomSnapshot> = entries
            .iter()
            .map(|entry| entry.lock().expect("room lock poisoned").snapshot())
            .collect();
        snapshots.sort_by_key(|s| s.uid);
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_player_room(registry: &RoomRegistry, team_mode: TeamMode) -> u32 {
        registry.create_room(|room| {
            room.details_mut().name = b"test room".to_vec();
            room.details_mut().max_player_count = 4;
            room.details_mut().team_mode = team_mode;
            room.uid()
        })
    }

    #[test]
    fn uids_are_monotonic_and_unique() {
        let registry = RoomRegistry::new();
        let a = four_player_room(&registry, TeamMode::Ffa);
        let b = four_player_room(&registry, TeamMode::Ffa);
        let c = four_player_room(&registry, TeamMode::Ffa);
        assert!(a < b && b < c);

        registry.delete_room(b);
        let d = four_player_room(&registry, TeamMode::Ffa);
        assert!(d > c, "uids are not reused after deletion");
    }

    #[test]
    fn missing_room_returns_none() {
        let registry = RoomRegistry::new();
        assert!(registry.get_room(99, |_| ()).is_none());
        assert!(!registry.room_exists(99));
        assert!(!registry.delete_room(99));
    }

    #[test]
    fn queue_counts_against_capacity() {
        let registry = RoomRegistry::new();
        let uid = four_player_room(&registry, TeamMode::Ffa);

        registry
            .get_room(uid, |room| {
                assert!(room.queue_player(1));
                assert!(room.queue_player(2));
                assert!(room.add_player(3));
                assert!(room.add_player(4));
                // Two joined plus two reserved: the room is sold out.
                assert!(room.is_full());
                assert!(!room.queue_player(5));

                // A reservation that expires frees a slot again.
                assert!(room.dequeue_player(2));
                assert!(!room.is_full());
            })
            .unwrap();
    }

    #[test]
    fn admitting_a_reserved_player_consumes_the_reservation() {
        let registry = RoomRegistry::new();
        let uid = four_player_room(&registry, TeamMode::Ffa);

        registry
            .get_room(uid, |room| {
                assert!(room.queue_player(1));
                assert!(room.add_player(1));
                assert!(!room.dequeue_player(1));
                assert_eq!(room.player_count(), 1);
            })
            .unwrap();
    }

    #[test]
    fn team_mode_balances_within_one() {
        let registry = RoomRegistry::new();
        let uid = registry.create_room(|room| {
            room.details_mut().max_player_count = 8;
            room.details_mut().team_mode = TeamMode::Team;
            room.uid()
        });

        registry
            .get_room(uid, |room| {
                for character_uid in 1..=8u32 {
                    assert!(room.add_player(character_uid));

                    let red = room
                        .players()
                        .filter(|(_, p)| p.team() == PlayerTeam::Red)
                        .count() as i64;
                    let blue = room
                        .players()
                        .filter(|(_, p)| p.team() == PlayerTeam::Blue)
                        .count() as i64;
                    assert!((red - blue).abs() <= 1);
                }
            })
            .unwrap();
    }

    #[test]
    fn ready_toggles_back_to_original_state() {
        let registry = RoomRegistry::new();
        let uid = four_player_room(&registry, TeamMode::Ffa);

        registry
            .get_room(uid, |room| {
                room.add_player(1);
                let player = room.player(1).unwrap();
                let original = player.is_ready();
                player.toggle_ready();
                player.toggle_ready();
                assert_eq!(player.is_ready(), original);
            })
            .unwrap();
    }

    #[test]
    fn snapshots_reflect_room_state() {
        let registry = RoomRegistry::new();
        let uid = four_player_room(&registry, TeamMode::Ffa);
        registry
            .get_room(uid, |room| {
                room.add_player(1);
                room.set_playing(true);
            })
            .unwrap();

        let snapshots = registry.rooms_snapshot();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].uid, uid);
        assert_eq!(snapshots[0].player_count, 1);
        assert!(snapshots[0].is_playing);
        assert_eq!(snapshots[0].details.name, b"test room".to_vec());
    }
}
