//! Per-race object tracking.
//!
//! Each race instance owns one tracker. Racers are keyed by their
//! persistent character uid and hold a per-race oid; deck items are keyed
//! by their own oid. Oids start at 1 and are never reused within a tracker
//! until [`RaceTracker::clear`] resets it for the next race.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use crate::datastore::Uid;

/// A per-race object id. Zero is never assigned.
pub type Oid = u16;

pub const INVALID_OID: Oid = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacerState {
    Disconnected,
    Loading,
    Racing,
    Finishing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RacerTeam {
    #[default]
    Solo,
    Red,
    Blue,
}

#[derive(Debug)]
pub struct Racer {
    pub oid: Oid,
    pub state: RacerState,
    pub team: RacerTeam,
    pub star_points: u32,
    pub jump_combo: u32,
    pub course_time: u32,
    pub magic_item: Option<u32>,
    /// Items currently spawned in this racer's proximity.
    pub tracked_items: HashSet<Oid>,
    pub is_targeting: bool,
    pub current_target: Oid,
}

impl Racer {
    fn new(oid: Oid) -> Self {
        Self {
            oid,
            state: RacerState::Disconnected,
            team: RacerTeam::Solo,
            star_points: 0,
            jump_combo: 0,
            course_time: u32::MAX,
            magic_item: None,
            tracked_items: HashSet::new(),
            is_targeting: false,
            current_target: INVALID_OID,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackedItem {
    pub oid: Oid,
    pub deck_id: u32,
    pub respawn_at: Instant,
    pub position: [f32; 3],
}

#[derive(Debug, Default)]
pub struct RaceTracker {
    next_racer_oid: Oid,
    racers: BTreeMap<Uid, Racer>,
    next_item_oid: Oid,
    items: BTreeMap<Oid, TrackedItem>,
}

impl RaceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a racer and assigns the next oid. Adding a character that
    /// is already tracked returns the existing record.
    pub fn add_racer(&mut self, character_uid: Uid) -> &mut Racer {
        if !self.racers.contains_key(&character_uid) {
            self.next_racer_oid += 1;
            self.racers
                .insert(character_uid, Racer::new(self.next_racer_oid));
        }
        self.racers
            .get_mut(&character_uid)
            .expect("racer was just inserted")
    }

    pub fn remove_racer(&mut self, character_uid: Uid) {
        self.racers.remove(&character_uid);
    }

    pub fn is_racer(&self, character_uid: Uid) -> bool {
        self.racers.contains_key(&character_uid)
    }

    pub fn racer(&mut self, character_uid: Uid) -> Option<&mut Racer> {
        self.racers.get_mut(&character_uid)
    }

    pub fn racer_state(&self, character_uid: Uid) -> Option<RacerState> {
        self.racers.get(&character_uid).map(|r| r.state)
    }

    pub fn racers(&self) -> impl Iterator<Item = (&Uid, &Racer)> {
        self.racers.iter()
    }

    pub fn racers_mut(&mut self) -> impl Iterator<Item = (&Uid, &mut Racer)> {
        self.racers.iter_mut()
    }

    pub fn racer_count(&self) -> usize {
        self.racers.len()
    }

    /// Registers a deck item and assigns the next item oid.
    pub fn add_item(&mut self, deck_id: u32, position: [f32; 3]) -> &mut TrackedItem {
        self.next_item_oid += 1;
        let oid = self.next_item_oid;
        self.items.insert(
            oid,
            TrackedItem {
                oid,
                deck_id,
                respawn_at: Instant::now(),
                position,
            },
        );
        self.items.get_mut(&oid).expect("item was just inserted")
    }

    pub fn item(&mut self, oid: Oid) -> Option<&mut TrackedItem> {
        self.items.get_mut(&oid)
    }

    pub fn items(&self) -> impl Iterator<Item = (&Oid, &TrackedItem)> {
        self.items.iter()
    }

    /// Drops every object and resets both oid counters. Run before each
    /// race start so the new field gets fresh oids.
    pub fn clear(&mut self) {
        self.racers.clear();
        self.items.clear();
        self.next_racer_oid = 0;
        self.next_item_oid = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oids_are_one_based_and_sequential() {
        let mut tracker = RaceTracker::new();
        assert_eq!(tracker.add_racer(44).oid, 1);
        assert_eq!(tracker.add_racer(45).oid, 2);
        assert_eq!(tracker.add_racer(46).oid, 3);
    }

    #[test]
    fn oids_are_a_bijection_onto_one_to_n() {
        let mut tracker = RaceTracker::new();
        for uid in [9u32, 3, 7, 21] {
            tracker.add_racer(uid);
        }

        let mut oids: Vec<Oid> = tracker.racers().map(|(_, r)| r.oid).collect();
        oids.sort_unstable();
        assert_eq!(oids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn clear_resets_the_counters() {
        let mut tracker = RaceTracker::new();
        tracker.add_racer(44);
        tracker.add_item(101, [0.0, 0.0, 0.0]);
        tracker.clear();

        assert_eq!(tracker.racer_count(), 0);
        assert_eq!(tracker.add_racer(44).oid, 1);
        assert_eq!(tracker.add_item(101, [0.0, 0.0, 0.0]).oid, 1);
    }

    #[test]
    fn new_racer_defaults() {
        let mut tracker = RaceTracker::new();
        let racer = tracker.add_racer(44);
        assert_eq!(racer.state, RacerState::Disconnected);
        assert_eq!(racer.course_time, u32::MAX);
        assert!(racer.magic_item.is_none());
        assert!(!racer.is_targeting);
    }

    #[test]
    fn items_keep_their_positions() {
        let mut tracker = RaceTracker::new();
        let oid = tracker.add_item(102, [25.0, -25.0, -8010.0]).oid;
        assert_eq!(tracker.item(oid).unwrap().position, [25.0, -25.0, -8010.0]);
    }
}
