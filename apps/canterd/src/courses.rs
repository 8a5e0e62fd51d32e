//! Static course and game-mode tables.
//!
//! The real content registry is authored game data; the server only reads
//! it. These compiled-in tables carry the fields the race director needs:
//! per-map timing and deck item placements, and per-mode star point tuning.

use crate::rooms::GameMode;

/// Course ids that select a pool instead of a concrete map.
pub const ALL_MAPS_COURSE_ID: u16 = 10000;
pub const NEW_MAPS_COURSE_ID: u16 = 10001;
pub const HOT_MAPS_COURSE_ID: u16 = 10002;

/// Deck item kinds referenced by the tables.
pub const DECK_GOLD_HORSESHOE: u32 = 101;
pub const DECK_SILVER_HORSESHOE: u32 = 102;
pub const DECK_MAGIC_CARD: u32 = 103;

#[derive(Debug, Clone, Copy)]
pub struct DeckItemPlacement {
    pub deck_id: u32,
    pub position: [f32; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct MapBlockInfo {
    pub id: u16,
    pub required_level: u16,
    /// Race stage timeout, seconds.
    pub time_limit: u64,
    /// Countdown between loading completion and the actual start, seconds.
    pub wait_time: u64,
    /// World-space origin the authored placements are relative to.
    pub offset: [f32; 3],
    pub deck_items: &'static [DeckItemPlacement],
}

#[derive(Debug, Clone, Copy)]
pub struct GameModeInfo {
    pub star_points_max: u32,
    pub spur_consume_star_points: u32,
    pub perfect_jump_star_points: u32,
    pub perfect_jump_unit_star_points: u32,
    pub perfect_jump_max_bonus_combo: u32,
    pub good_jump_star_points: u32,
    pub used_deck_item_ids: &'static [u32],
    pub map_pool: &'static [u16],
}

const SEASIDE_DECK: &[DeckItemPlacement] = &[
    DeckItemPlacement {
        deck_id: DECK_GOLD_HORSESHOE,
        position: [25.0, -25.0, -8010.0],
    },
    DeckItemPlacement {
        deck_id: DECK_SILVER_HORSESHOE,
        position: [40.0, -25.0, -7950.0],
    },
    DeckItemPlacement {
        deck_id: DECK_SILVER_HORSESHOE,
        position: [-12.0, -24.0, -7860.0],
    },
    DeckItemPlacement {
        deck_id: DECK_MAGIC_CARD,
        position: [8.0, -25.0, -7905.0],
    },
];

const CANYON_DECK: &[DeckItemPlacement] = &[
    DeckItemPlacement {
        deck_id: DECK_SILVER_HORSESHOE,
        position: [120.0, 4.0, 310.0],
    },
    DeckItemPlacement {
        deck_id: DECK_GOLD_HORSESHOE,
        position: [180.0, 6.0, 455.0],
    },
    DeckItemPlacement {
        deck_id: DECK_MAGIC_CARD,
        position: [222.0, 8.0, 610.0],
    },
];

const MEADOW_DECK: &[DeckItemPlacement] = &[
    DeckItemPlacement {
        deck_id: DECK_SILVER_HORSESHOE,
        position: [-30.0, 0.0, 95.0],
    },
    DeckItemPlacement {
        deck_id: DECK_MAGIC_CARD,
        position: [-55.0, 1.0, 180.0],
    },
];

const MAP_BLOCKS: &[MapBlockInfo] = &[
    MapBlockInfo {
        id: 1,
        required_level: 1,
        time_limit: 180,
        wait_time: 3,
        offset: [0.0, 0.0, 0.0],
        deck_items: MEADOW_DECK,
    },
    MapBlockInfo {
        id: 4,
        required_level: 1,
        time_limit: 240,
        wait_time: 3,
        offset: [0.0, 0.0, -8000.0],
        deck_items: SEASIDE_DECK,
    },
    MapBlockInfo {
        id: 7,
        required_level: 10,
        time_limit: 300,
        wait_time: 4,
        offset: [100.0, 0.0, 250.0],
        deck_items: CANYON_DECK,
    },
    MapBlockInfo {
        id: 12,
        required_level: 20,
        time_limit: 360,
        wait_time: 4,
        offset: [0.0, 0.0, 0.0],
        deck_items: CANYON_DECK,
    },
];

const SPEED_MODE: GameModeInfo = GameModeInfo {
    star_points_max: 120_000,
    spur_consume_star_points: 40_000,
    perfect_jump_star_points: 7_000,
    perfect_jump_unit_star_points: 500,
    perfect_jump_max_bonus_combo: 10,
    good_jump_star_points: 3_000,
    used_deck_item_ids: &[DECK_GOLD_HORSESHOE, DECK_SILVER_HORSESHOE],
    map_pool: &[1, 4, 7, 12],
};

const MAGIC_MODE: GameModeInfo = GameModeInfo {
    star_points_max: 10_000,
    spur_consume_star_points: 10_000,
    perfect_jump_star_points: 1_000,
    perfect_jump_unit_star_points: 100,
    perfect_jump_max_bonus_combo: 5,
    good_jump_star_points: 400,
    used_deck_item_ids: &[DECK_MAGIC_CARD],
    map_pool: &[1, 4, 7],
};

const TUTORIAL_MODE: GameModeInfo = GameModeInfo {
    star_points_max: 120_000,
    spur_consume_star_points: 40_000,
    perfect_jump_star_points: 7_000,
    perfect_jump_unit_star_points: 500,
    perfect_jump_max_bonus_combo: 10,
    good_jump_star_points: 3_000,
    used_deck_item_ids: &[],
    map_pool: &[1],
};

#[derive(Debug, Default)]
pub struct CourseRegistry;

impl CourseRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn map_block(&self, id: u16) -> Option<&'static MapBlockInfo> {
        MAP_BLOCKS.iter().find(|m| m.id == id)
    }

    pub fn game_mode(&self, mode: GameMode) -> &'static GameModeInfo {
        match mode {
            GameMode::Speed | GameMode::Guild => &SPEED_MODE,
            GameMode::Magic => &MAGIC_MODE,
            GameMode::Tutorial => &TUTORIAL_MODE,
        }
    }

    pub fn is_pool_course(&self, course_id: u16) -> bool {
        matches!(
            course_id,
            ALL_MAPS_COURSE_ID | NEW_MAPS_COURSE_ID | HOT_MAPS_COURSE_ID
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pool_map_exists() {
        let registry = CourseRegistry::new();
        for mode in [GameMode::Speed, GameMode::Magic, GameMode::Tutorial] {
            for &id in registry.game_mode(mode).map_pool {
                assert!(registry.map_block(id).is_some(), "map {id} missing");
            }
        }
    }

    #[test]
    fn unknown_map_is_none() {
        assert!(CourseRegistry::new().map_block(999).is_none());
    }

    #[test]
    fn pool_course_ids_are_recognized() {
        let registry = CourseRegistry::new();
        assert!(registry.is_pool_course(10000));
        assert!(registry.is_pool_course(10001));
        assert!(registry.is_pool_course(10002));
        assert!(!registry.is_pool_course(4));
    }

    #[test]
    fn speed_decks_never_place_magic_cards() {
        let registry = CourseRegistry::new();
        let speed = registry.game_mode(GameMode::Speed);
        assert!(!speed.used_deck_item_ids.contains(&DECK_MAGIC_CARD));
    }
}
