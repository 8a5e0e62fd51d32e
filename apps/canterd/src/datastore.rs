//! The data director interface.
//!
//! Persistent records live with an external store; this module owns only
//! the cache, the asynchronous load bookkeeping the lobby pipeline polls,
//! and the scoped record handles everything else mutates through. Handles
//! release their lock at scope end; callers never hold record references
//! across handler boundaries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A persistent identifier assigned by the data store.
pub type Uid = u32;

pub const INVALID_UID: Uid = 0;

#[derive(Debug, Clone, Default)]
pub struct UserRecord {
    pub name: String,
    pub token: String,
    pub character_uid: Uid,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkillSet {
    pub slot1: u32,
    pub slot2: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkillSets {
    pub active_set_id: u8,
    pub set1: SkillSet,
    pub set2: SkillSet,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkillConfig {
    pub speed: SkillSets,
    pub magic: SkillSets,
}

#[derive(Debug, Clone, Default)]
pub struct CharacterRecord {
    pub uid: Uid,
    pub name: String,
    pub gender: u8,
    pub level: u16,
    pub carrots: i32,
    pub introduction: String,
    pub role: u32,
    pub mount_uid: Uid,
    pub guild_uid: Uid,
    pub char_id: u8,
    pub mouth_serial_id: u8,
    pub face_serial_id: u8,
    pub skills: SkillConfig,
}

#[derive(Debug, Clone, Default)]
pub struct HorseRecord {
    pub uid: Uid,
    pub tid: u32,
    pub name: String,
}

/// A cached record with scoped access.
#[derive(Debug)]
pub struct Record<T>(Arc<Mutex<T>>);

impl<T> Clone for Record<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Record<T> {
    fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.0.lock().expect("record lock poisoned");
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.lock().expect("record lock poisoned");
        f(&mut guard)
    }
}

/// The external store behind the cache.
///
/// `fetch_*` return `None` for unknown keys; infrastructure failures are
/// also surfaced as `None` and reported by the caller as a failed load.
pub trait RecordSource: Send + Sync + 'static {
    fn fetch_user(&self, name: &str) -> Option<UserRecord>;
    fn fetch_character(&self, uid: Uid) -> Option<CharacterRecord>;
    fn fetch_horse(&self, uid: Uid) -> Option<HorseRecord>;

    /// Allocate a uid for a freshly created character and persist it bound
    /// to the user.
    fn create_character(&self, user_name: &str, template: CharacterRecord) -> Option<CharacterRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SlotState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Default)]
struct LoadTracker {
    user: SlotState,
    character: SlotState,
}

#[derive(Default)]
struct Cache {
    loads: HashMap<String, LoadTracker>,
    users: HashMap<String, Record<UserRecord>>,
    characters: HashMap<Uid, Record<CharacterRecord>>,
    horses: HashMap<Uid, Record<HorseRecord>>,
}

/// Front of the persistent store: load requests, poll queries, and record
/// handles.
pub struct DataDirector {
    source: Arc<dyn RecordSource>,
    cache: Mutex<Cache>,
}

impl DataDirector {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(Cache::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Cache> {
        self.cache.lock().expect("data cache lock poisoned")
    }

    /// Begin loading a user record. The lobby polls [`Self::is_loading`]
    /// and [`Self::user_loaded`] on its ticks rather than blocking here.
    pub fn request_load_user(&self, name: &str) {
        {
            let mut cache = self.lock();
            cache.loads.entry(name.to_owned()).or_default().user = SlotState::Loading;
        }

        let fetched = self.source.fetch_user(name);

        let mut cache = self.lock();
        let tracker = cache.loads.entry(name.to_owned()).or_default();
        match fetched {
            Some(record) => {
                tracker.user = SlotState::Loaded;
                cache.users.insert(name.to_owned(), Record::new(record));
            }
            None => tracker.user = SlotState::Failed,
        }
    }

    /// Begin loading a user's character and its mount.
    pub fn request_load_character(&self, name: &str, character_uid: Uid) {
        {
            let mut cache = self.lock();
            cache.loads.entry(name.to_owned()).or_default().character = SlotState::Loading;
        }

        let character = self.source.fetch_character(character_uid);
        let horse = character
            .as_ref()
            .filter(|c| c.mount_uid != INVALID_UID)
            .and_then(|c| self.source.fetch_horse(c.mount_uid));

        let mut cache = self.lock();
        let tracker = cache.loads.entry(name.to_owned()).or_default();
        match character {
            Some(record) => {
                tracker.character = SlotState::Loaded;
                cache.characters.insert(record.uid, Record::new(record));
                if let Some(horse) = horse {
                    cache.horses.insert(horse.uid, Record::new(horse));
                }
            }
            None => tracker.character = SlotState::Failed,
        }
    }

    /// Whether any load for this user is still in flight.
    pub fn is_loading(&self, name: &str) -> bool {
        let cache = self.lock();
        cache
            .loads
            .get(name)
            .map(|t| t.user == SlotState::Loading || t.character == SlotState::Loading)
            .unwrap_or(false)
    }

    pub fn user_loaded(&self, name: &str) -> bool {
        let cache = self.lock();
        cache
            .loads
            .get(name)
            .map(|t| t.user == SlotState::Loaded)
            .unwrap_or(false)
    }

    pub fn character_loaded(&self, name: &str) -> bool {
        let cache = self.lock();
        cache
            .loads
            .get(name)
            .map(|t| t.character == SlotState::Loaded)
            .unwrap_or(false)
    }

    pub fn user(&self, name: &str) -> Option<Record<UserRecord>> {
        self.lock().users.get(name).cloned()
    }

    /// Character handle, faulting the record in from the source on a cache
    /// miss so the race tier can resolve entrants the lobby loaded in
    /// another process.
    pub fn character(&self, uid: Uid) -> Option<Record<CharacterRecord>> {
        if let Some(record) = self.lock().characters.get(&uid).cloned() {
            return Some(record);
        }

        let fetched = self.source.fetch_character(uid)?;
        let mut cache = self.lock();
        let record = cache
            .characters
            .entry(uid)
            .or_insert_with(|| Record::new(fetched));
        Some(record.clone())
    }

    pub fn horse(&self, uid: Uid) -> Option<Record<HorseRecord>> {
        if let Some(record) = self.lock().horses.get(&uid).cloned() {
            return Some(record);
        }

        let fetched = self.source.fetch_horse(uid)?;
        let mut cache = self.lock();
        let record = cache.horses.entry(uid).or_insert_with(|| Record::new(fetched));
        Some(record.clone())
    }

    /// Create a character for the user and bind it to their user record.
    pub fn create_character(
        &self,
        user_name: &str,
        template: CharacterRecord,
    ) -> Option<Record<CharacterRecord>> {
        let created = self.source.create_character(user_name, template)?;
        let uid = created.uid;

        let mut cache = self.lock();
        if let Some(user) = cache.users.get(user_name) {
            user.write(|u| u.character_uid = uid);
        }
        cache.loads.entry(user_name.to_owned()).or_default().character = SlotState::Loaded;
        let record = cache
            .characters
            .entry(uid)
            .or_insert_with(|| Record::new(created));
        Some(record.clone())
    }
}

/// An in-memory store for tests and standalone operation.
#[derive(Default)]
pub struct MemoryRecordSource {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_uid: Uid,
    users: HashMap<String, UserRecord>,
    characters: HashMap<Uid, CharacterRecord>,
    horses: HashMap<Uid, HorseRecord>,
}

impl MemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().expect("memory source lock poisoned")
    }

    /// Seed an account without a character; the lobby will route it to the
    /// nickname creator.
    pub fn add_user(&self, name: &str, token: &str) {
        let mut inner = self.lock();
        inner.users.insert(
            name.to_owned(),
            UserRecord {
                name: name.to_owned(),
                token: token.to_owned(),
                character_uid: INVALID_UID,
            },
        );
    }

    /// Seed an account with a ready-made character and mount. Returns the
    /// character uid.
    pub fn add_user_with_character(&self, name: &str, token: &str, nickname: &str) -> Uid {
        let mut inner = self.lock();

        inner.next_uid += 1;
        let horse_uid = inner.next_uid;
        inner.horses.insert(
            horse_uid,
            HorseRecord {
                uid: horse_uid,
                tid: 20001,
                name: "comet".to_owned(),
            },
        );

        inner.next_uid += 1;
        let character_uid = inner.next_uid;
        inner.characters.insert(
            character_uid,
            CharacterRecord {
                uid: character_uid,
                name: nickname.to_owned(),
                level: 1,
                carrots: 5000,
                mount_uid: horse_uid,
                ..CharacterRecord::default()
            },
        );

        inner.users.insert(
            name.to_owned(),
            UserRecord {
                name: name.to_owned(),
                token: token.to_owned(),
                character_uid,
            },
        );
        character_uid
    }

    pub fn set_character_level(&self, uid: Uid, level: u16) {
        if let Some(c) = self.lock().characters.get_mut(&uid) {
            c.level = level;
        }
    }
}

impl RecordSource for MemoryRecordSource {
    fn fetch_user(&self, name: &str) -> Option<UserRecord> {
        self.lock().users.get(name).cloned()
    }

    fn fetch_character(&self, uid: Uid) -> Option<CharacterRecord> {
        self.lock().characters.get(&uid).cloned()
    }

    fn fetch_horse(&self, uid: Uid) -> Option<HorseRecord> {
        self.lock().horses.get(&uid).cloned()
    }

    fn create_character(&self, user_name: &str, template: CharacterRecord) -> Option<CharacterRecord> {
        let mut inner = self.lock();
        if !inner.users.contains_key(user_name) {
            return None;
        }

        inner.next_uid += 1;
        let horse_uid = inner.next_uid;
        inner.horses.insert(
            horse_uid,
            HorseRecord {
                uid: horse_uid,
                tid: 20001,
                name: "starter".to_owned(),
            },
        );

        inner.next_uid += 1;
        let uid = inner.next_uid;
        let record = CharacterRecord {
            uid,
            mount_uid: horse_uid,
            ..template
        };
        inner.characters.insert(uid, record.clone());
        if let Some(user) = inner.users.get_mut(user_name) {
            user.character_uid = uid;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn director() -> (Arc<MemoryRecordSource>, DataDirector) {
        let source = Arc::new(MemoryRecordSource::new());
        let director = DataDirector::new(Arc::clone(&source) as Arc<dyn RecordSource>);
        (source, director)
    }

    #[test]
    fn load_states_progress_to_loaded() {
        let (source, data) = director();
        source.add_user_with_character("rider", "token-1", "Rider");

        assert!(!data.user_loaded("rider"));
        data.request_load_user("rider");
        assert!(!data.is_loading("rider"));
        assert!(data.user_loaded("rider"));

        let uid = data.user("rider").unwrap().read(|u| u.character_uid);
        assert_ne!(uid, INVALID_UID);

        data.request_load_character("rider", uid);
        assert!(data.character_loaded("rider"));
        let name = data.character(uid).unwrap().read(|c| c.name.clone());
        assert_eq!(name, "Rider");
    }

    #[test]
    fn unknown_user_fails_the_load() {
        let (_source, data) = director();
        data.request_load_user("ghost");
        assert!(!data.is_loading("ghost"));
        assert!(!data.user_loaded("ghost"));
        assert!(data.user("ghost").is_none());
    }

    #[test]
    fn writes_are_visible_through_other_handles() {
        let (source, data) = director();
        let uid = source.add_user_with_character("rider", "token-1", "Rider");

        let a = data.character(uid).unwrap();
        let b = data.character(uid).unwrap();
        a.write(|c| c.carrots = 123);
        assert_eq!(b.read(|c| c.carrots), 123);
    }

    #[test]
    fn create_character_binds_the_user() {
        let (source, data) = director();
        source.add_user("fresh", "token-2");
        data.request_load_user("fresh");

        let record = data
            .create_character(
                "fresh",
                CharacterRecord {
                    name: "Newbie".to_owned(),
                    level: 1,
                    ..CharacterRecord::default()
                },
            )
            .unwrap();
        let uid = record.read(|c| c.uid);
        assert_ne!(uid, INVALID_UID);

        let bound = data.user("fresh").unwrap().read(|u| u.character_uid);
        assert_eq!(bound, uid);
        assert!(data.character_loaded("fresh"));
    }
}
