//! Operator-maintained infraction list.
//!
//! A JSON file of user bans, loaded at startup and consulted once per login
//! attempt. A missing file means an empty list; a malformed file is a
//! startup error.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBan {
    pub name_lc: String,
    #[serde(default)]
    pub created_unix: u64,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BanListFile {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub user_bans: Vec<UserBan>,
}

/// Verdict for one login attempt.
#[derive(Debug, Clone, Default)]
pub struct Verdict {
    pub prevent_joining: bool,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct InfractionList {
    users: HashMap<String, UserBan>,
}

impl InfractionList {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let s = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(anyhow::anyhow!("failed to read ban file {path:?}: {e}"));
            }
        };

        let file: BanListFile = serde_json::from_str(&s)
            .map_err(|e| anyhow::anyhow!("failed to parse ban file {path:?}: {e}"))?;

        let mut users = HashMap::new();
        for ban in file.user_bans {
            if ban.name_lc.trim().is_empty() {
                continue;
            }
            users.insert(ban.name_lc.clone(), ban);
        }
        Ok(Self { users })
    }

    pub fn check(&self, user_name: &str) -> Verdict {
        let key = user_name.trim().to_ascii_lowercase();
        match self.users.get(&key) {
            Some(ban) => Verdict {
                prevent_joining: true,
                reason: ban.reason.clone(),
            },
            None => Verdict::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_empty_list() {
        let list = InfractionList::load(Path::new("/nonexistent/bans.json")).unwrap();
        assert!(!list.check("anyone").prevent_joining);
    }

    #[test]
    fn banned_user_is_blocked_case_insensitively() {
        let dir = std::env::temp_dir().join("canterd-ban-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bans.json");
        let file = BanListFile {
            version: 1,
            user_bans: vec![UserBan {
                name_lc: "cheater".to_owned(),
                created_unix: 0,
                created_by: "ops".to_owned(),
                reason: "speed hacking".to_owned(),
            }],
        };
        std::fs::write(&path, serde_json::to_string_pretty(&file).unwrap()).unwrap();

        let list = InfractionList::load(&path).unwrap();
        assert!(list.check("Cheater").prevent_joining);
        assert!(list.check(" cheater ").prevent_joining);
        assert!(!list.check("honest").prevent_joining);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join("canterd-ban-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad-bans.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(InfractionList::load(&path).is_err());
    }
}
