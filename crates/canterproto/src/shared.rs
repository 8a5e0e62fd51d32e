//! Structures shared between the lobby and race message families.

use bytes::Bytes;

use crate::wire::{Reader, Writer};
use crate::ProtoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum GameMode {
    #[default]
    Speed = 1,
    Magic = 2,
    Guild = 3,
    Tutorial = 6,
}

impl GameMode {
    pub fn from_u8(v: u8) -> Result<Self, ProtoError> {
        match v {
            1 => Ok(GameMode::Speed),
            2 => Ok(GameMode::Magic),
            3 => Ok(GameMode::Guild),
            6 => Ok(GameMode::Tutorial),
            _ => Err(ProtoError::Malformed("unknown game mode")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TeamMode {
    #[default]
    Ffa = 1,
    Team = 2,
    Single = 3,
}

impl TeamMode {
    pub fn from_u8(v: u8) -> Result<Self, ProtoError> {
        match v {
            1 => Ok(TeamMode::Ffa),
            2 => Ok(TeamMode::Team),
            3 => Ok(TeamMode::Single),
            _ => Err(ProtoError::Malformed("unknown team mode")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TeamColor {
    #[default]
    None = 0,
    Red = 1,
    Blue = 2,
}

impl TeamColor {
    pub fn from_u8(v: u8) -> Result<Self, ProtoError> {
        match v {
            0 => Ok(TeamColor::None),
            1 => Ok(TeamColor::Red),
            2 => Ok(TeamColor::Blue),
            _ => Err(ProtoError::Malformed("unknown team color")),
        }
    }
}

/// An inventory or equipment item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Item {
    pub uid: u32,
    pub tid: u32,
    pub val: u32,
    pub count: u32,
}

impl Item {
    pub fn write(&self, w: &mut Writer) {
        w.u32(self.uid).u32(self.tid).u32(self.val).u32(self.count);
    }

    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            uid: r.u32()?,
            tid: r.u32()?,
            val: r.u32()?,
            count: r.u32()?,
        })
    }
}

/// Facial and body selection of a character avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacterParts {
    pub char_id: u8,
    pub mouth_serial_id: u8,
    pub face_serial_id: u8,
    pub val0: u8,
}

impl CharacterParts {
    pub fn write(&self, w: &mut Writer) {
        w.u8(self.char_id)
            .u8(self.mouth_serial_id)
            .u8(self.face_serial_id)
            .u8(self.val0);
    }

    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            char_id: r.u8()?,
            mouth_serial_id: r.u8()?,
            face_serial_id: r.u8()?,
            val0: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacterAppearance {
    pub val0: u16,
    pub head_size: u16,
    pub height: u16,
    pub thigh_volume: u16,
    pub leg_volume: u16,
    pub val1: u16,
}

impl CharacterAppearance {
    pub fn write(&self, w: &mut Writer) {
        w.u16(self.val0)
            .u16(self.head_size)
            .u16(self.height)
            .u16(self.thigh_volume)
            .u16(self.leg_volume)
            .u16(self.val1);
    }

    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            val0: r.u16()?,
            head_size: r.u16()?,
            height: r.u16()?,
            thigh_volume: r.u16()?,
            leg_volume: r.u16()?,
            val1: r.u16()?,
        })
    }
}

/// A character avatar as the client renders it in rosters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Character {
    pub uid: u32,
    pub name: Bytes,
    pub gender: u8,
    pub level: u16,
    pub parts: CharacterParts,
    pub appearance: CharacterAppearance,
}

impl Character {
    pub fn write(&self, w: &mut Writer) {
        w.u32(self.uid);
        w.string(&self.name);
        w.u8(self.gender).u16(self.level);
        self.parts.write(w);
        self.appearance.write(w);
    }

    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            uid: r.u32()?,
            name: r.string()?,
            gender: r.u8()?,
            level: r.u16()?,
            parts: CharacterParts::read(r)?,
            appearance: CharacterAppearance::read(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HorseParts {
    pub skin_id: u8,
    pub mane_id: u8,
    pub tail_id: u8,
    pub face_id: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HorseAppearance {
    pub scale: u8,
    pub leg_length: u8,
    pub leg_volume: u8,
    pub body_length: u8,
    pub body_volume: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HorseStats {
    pub agility: u32,
    pub control: u32,
    pub speed: u32,
    pub strength: u32,
    pub spirit: u32,
}

/// A mount as the client renders it in rosters and the stable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Horse {
    pub uid: u32,
    pub tid: u32,
    pub name: Bytes,
    pub parts: HorseParts,
    pub appearance: HorseAppearance,
    pub stats: HorseStats,
    pub rating: u32,
    pub class: u8,
    pub val0: u8,
    pub grade: u8,
    pub growth_points: u16,
}

impl Horse {
    pub fn write(&self, w: &mut Writer) {
        w.u32(self.uid).u32(self.tid);
        w.string(&self.name);
        w.u8(self.parts.skin_id)
            .u8(self.parts.mane_id)
            .u8(self.parts.tail_id)
            .u8(self.parts.face_id);
        w.u8(self.appearance.scale)
            .u8(self.appearance.leg_length)
            .u8(self.appearance.leg_volume)
            .u8(self.appearance.body_length)
            .u8(self.appearance.body_volume);
        w.u32(self.stats.agility)
            .u32(self.stats.control)
            .u32(self.stats.speed)
            .u32(self.stats.strength)
            .u32(self.stats.spirit);
        w.u32(self.rating)
            .u8(self.class)
            .u8(self.val0)
            .u8(self.grade)
            .u16(self.growth_points);
    }

    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            uid: r.u32()?,
            tid: r.u32()?,
            name: r.string()?,
            parts: HorseParts {
                skin_id: r.u8()?,
                mane_id: r.u8()?,
                tail_id: r.u8()?,
                face_id: r.u8()?,
            },
            appearance: HorseAppearance {
                scale: r.u8()?,
                leg_length: r.u8()?,
                leg_volume: r.u8()?,
                body_length: r.u8()?,
                body_volume: r.u8()?,
            },
            stats: HorseStats {
                agility: r.u32()?,
                control: r.u32()?,
                speed: r.u32()?,
                strength: r.u32()?,
                spirit: r.u32()?,
            },
            rating: r.u32()?,
            class: r.u8()?,
            val0: r.u8()?,
            grade: r.u8()?,
            growth_points: r.u16()?,
        })
    }
}

/// Guild summary attached to rosters and the login acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Guild {
    pub uid: u32,
    pub val1: u32,
    pub val2: u32,
    pub name: Bytes,
    pub guild_role: u32,
    pub val5: u32,
    pub val6: u32,
}

impl Guild {
    pub fn write(&self, w: &mut Writer) {
        w.u32(self.uid).u32(self.val1).u32(self.val2);
        w.string(&self.name);
        w.u32(self.guild_role).u32(self.val5).u32(self.val6);
    }

    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            uid: r.u32()?,
            val1: r.u32()?,
            val2: r.u32()?,
            name: r.string()?,
            guild_role: r.u32()?,
            val5: r.u32()?,
            val6: r.u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horse_round_trips() {
        let horse = Horse {
            uid: 21,
            tid: 0x4E21,
            name: Bytes::from_static(b"idontunderstand"),
            parts: HorseParts {
                skin_id: 2,
                mane_id: 3,
                tail_id: 4,
                face_id: 5,
            },
            appearance: HorseAppearance {
                scale: 4,
                leg_length: 4,
                leg_volume: 5,
                body_length: 3,
                body_volume: 4,
            },
            stats: HorseStats {
                agility: 9,
                control: 9,
                speed: 9,
                strength: 9,
                spirit: 9,
            },
            rating: 210,
            class: 18,
            val0: 1,
            grade: 5,
            growth_points: 255,
        };

        let mut w = Writer::new();
        horse.write(&mut w);
        let mut r = Reader::new(w.into_bytes());
        assert_eq!(Horse::read(&mut r).unwrap(), horse);
        assert!(r.is_empty());
    }

    #[test]
    fn unknown_mode_values_are_malformed() {
        assert!(GameMode::from_u8(0).is_err());
        assert!(TeamMode::from_u8(9).is_err());
        assert!(TeamColor::from_u8(3).is_err());
    }
}
