//! The race message family.
//!
//! Commands the race tier receives implement `read`; acknowledgements and
//! notifies implement [`Clientbound`]. Object ids (`oid`) are per-race,
//! 1-based, and distinct from persistent character uids.

use bytes::Bytes;

use crate::id;
use crate::lobby::EnterRoomCancelStatus;
use crate::wire::{Reader, Writer};
use crate::{Clientbound, CommandId, ProtoError};

/// Magic item ids.
pub const MAGIC_ITEM_BOLT: u32 = 2;
pub const MAGIC_ITEM_SHIELD: u32 = 4;
pub const MAGIC_ITEM_ICE_WALL: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HurdleClearType {
    Perfect = 0,
    Good = 1,
    DoubleJumpOrGlide = 2,
    Collision = 3,
}

impl HurdleClearType {
    pub fn from_u8(v: u8) -> Result<Self, ProtoError> {
        match v {
            0 => Ok(HurdleClearType::Perfect),
            1 => Ok(HurdleClearType::Good),
            2 => Ok(HurdleClearType::DoubleJumpOrGlide),
            3 => Ok(HurdleClearType::Collision),
            _ => Err(ProtoError::Malformed("unknown hurdle clear type")),
        }
    }
}

/// Serverbound room entry, authorized by a one-time password the lobby
/// minted against this character and room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnterRoom {
    pub character_uid: u32,
    pub one_time_password: u32,
    pub room_uid: u32,
}

impl EnterRoom {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_uid: r.u32()?,
            one_time_password: r.u32()?,
            room_uid: r.u32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u32(self.character_uid)
            .u32(self.one_time_password)
            .u32(self.room_uid);
    }
}

/// Room configuration as echoed to entrants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomDescription {
    pub name: Bytes,
    pub max_player_count: u8,
    pub password: Bytes,
    pub game_mode_maps: u8,
    pub game_mode: u8,
    pub map_block_id: u16,
    pub team_mode: u8,
    pub mission_id: u16,
    pub unk6: u8,
    pub skill_bracket: u8,
}

impl RoomDescription {
    fn write(&self, w: &mut Writer) {
        w.string(&self.name);
        w.u8(self.max_player_count);
        w.string(&self.password);
        w.u8(self.game_mode_maps)
            .u8(self.game_mode)
            .u16(self.map_block_id)
            .u8(self.team_mode)
            .u16(self.mission_id)
            .u8(self.unk6)
            .u8(self.skill_bracket);
    }

    fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            name: r.string()?,
            max_player_count: r.u8()?,
            password: r.string()?,
            game_mode_maps: r.u8()?,
            game_mode: r.u8()?,
            map_block_id: r.u16()?,
            team_mode: r.u8()?,
            mission_id: r.u16()?,
            unk6: r.u8()?,
            skill_bracket: r.u8()?,
        })
    }
}

/// One roster row in the enter-room acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomRacer {
    pub uid: u32,
    pub name: Bytes,
    pub level: u16,
    pub oid: u16,
    pub is_master: u8,
    pub is_ready: u8,
    pub is_hidden: u8,
    pub is_npc: u8,
    pub team_color: u8,
}

impl RoomRacer {
    fn write(&self, w: &mut Writer) {
        w.u32(self.uid);
        w.string(&self.name);
        w.u16(self.level)
            .u16(self.oid)
            .u8(self.is_master)
            .u8(self.is_ready)
            .u8(self.is_hidden)
            .u8(self.is_npc)
            .u8(self.team_color);
    }

    fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            uid: r.u32()?,
            name: r.string()?,
            level: r.u16()?,
            oid: r.u16()?,
            is_master: r.u8()?,
            is_ready: r.u8()?,
            is_hidden: r.u8()?,
            is_npc: r.u8()?,
            team_color: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnterRoomOk {
    pub room_uid: u32,
    pub is_room_waiting: u8,
    pub description: RoomDescription,
    pub racers: Vec<RoomRacer>,
}

impl Clientbound for EnterRoomOk {
    const COMMAND: CommandId = id::RACE_ENTER_ROOM_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.room_uid).u8(self.is_room_waiting);
        self.description.write(w);
        w.u8(self.racers.len() as u8);
        for racer in &self.racers {
            racer.write(w);
        }
    }
}

impl EnterRoomOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let room_uid = r.u32()?;
        let is_room_waiting = r.u8()?;
        let description = RoomDescription::read(r)?;
        let mut racers = Vec::new();
        for _ in 0..r.u8()? {
            racers.push(RoomRacer::read(r)?);
        }
        Ok(Self {
            room_uid,
            is_room_waiting,
            description,
            racers,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnterRoomCancel {
    pub status: EnterRoomCancelStatus,
}

impl Clientbound for EnterRoomCancel {
    const COMMAND: CommandId = id::RACE_ENTER_ROOM_CANCEL;

    fn write(&self, w: &mut Writer) {
        w.u8(self.status as u8);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnterRoomNotify {
    pub racer: RoomRacer,
    pub average_time_record: u32,
}

impl Clientbound for EnterRoomNotify {
    const COMMAND: CommandId = id::RACE_ENTER_ROOM_NOTIFY;

    fn write(&self, w: &mut Writer) {
        self.racer.write(w);
        w.u32(self.average_time_record);
    }
}

/// Serverbound room reconfiguration; a 6-bit field selects which options
/// changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeRoomOptions {
    pub options_bitfield: u16,
    pub name: Bytes,
    pub player_count: u8,
    pub password: Bytes,
    pub game_mode: u8,
    pub map_block_id: u16,
    pub npc_race: u8,
}

impl ChangeRoomOptions {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            options_bitfield: r.u16()?,
            name: r.string()?,
            player_count: r.u8()?,
            password: r.string()?,
            game_mode: r.u8()?,
            map_block_id: r.u16()?,
            npc_race: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.options_bitfield);
        w.string(&self.name);
        w.u8(self.player_count);
        w.string(&self.password);
        w.u8(self.game_mode).u16(self.map_block_id).u8(self.npc_race);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeRoomOptionsNotify {
    pub options_bitfield: u16,
    pub name: Bytes,
    pub player_count: u8,
    pub password: Bytes,
    pub game_mode: u8,
    pub map_block_id: u16,
    pub npc_race: u8,
}

impl Clientbound for ChangeRoomOptionsNotify {
    const COMMAND: CommandId = id::CHANGE_ROOM_OPTIONS_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u16(self.options_bitfield);
        w.string(&self.name);
        w.u8(self.player_count);
        w.string(&self.password);
        w.u8(self.game_mode).u16(self.map_block_id).u8(self.npc_race);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeTeam {
    pub character_uid: u32,
    pub team_color: u8,
}

impl ChangeTeam {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_uid: r.u32()?,
            team_color: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u32(self.character_uid).u8(self.team_color);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeTeamOk {
    pub character_uid: u32,
    pub team_color: u8,
}

impl Clientbound for ChangeTeamOk {
    const COMMAND: CommandId = id::CHANGE_TEAM_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.character_uid).u8(self.team_color);
    }
}

impl ChangeTeamOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_uid: r.u32()?,
            team_color: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeTeamNotify {
    pub character_uid: u32,
    pub team_color: u8,
}

impl Clientbound for ChangeTeamNotify {
    const COMMAND: CommandId = id::CHANGE_TEAM_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u32(self.character_uid).u8(self.team_color);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaveRoomOk;

impl Clientbound for LeaveRoomOk {
    const COMMAND: CommandId = id::RACE_LEAVE_ROOM_OK;

    fn write(&self, _w: &mut Writer) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaveRoomNotify {
    pub character_uid: u32,
    pub unk0: u8,
}

impl Clientbound for LeaveRoomNotify {
    const COMMAND: CommandId = id::RACE_LEAVE_ROOM_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u32(self.character_uid).u8(self.unk0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeMasterNotify {
    pub master_uid: u32,
}

impl Clientbound for ChangeMasterNotify {
    const COMMAND: CommandId = id::CHANGE_MASTER_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u32(self.master_uid);
    }
}

impl ChangeMasterNotify {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            master_uid: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyRaceNotify {
    pub character_uid: u32,
    pub is_ready: u8,
}

impl Clientbound for ReadyRaceNotify {
    const COMMAND: CommandId = id::READY_RACE_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u32(self.character_uid).u8(self.is_ready);
    }
}

impl ReadyRaceNotify {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_uid: r.u32()?,
            is_ready: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartRace {
    pub val0: u8,
}

impl StartRace {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        // Older client builds send an empty body.
        if r.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self { val0: r.u8()? })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u8(self.val0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomCountdown {
    pub countdown_ms: u32,
    pub map_block_id: u16,
}

impl Clientbound for RoomCountdown {
    const COMMAND: CommandId = id::ROOM_COUNTDOWN;

    fn write(&self, w: &mut Writer) {
        w.u32(self.countdown_ms).u16(self.map_block_id);
    }
}

impl RoomCountdown {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            countdown_ms: r.u32()?,
            map_block_id: r.u16()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartRacePlayer {
    pub oid: u16,
    pub name: Bytes,
    pub p2p_id: u16,
    pub team_color: u8,
}

/// The racer's confirmed skill selection, slot 3 being the rolled bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveSkillSet {
    pub set_id: u8,
    pub skills: [u32; 3],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartRaceNotify {
    pub game_mode: u8,
    pub team_mode: u8,
    pub map_block_id: u16,
    pub p2p_relay_address: u32,
    pub p2p_relay_port: u16,
    pub mission_id: u16,
    pub host_oid: u16,
    pub racers: Vec<StartRacePlayer>,
    pub active_skill_set: ActiveSkillSet,
}

impl Clientbound for StartRaceNotify {
    const COMMAND: CommandId = id::START_RACE_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u8(self.game_mode)
            .u8(self.team_mode)
            .u16(self.map_block_id)
            .u32(self.p2p_relay_address)
            .u16(self.p2p_relay_port)
            .u16(self.mission_id)
            .u16(self.host_oid);
        w.u8(self.racers.len() as u8);
        for racer in &self.racers {
            w.u16(racer.oid);
            w.string(&racer.name);
            w.u16(racer.p2p_id).u8(racer.team_color);
        }
        w.u8(self.active_skill_set.set_id);
        for skill in self.active_skill_set.skills {
            w.u32(skill);
        }
    }
}

impl StartRaceNotify {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let game_mode = r.u8()?;
        let team_mode = r.u8()?;
        let map_block_id = r.u16()?;
        let p2p_relay_address = r.u32()?;
        let p2p_relay_port = r.u16()?;
        let mission_id = r.u16()?;
        let host_oid = r.u16()?;
        let mut racers = Vec::new();
        for _ in 0..r.u8()? {
            racers.push(StartRacePlayer {
                oid: r.u16()?,
                name: r.string()?,
                p2p_id: r.u16()?,
                team_color: r.u8()?,
            });
        }
        let set_id = r.u8()?;
        let skills = [r.u32()?, r.u32()?, r.u32()?];
        Ok(Self {
            game_mode,
            team_mode,
            map_block_id,
            p2p_relay_address,
            p2p_relay_port,
            mission_id,
            host_oid,
            racers,
            active_skill_set: ActiveSkillSet { set_id, skills },
        })
    }
}

/// Serverbound clock-sync probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaceTimer {
    pub client_clock: u64,
}

impl RaceTimer {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            client_clock: r.u64()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u64(self.client_clock);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaceTimerOk {
    pub client_race_clock: u64,
    pub server_race_clock: u64,
}

impl Clientbound for RaceTimerOk {
    const COMMAND: CommandId = id::RACE_TIMER_OK;

    fn write(&self, w: &mut Writer) {
        w.u64(self.client_race_clock).u64(self.server_race_clock);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadingCompleteNotify {
    pub oid: u16,
}

impl Clientbound for LoadingCompleteNotify {
    const COMMAND: CommandId = id::LOADING_COMPLETE_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u16(self.oid);
    }
}

impl LoadingCompleteNotify {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self { oid: r.u16()? })
    }
}

/// Race-clock countdown to the actual start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserRaceCountdown {
    pub race_start_timestamp: u64,
}

impl Clientbound for UserRaceCountdown {
    const COMMAND: CommandId = id::USER_RACE_COUNTDOWN;

    fn write(&self, w: &mut Writer) {
        w.u64(self.race_start_timestamp);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UserRaceUpdatePos {
    pub oid: u16,
    pub position: [f32; 3],
    pub heading: f32,
}

impl UserRaceUpdatePos {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            oid: r.u16()?,
            position: r.f32x3()?,
            heading: r.f32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.oid).f32x3(self.position).f32(self.heading);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserRaceFinal {
    pub oid: u16,
    pub course_time: u32,
}

impl UserRaceFinal {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            oid: r.u16()?,
            course_time: r.u32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.oid).u32(self.course_time);
    }
}

/// Broadcast when a racer crosses the line; sent zeroed when the race
/// timeout forces every client to commit its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserRaceFinalNotify {
    pub oid: u16,
    pub course_time: u32,
}

impl Clientbound for UserRaceFinalNotify {
    const COMMAND: CommandId = id::USER_RACE_FINAL_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u16(self.oid).u32(self.course_time);
    }
}

impl UserRaceFinalNotify {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            oid: r.u16()?,
            course_time: r.u32()?,
        })
    }
}

pub mod score_bits {
    pub const CONNECTED: u32 = 1;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScoreInfo {
    pub uid: u32,
    pub name: Bytes,
    pub course_time: u32,
    pub bitset: u32,
    pub level: u16,
    pub mount_name: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RaceResultNotify {
    pub scores: Vec<ScoreInfo>,
}

impl Clientbound for RaceResultNotify {
    const COMMAND: CommandId = id::RACE_RESULT_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u8(self.scores.len() as u8);
        for score in &self.scores {
            w.u32(score.uid);
            w.string(&score.name);
            w.u32(score.course_time)
                .u32(score.bitset)
                .u16(score.level);
            w.string(&score.mount_name);
        }
    }
}

impl RaceResultNotify {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let mut scores = Vec::new();
        for _ in 0..r.u8()? {
            scores.push(ScoreInfo {
                uid: r.u32()?,
                name: r.string()?,
                course_time: r.u32()?,
                bitset: r.u32()?,
                level: r.u16()?,
                mount_name: r.string()?,
            });
        }
        Ok(Self { scores })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaceResultOk {
    pub member1: u32,
    pub member2: u32,
    pub member3: u32,
    pub member4: u32,
    pub member5: u32,
    pub current_carrots: i32,
}

impl Clientbound for RaceResultOk {
    const COMMAND: CommandId = id::RACE_RESULT_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.member1)
            .u32(self.member2)
            .u32(self.member3)
            .u32(self.member4)
            .u32(self.member5)
            .i32(self.current_carrots);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StarPointGet {
    pub character_oid: u16,
    pub gained_star_points: u32,
}

impl StarPointGet {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            gained_star_points: r.u32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u32(self.gained_star_points);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StarPointGetOk {
    pub character_oid: u16,
    pub star_point_value: u32,
    pub give_magic_item: u8,
}

impl Clientbound for StarPointGetOk {
    const COMMAND: CommandId = id::STAR_POINT_GET_OK;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid)
            .u32(self.star_point_value)
            .u8(self.give_magic_item);
    }
}

impl StarPointGetOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            star_point_value: r.u32()?,
            give_magic_item: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestSpur {
    pub character_oid: u16,
    pub active_boosters: u8,
    pub combo_break: u8,
}

impl RequestSpur {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            active_boosters: r.u8()?,
            combo_break: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid)
            .u8(self.active_boosters)
            .u8(self.combo_break);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestSpurOk {
    pub character_oid: u16,
    pub active_boosters: u8,
    pub star_point_value: u32,
    pub combo_break: u8,
}

impl Clientbound for RequestSpurOk {
    const COMMAND: CommandId = id::REQUEST_SPUR_OK;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid)
            .u8(self.active_boosters)
            .u32(self.star_point_value)
            .u8(self.combo_break);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HurdleClearResult {
    pub character_oid: u16,
    pub hurdle_clear_type: HurdleClearType,
}

impl HurdleClearResult {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            hurdle_clear_type: HurdleClearType::from_u8(r.u8()?)?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u8(self.hurdle_clear_type as u8);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HurdleClearResultOk {
    pub character_oid: u16,
    pub hurdle_clear_type: u8,
    pub jump_combo: u32,
    pub unk3: u32,
}

impl Clientbound for HurdleClearResultOk {
    const COMMAND: CommandId = id::HURDLE_CLEAR_RESULT_OK;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid)
            .u8(self.hurdle_clear_type)
            .u32(self.jump_combo)
            .u32(self.unk3);
    }
}

/// Boost gained off the starting gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartingRate {
    pub character_oid: u16,
    pub unk1: u32,
    pub boost_gained: u32,
}

impl StartingRate {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            unk1: r.u32()?,
            boost_gained: r.u32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u32(self.unk1).u32(self.boost_gained);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserRaceItemGet {
    pub character_oid: u16,
    pub item_id: u16,
}

impl UserRaceItemGet {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            item_id: r.u16()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u16(self.item_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RaceItemSpawn {
    pub item_id: u16,
    pub item_type: u32,
    pub position: [f32; 3],
    pub orientation: [f32; 4],
    pub size_level: u8,
    pub remove_delay: i32,
}

impl Clientbound for RaceItemSpawn {
    const COMMAND: CommandId = id::RACE_ITEM_SPAWN;

    fn write(&self, w: &mut Writer) {
        w.u16(self.item_id)
            .u32(self.item_type)
            .f32x3(self.position)
            .f32x4(self.orientation)
            .u8(self.size_level)
            .i32(self.remove_delay);
    }
}

impl RaceItemSpawn {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            item_id: r.u16()?,
            item_type: r.u32()?,
            position: r.f32x3()?,
            orientation: r.f32x4()?,
            size_level: r.u8()?,
            remove_delay: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaceItemGet {
    pub character_oid: u16,
    pub item_id: u16,
    pub item_type: u32,
}

impl Clientbound for RaceItemGet {
    const COMMAND: CommandId = id::RACE_ITEM_GET;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u16(self.item_id).u32(self.item_type);
    }
}

impl RaceItemGet {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            item_id: r.u16()?,
            item_type: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestMagicItem {
    pub character_oid: u16,
    pub member2: u32,
}

impl RequestMagicItem {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            member2: r.u32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u32(self.member2);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestMagicItemOk {
    pub character_oid: u16,
    pub magic_item_id: u32,
    pub member3: u32,
}

impl Clientbound for RequestMagicItemOk {
    const COMMAND: CommandId = id::REQUEST_MAGIC_ITEM_OK;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid)
            .u32(self.magic_item_id)
            .u32(self.member3);
    }
}

impl RequestMagicItemOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            magic_item_id: r.u32()?,
            member3: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestMagicItemNotify {
    pub magic_item_id: u32,
    pub character_oid: u16,
}

impl Clientbound for RequestMagicItemNotify {
    const COMMAND: CommandId = id::REQUEST_MAGIC_ITEM_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u32(self.magic_item_id).u16(self.character_oid);
    }
}

/// Bolt payload tail: auto-target list and strike timing. Present on the
/// wire only when the magic item is a bolt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoltPayload {
    pub targets: Vec<u16>,
    pub cast_delay: f32,
    pub down_duration: f32,
}

impl BoltPayload {
    fn write(&self, w: &mut Writer) {
        w.u8(self.targets.len() as u8);
        for oid in &self.targets {
            w.u16(*oid);
        }
        w.f32(self.cast_delay).f32(self.down_duration);
    }

    fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let mut targets = Vec::new();
        for _ in 0..r.u8()? {
            targets.push(r.u16()?);
        }
        Ok(Self {
            targets,
            cast_delay: r.f32()?,
            down_duration: r.f32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UseMagicItem {
    pub character_oid: u16,
    pub magic_item_id: u32,
    pub bolt: Option<BoltPayload>,
}

impl UseMagicItem {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let character_oid = r.u16()?;
        let magic_item_id = r.u32()?;
        let bolt = if magic_item_id == MAGIC_ITEM_BOLT {
            Some(BoltPayload::read(r)?)
        } else {
            None
        };
        Ok(Self {
            character_oid,
            magic_item_id,
            bolt,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u32(self.magic_item_id);
        if self.magic_item_id == MAGIC_ITEM_BOLT {
            self.bolt.clone().unwrap_or_default().write(w);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UseMagicItemOk {
    pub character_oid: u16,
    pub magic_item_id: u32,
    pub unk3: u16,
    pub unk4: u32,
    pub bolt: Option<BoltPayload>,
}

impl Clientbound for UseMagicItemOk {
    const COMMAND: CommandId = id::USE_MAGIC_ITEM_OK;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid)
            .u32(self.magic_item_id)
            .u16(self.unk3)
            .u32(self.unk4);
        if self.magic_item_id == MAGIC_ITEM_BOLT {
            self.bolt.clone().unwrap_or_default().write(w);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UseMagicItemNotify {
    pub character_oid: u16,
    pub magic_item_id: u32,
    pub unk3: u16,
    pub bolt: Option<BoltPayload>,
}

impl Clientbound for UseMagicItemNotify {
    const COMMAND: CommandId = id::USE_MAGIC_ITEM_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid)
            .u32(self.magic_item_id)
            .u16(self.unk3);
        if self.magic_item_id == MAGIC_ITEM_BOLT {
            self.bolt.clone().unwrap_or_default().write(w);
        }
    }
}

impl UseMagicItemNotify {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let character_oid = r.u16()?;
        let magic_item_id = r.u32()?;
        let unk3 = r.u16()?;
        let bolt = if magic_item_id == MAGIC_ITEM_BOLT {
            Some(BoltPayload::read(r)?)
        } else {
            None
        };
        Ok(Self {
            character_oid,
            magic_item_id,
            unk3,
            bolt,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartMagicTarget {
    pub character_oid: u16,
}

impl StartMagicTarget {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeMagicTarget {
    pub character_oid: u16,
    pub target_oid: u16,
}

impl ChangeMagicTarget {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            character_oid: r.u16()?,
            target_oid: r.u16()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u16(self.target_oid);
    }
}

/// Forwarded to the targeted racer while an attacker is aiming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeMagicTargetNotify {
    pub character_oid: u16,
    pub target_oid: u16,
}

impl Clientbound for ChangeMagicTargetNotify {
    const COMMAND: CommandId = id::CHANGE_MAGIC_TARGET_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid).u16(self.target_oid);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveMagicTarget {
    pub character_oid: u16,
}

impl Clientbound for RemoveMagicTarget {
    const COMMAND: CommandId = id::REMOVE_MAGIC_TARGET;

    fn write(&self, w: &mut Writer) {
        w.u16(self.character_oid);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chat {
    pub message: Bytes,
    pub unk0: u8,
}

impl Chat {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            message: r.string()?,
            unk0: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.string(&self.message);
        w.u8(self.unk0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatNotify {
    pub author: Bytes,
    pub message: Bytes,
    pub is_system: u8,
}

impl Clientbound for ChatNotify {
    const COMMAND: CommandId = id::CHAT_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.string(&self.author);
        w.string(&self.message);
        w.u8(self.is_system);
    }
}

impl ChatNotify {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            author: r.string()?,
            message: r.string()?,
            is_system: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayCommand {
    pub member1: u32,
    pub member2: u32,
}

impl RelayCommand {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            member1: r.u32()?,
            member2: r.u32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u32(self.member1).u32(self.member2);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayCommandNotify {
    pub member1: u32,
    pub member2: u32,
}

impl Clientbound for RelayCommandNotify {
    const COMMAND: CommandId = id::RELAY_COMMAND_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u32(self.member1).u32(self.member2);
    }
}

/// Opaque in-race state blob, fanned out to the other room clients.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Relay {
    pub oid: u16,
    pub member2: u32,
    pub member3: u32,
    pub data: Bytes,
}

impl Relay {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            oid: r.u16()?,
            member2: r.u32()?,
            member3: r.u32()?,
            data: r.tail(),
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.oid).u32(self.member2).u32(self.member3);
        w.bytes(&self.data);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelayNotify {
    pub oid: u16,
    pub member2: u32,
    pub member3: u32,
    pub data: Bytes,
}

impl Clientbound for RelayNotify {
    const COMMAND: CommandId = id::RELAY_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u16(self.oid).u32(self.member2).u32(self.member3);
        w.bytes(&self.data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AwardStart {
    pub member1: u32,
}

impl AwardStart {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self { member1: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AwardNotify {
    pub member1: u32,
}

impl Clientbound for AwardNotify {
    const COMMAND: CommandId = id::AWARD_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u32(self.member1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RaceP2PResult {
    pub entries: Vec<(u16, u32)>,
}

impl Clientbound for RaceP2PResult {
    const COMMAND: CommandId = id::RACE_P2P_RESULT;

    fn write(&self, w: &mut Writer) {
        w.u8(self.entries.len() as u8);
        for (oid, member2) in &self.entries {
            w.u16(*oid).u32(*member2);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSkillCardPreset {
    pub set_id: u8,
    pub game_mode: u8,
}

impl ChangeSkillCardPreset {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            set_id: r.u8()?,
            game_mode: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u8(self.set_id).u8(self.game_mode);
    }
}

/// Everything a client can send to the race tier.
#[derive(Debug, Clone)]
pub enum RaceCommand {
    EnterRoom(EnterRoom),
    ChangeRoomOptions(ChangeRoomOptions),
    ChangeTeam(ChangeTeam),
    LeaveRoom,
    ReadyRace,
    StartRace(StartRace),
    RaceTimer(RaceTimer),
    LoadingComplete,
    UserRaceUpdatePos(UserRaceUpdatePos),
    UserRaceFinal(UserRaceFinal),
    UserRaceItemGet(UserRaceItemGet),
    StarPointGet(StarPointGet),
    RequestSpur(RequestSpur),
    HurdleClearResult(HurdleClearResult),
    StartingRate(StartingRate),
    RequestMagicItem(RequestMagicItem),
    UseMagicItem(UseMagicItem),
    StartMagicTarget(StartMagicTarget),
    ChangeMagicTargetNotify(ChangeMagicTarget),
    ChangeMagicTargetOk(ChangeMagicTarget),
    ChangeMagicTargetCancel(StartMagicTarget),
    Chat(Chat),
    RelayCommand(RelayCommand),
    Relay(Relay),
    AwardStart(AwardStart),
    AwardEnd,
    RaceResult,
    P2PResult,
    ChangeSkillCardPreset(ChangeSkillCardPreset),
}

impl RaceCommand {
    pub fn decode(command: CommandId, payload: Bytes) -> Result<Self, ProtoError> {
        let mut r = Reader::new(payload);
        match command {
            id::RACE_ENTER_ROOM => Ok(RaceCommand::EnterRoom(EnterRoom::read(&mut r)?)),
            id::CHANGE_ROOM_OPTIONS => Ok(RaceCommand::ChangeRoomOptions(
                ChangeRoomOptions::read(&mut r)?,
            )),
            id::CHANGE_TEAM => Ok(RaceCommand::ChangeTeam(ChangeTeam::read(&mut r)?)),
            id::RACE_LEAVE_ROOM => Ok(RaceCommand::LeaveRoom),
            id::READY_RACE => Ok(RaceCommand::ReadyRace),
            id::START_RACE => Ok(RaceCommand::StartRace(StartRace::read(&mut r)?)),
            id::RACE_TIMER => Ok(RaceCommand::RaceTimer(RaceTimer::read(&mut r)?)),
            id::LOADING_COMPLETE => Ok(RaceCommand::LoadingComplete),
            id::USER_RACE_UPDATE_POS => Ok(RaceCommand::UserRaceUpdatePos(
                UserRaceUpdatePos::read(&mut r)?,
            )),
            id::USER_RACE_FINAL => Ok(RaceCommand::UserRaceFinal(UserRaceFinal::read(&mut r)?)),
            id::USER_RACE_ITEM_GET => {
                Ok(RaceCommand::UserRaceItemGet(UserRaceItemGet::read(&mut r)?))
            }
            id::STAR_POINT_GET => Ok(RaceCommand::StarPointGet(StarPointGet::read(&mut r)?)),
            id::REQUEST_SPUR => Ok(RaceCommand::RequestSpur(RequestSpur::read(&mut r)?)),
            id::HURDLE_CLEAR_RESULT => Ok(RaceCommand::HurdleClearResult(HurdleClearResult::read(
                &mut r,
            )?)),
            id::STARTING_RATE => Ok(RaceCommand::StartingRate(StartingRate::read(&mut r)?)),
            id::REQUEST_MAGIC_ITEM => {
                Ok(RaceCommand::RequestMagicItem(RequestMagicItem::read(&mut r)?))
            }
            id::USE_MAGIC_ITEM => Ok(RaceCommand::UseMagicItem(UseMagicItem::read(&mut r)?)),
            id::START_MAGIC_TARGET => {
                Ok(RaceCommand::StartMagicTarget(StartMagicTarget::read(&mut r)?))
            }
            id::CHANGE_MAGIC_TARGET_NOTIFY => Ok(RaceCommand::ChangeMagicTargetNotify(
                ChangeMagicTarget::read(&mut r)?,
            )),
            id::CHANGE_MAGIC_TARGET_OK => Ok(RaceCommand::ChangeMagicTargetOk(
                ChangeMagicTarget::read(&mut r)?,
            )),
            id::CHANGE_MAGIC_TARGET_CANCEL => Ok(RaceCommand::ChangeMagicTargetCancel(
                StartMagicTarget::read(&mut r)?,
            )),
            id::CHAT => Ok(RaceCommand::Chat(Chat::read(&mut r)?)),
            id::RELAY_COMMAND => Ok(RaceCommand::RelayCommand(RelayCommand::read(&mut r)?)),
            id::RELAY => Ok(RaceCommand::Relay(Relay::read(&mut r)?)),
            id::AWARD_START => Ok(RaceCommand::AwardStart(AwardStart::read(&mut r)?)),
            id::AWARD_END => Ok(RaceCommand::AwardEnd),
            id::RACE_RESULT => Ok(RaceCommand::RaceResult),
            id::P2P_RESULT => Ok(RaceCommand::P2PResult),
            id::CHANGE_SKILL_CARD_PRESET => Ok(RaceCommand::ChangeSkillCardPreset(
                ChangeSkillCardPreset::read(&mut r)?,
            )),
            other => Err(ProtoError::UnknownCommand(other)),
        }
    }
}
