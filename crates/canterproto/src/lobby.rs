//! The lobby message family.
//!
//! Serverbound commands implement `read`; clientbound commands implement
//! [`Clientbound`]. Commands that test clients also speak get the opposite
//! direction too. Fields named `val*`/`unk*`/`member*` mirror undocumented
//! slots of the client protocol; their byte layout is preserved and never
//! reinterpreted.

use bytes::Bytes;

use crate::id;
use crate::shared::{Character, Guild, Horse, Item};
use crate::wire::{Reader, Writer};
use crate::{Clientbound, CommandId, ProtoError};

/// Login cancel reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoginCancelReason {
    Generic = 0,
    InvalidUser = 1,
    Duplicated = 2,
    InvalidVersion = 3,
    InvalidEquipment = 4,
    InvalidLoginId = 5,
    DisconnectYourself = 6,
}

/// Enter-room cancel statuses shared with the race tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnterRoomCancelStatus {
    NotLogin = 1,
    NotInChannel = 2,
    BusyPrevious = 3,
    AlreadyRoom = 4,
    InvalidRoom = 5,
    CrowdedRoom = 6,
    VersionError = 7,
    LostRoom = 8,
    LostServer = 9,
    AuthError = 10,
    BadPassword = 11,
    PlayingRoom = 12,
    PracticeLostRoom = 13,
    PracticeLostServer = 14,
    PracticeAuthError = 15,
    PracticeCrowdedRoom = 16,
}

/// Serverbound login. The constants carry the client build version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Login {
    pub constant0: u16,
    pub constant1: u16,
    pub login_id: Bytes,
    pub member_no: u32,
    pub auth_key: Bytes,
    pub val0: u8,
}

impl Login {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            constant0: r.u16()?,
            constant1: r.u16()?,
            login_id: r.string()?,
            member_no: r.u32()?,
            auth_key: r.string()?,
            val0: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u16(self.constant0).u16(self.constant1);
        w.string(&self.login_id);
        w.u32(self.member_no);
        w.string(&self.auth_key);
        w.u8(self.val0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardBinding {
    pub index: u8,
    pub code: u16,
    pub val0: u8,
}

/// Client-side option block carried in the login acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    pub val0: u8,
    pub keyboard: Vec<KeyboardBinding>,
    pub macros: Vec<Bytes>,
    pub value: u32,
    pub gamepad: u8,
}

impl Settings {
    fn write(&self, w: &mut Writer) {
        w.u8(self.val0);
        w.u8(self.keyboard.len() as u8);
        for b in &self.keyboard {
            w.u8(b.index).u16(b.code).u8(b.val0);
        }
        w.u8(self.macros.len() as u8);
        for m in &self.macros {
            w.string(m);
        }
        w.u32(self.value).u8(self.gamepad);
    }

    fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let val0 = r.u8()?;
        let mut keyboard = Vec::new();
        for _ in 0..r.u8()? {
            keyboard.push(KeyboardBinding {
                index: r.u8()?,
                code: r.u16()?,
                val0: r.u8()?,
            });
        }
        let mut macros = Vec::new();
        for _ in 0..r.u8()? {
            macros.push(r.string()?);
        }
        Ok(Self {
            val0,
            keyboard,
            macros,
            value: r.u32()?,
            gamepad: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MissionProgress {
    pub id: u32,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mission {
    pub id: u16,
    pub progress: Vec<MissionProgress>,
}

/// Clientbound login acknowledgement.
///
/// Carries everything the client needs to leave the login screen: the
/// profile, equipment, mission state, the ranch advertisement, and the
/// scrambling constant that re-arms the connection's XOR key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginOk {
    pub lobby_time: u64,
    pub member0: u32,
    pub uid: u32,
    pub name: Bytes,
    pub motd: Bytes,
    pub gender: u8,
    pub introduction: Bytes,
    pub character_equipment: Vec<Item>,
    pub mount_equipment: Vec<Item>,
    pub level: u16,
    pub carrots: i32,
    pub val1: u32,
    pub role: u32,
    pub val3: u8,
    pub settings: Settings,
    pub missions: Vec<Mission>,
    pub val6: Bytes,
    pub ranch_address: u32,
    pub ranch_port: u16,
    pub scrambling_constant: u32,
    pub character: Character,
    pub horse: Horse,
    pub system_content: Vec<(u32, u32)>,
    pub bitfield: u32,
    pub val9: (u16, u16, u16),
    pub val10: u32,
    pub guild: Guild,
    pub val16: u8,
    pub rent_mount_uid: u32,
    pub rent_val1: u32,
    pub rent_val2: u32,
    pub val18: u32,
    pub val19: u32,
    pub val20: u32,
}

impl Clientbound for LoginOk {
    const COMMAND: CommandId = id::LOGIN_OK;

    fn write(&self, w: &mut Writer) {
        w.u64(self.lobby_time).u32(self.member0);

        // Profile.
        w.u32(self.uid);
        w.string(&self.name);
        w.string(&self.motd);
        w.u8(self.gender);
        w.string(&self.introduction);

        w.u8(self.character_equipment.len() as u8);
        for item in &self.character_equipment {
            item.write(w);
        }
        w.u8(self.mount_equipment.len() as u8);
        for item in &self.mount_equipment {
            item.write(w);
        }

        w.u16(self.level)
            .i32(self.carrots)
            .u32(self.val1)
            .u32(self.role)
            .u8(self.val3);

        self.settings.write(w);

        w.u8(self.missions.len() as u8);
        for mission in &self.missions {
            w.u16(mission.id);
            w.u8(mission.progress.len() as u8);
            for p in &mission.progress {
                w.u32(p.id).u32(p.value);
            }
        }

        w.string(&self.val6);

        w.u32(self.ranch_address)
            .u16(self.ranch_port)
            .u32(self.scrambling_constant);

        self.character.write(w);
        self.horse.write(w);

        w.u8(self.system_content.len() as u8);
        for (key, value) in &self.system_content {
            w.u32(*key).u32(*value);
        }

        w.u32(self.bitfield);
        w.u16(self.val9.0).u16(self.val9.1).u16(self.val9.2);
        w.u32(self.val10);

        self.guild.write(w);

        w.u8(self.val16);
        w.u32(self.rent_mount_uid).u32(self.rent_val1).u32(self.rent_val2);
        w.u32(self.val18).u32(self.val19).u32(self.val20);
    }
}

impl LoginOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let lobby_time = r.u64()?;
        let member0 = r.u32()?;
        let uid = r.u32()?;
        let name = r.string()?;
        let motd = r.string()?;
        let gender = r.u8()?;
        let introduction = r.string()?;

        let mut character_equipment = Vec::new();
        for _ in 0..r.u8()? {
            character_equipment.push(Item::read(r)?);
        }
        let mut mount_equipment = Vec::new();
        for _ in 0..r.u8()? {
            mount_equipment.push(Item::read(r)?);
        }

        let level = r.u16()?;
        let carrots = r.i32()?;
        let val1 = r.u32()?;
        let role = r.u32()?;
        let val3 = r.u8()?;
        let settings = Settings::read(r)?;

        let mut missions = Vec::new();
        for _ in 0..r.u8()? {
            let mission_id = r.u16()?;
            let mut progress = Vec::new();
            for _ in 0..r.u8()? {
                progress.push(MissionProgress {
                    id: r.u32()?,
                    value: r.u32()?,
                });
            }
            missions.push(Mission {
                id: mission_id,
                progress,
            });
        }

        let val6 = r.string()?;
        let ranch_address = r.u32()?;
        let ranch_port = r.u16()?;
        let scrambling_constant = r.u32()?;
        let character = Character::read(r)?;
        let horse = Horse::read(r)?;

        let mut system_content = Vec::new();
        for _ in 0..r.u8()? {
            system_content.push((r.u32()?, r.u32()?));
        }

        Ok(Self {
            lobby_time,
            member0,
            uid,
            name,
            motd,
            gender,
            introduction,
            character_equipment,
            mount_equipment,
            level,
            carrots,
            val1,
            role,
            val3,
            settings,
            missions,
            val6,
            ranch_address,
            ranch_port,
            scrambling_constant,
            character,
            horse,
            system_content,
            bitfield: r.u32()?,
            val9: (r.u16()?, r.u16()?, r.u16()?),
            val10: r.u32()?,
            guild: Guild::read(r)?,
            val16: r.u8()?,
            rent_mount_uid: r.u32()?,
            rent_val1: r.u32()?,
            rent_val2: r.u32()?,
            val18: r.u32()?,
            val19: r.u32()?,
            val20: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginCancel {
    pub reason: LoginCancelReason,
}

impl Clientbound for LoginCancel {
    const COMMAND: CommandId = id::LOGIN_CANCEL;

    fn write(&self, w: &mut Writer) {
        w.u8(self.reason as u8);
    }
}

impl LoginCancel {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let reason = match r.u8()? {
            0 => LoginCancelReason::Generic,
            1 => LoginCancelReason::InvalidUser,
            2 => LoginCancelReason::Duplicated,
            3 => LoginCancelReason::InvalidVersion,
            4 => LoginCancelReason::InvalidEquipment,
            5 => LoginCancelReason::InvalidLoginId,
            6 => LoginCancelReason::DisconnectYourself,
            _ => return Err(ProtoError::Malformed("unknown login cancel reason")),
        };
        Ok(Self { reason })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShowInventoryOk {
    pub items: Vec<Item>,
    pub horses: Vec<Horse>,
}

impl Clientbound for ShowInventoryOk {
    const COMMAND: CommandId = id::SHOW_INVENTORY_OK;

    fn write(&self, w: &mut Writer) {
        w.u8(self.items.len() as u8);
        for item in &self.items {
            item.write(w);
        }
        w.u8(self.horses.len() as u8);
        for horse in &self.horses {
            horse.write(w);
        }
    }
}

/// Sends a fresh account to the nickname creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateNicknameNotify;

impl Clientbound for CreateNicknameNotify {
    const COMMAND: CommandId = id::CREATE_NICKNAME_NOTIFY;

    fn write(&self, _w: &mut Writer) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateNickname {
    pub nickname: Bytes,
    pub char_id: u8,
    pub mouth_serial_id: u8,
    pub face_serial_id: u8,
    pub val0: u8,
}

impl CreateNickname {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            nickname: r.string()?,
            char_id: r.u8()?,
            mouth_serial_id: r.u8()?,
            face_serial_id: r.u8()?,
            val0: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.string(&self.nickname);
        w.u8(self.char_id)
            .u8(self.mouth_serial_id)
            .u8(self.face_serial_id)
            .u8(self.val0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateNicknameCancel {
    pub error: u8,
}

impl Clientbound for CreateNicknameCancel {
    const COMMAND: CommandId = id::CREATE_NICKNAME_CANCEL;

    fn write(&self, w: &mut Writer) {
        w.u8(self.error);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnterChannel {
    pub channel: u8,
}

impl EnterChannel {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self { channel: r.u8()? })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u8(self.channel);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnterChannelOk {
    pub unk0: u8,
    pub unk1: u16,
}

impl Clientbound for EnterChannelOk {
    const COMMAND: CommandId = id::ENTER_CHANNEL_OK;

    fn write(&self, w: &mut Writer) {
        w.u8(self.unk0).u16(self.unk1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaveChannelOk;

impl Clientbound for LeaveChannelOk {
    const COMMAND: CommandId = id::LEAVE_CHANNEL_OK;

    fn write(&self, _w: &mut Writer) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomList {
    pub page: u8,
    pub game_mode: u8,
    pub team_mode: u8,
}

impl RoomList {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            page: r.u8()?,
            game_mode: r.u8()?,
            team_mode: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u8(self.page).u8(self.game_mode).u8(self.team_mode);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomListEntry {
    pub uid: u32,
    pub name: Bytes,
    pub player_count: u8,
    pub max_player_count: u8,
    pub is_locked: u8,
    pub unk0: u8,
    pub unk1: u8,
    pub map: u16,
    pub has_started: u8,
    pub unk2: u16,
    pub unk3: u8,
    pub skill_bracket: u8,
    pub unk4: u32,
}

impl RoomListEntry {
    fn write(&self, w: &mut Writer) {
        w.u32(self.uid);
        w.string(&self.name);
        w.u8(self.player_count)
            .u8(self.max_player_count)
            .u8(self.is_locked)
            .u8(self.unk0)
            .u8(self.unk1)
            .u16(self.map)
            .u8(self.has_started)
            .u16(self.unk2)
            .u8(self.unk3)
            .u8(self.skill_bracket)
            .u32(self.unk4);
    }

    fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            uid: r.u32()?,
            name: r.string()?,
            player_count: r.u8()?,
            max_player_count: r.u8()?,
            is_locked: r.u8()?,
            unk0: r.u8()?,
            unk1: r.u8()?,
            map: r.u16()?,
            has_started: r.u8()?,
            unk2: r.u16()?,
            unk3: r.u8()?,
            skill_bracket: r.u8()?,
            unk4: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomListOk {
    pub page: u8,
    pub game_mode: u8,
    pub team_mode: u8,
    pub rooms: Vec<RoomListEntry>,
    pub unk3: (u32, Bytes, u16),
}

impl Clientbound for RoomListOk {
    const COMMAND: CommandId = id::ROOM_LIST_OK;

    fn write(&self, w: &mut Writer) {
        w.u8(self.page).u8(self.game_mode).u8(self.team_mode);
        w.u8(self.rooms.len() as u8);
        for room in &self.rooms {
            room.write(w);
        }
        w.u32(self.unk3.0);
        w.string(&self.unk3.1);
        w.u16(self.unk3.2);
    }
}

impl RoomListOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        let page = r.u8()?;
        let game_mode = r.u8()?;
        let team_mode = r.u8()?;
        let mut rooms = Vec::new();
        for _ in 0..r.u8()? {
            rooms.push(RoomListEntry::read(r)?);
        }
        Ok(Self {
            page,
            game_mode,
            team_mode,
            rooms,
            unk3: (r.u32()?, r.string()?, r.u16()?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MakeRoom {
    pub name: Bytes,
    pub password: Bytes,
    pub player_count: u8,
    pub game_mode: u8,
    pub team_mode: u8,
    pub mission_id: u16,
    pub unk3: u8,
    pub bitset: u16,
    pub unk4: u8,
}

impl MakeRoom {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            name: r.string()?,
            password: r.string()?,
            player_count: r.u8()?,
            game_mode: r.u8()?,
            team_mode: r.u8()?,
            mission_id: r.u16()?,
            unk3: r.u8()?,
            bitset: r.u16()?,
            unk4: r.u8()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.string(&self.name);
        w.string(&self.password);
        w.u8(self.player_count)
            .u8(self.game_mode)
            .u8(self.team_mode)
            .u16(self.mission_id)
            .u8(self.unk3)
            .u16(self.bitset)
            .u8(self.unk4);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MakeRoomOk {
    pub room_uid: u32,
    pub one_time_password: u32,
    pub race_address: u32,
    pub race_port: u16,
    pub unk2: u8,
}

impl Clientbound for MakeRoomOk {
    const COMMAND: CommandId = id::MAKE_ROOM_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.room_uid)
            .u32(self.one_time_password)
            .u32(self.race_address)
            .u16(self.race_port)
            .u8(self.unk2);
    }
}

impl MakeRoomOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            room_uid: r.u32()?,
            one_time_password: r.u32()?,
            race_address: r.u32()?,
            race_port: r.u16()?,
            unk2: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MakeRoomCancel {
    pub unk0: u8,
}

impl Clientbound for MakeRoomCancel {
    const COMMAND: CommandId = id::MAKE_ROOM_CANCEL;

    fn write(&self, w: &mut Writer) {
        w.u8(self.unk0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnterRoom {
    pub room_uid: u32,
    pub password: Bytes,
    pub member3: u32,
}

impl EnterRoom {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            room_uid: r.u32()?,
            password: r.string()?,
            member3: r.u32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u32(self.room_uid);
        w.string(&self.password);
        w.u32(self.member3);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnterRoomOk {
    pub room_uid: u32,
    pub one_time_password: u32,
    pub race_address: u32,
    pub race_port: u16,
    pub member6: u8,
}

impl Clientbound for EnterRoomOk {
    const COMMAND: CommandId = id::ENTER_ROOM_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.room_uid)
            .u32(self.one_time_password)
            .u32(self.race_address)
            .u16(self.race_port)
            .u8(self.member6);
    }
}

impl EnterRoomOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            room_uid: r.u32()?,
            one_time_password: r.u32()?,
            race_address: r.u32()?,
            race_port: r.u16()?,
            member6: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnterRoomCancel {
    pub status: EnterRoomCancelStatus,
}

impl Clientbound for EnterRoomCancel {
    const COMMAND: CommandId = id::ENTER_ROOM_CANCEL;

    fn write(&self, w: &mut Writer) {
        w.u8(self.status as u8);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnterRanch {
    pub ranch_uid: u32,
}

impl EnterRanch {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            ranch_uid: r.u32()?,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.u32(self.ranch_uid);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnterRanchOk {
    pub ranch_uid: u32,
    pub code: u32,
    pub ranch_address: u32,
    pub ranch_port: u16,
}

impl Clientbound for EnterRanchOk {
    const COMMAND: CommandId = id::ENTER_RANCH_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.ranch_uid)
            .u32(self.code)
            .u32(self.ranch_address)
            .u16(self.ranch_port);
    }
}

impl EnterRanchOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            ranch_uid: r.u32()?,
            code: r.u32()?,
            ranch_address: r.u32()?,
            ranch_port: r.u16()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnterRanchCancel {
    pub reason: u8,
}

impl Clientbound for EnterRanchCancel {
    const COMMAND: CommandId = id::ENTER_RANCH_CANCEL;

    fn write(&self, w: &mut Writer) {
        w.u8(self.reason);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetMessengerInfoOk {
    pub code: u32,
    pub messenger_address: u32,
    pub messenger_port: u16,
}

impl Clientbound for GetMessengerInfoOk {
    const COMMAND: CommandId = id::GET_MESSENGER_INFO_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.code)
            .u32(self.messenger_address)
            .u16(self.messenger_port);
    }
}

impl GetMessengerInfoOk {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            code: r.u32()?,
            messenger_address: r.u32()?,
            messenger_port: r.u16()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitingSeqnoNotify {
    pub seqno: u32,
}

impl Clientbound for WaitingSeqnoNotify {
    const COMMAND: CommandId = id::WAITING_SEQNO_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u32(self.seqno);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AchievementCompleteList {
    pub unk0: u32,
}

impl AchievementCompleteList {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self { unk0: r.u32()? })
    }
}

/// Framing stub. The achievement vector carries a 16-bit count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AchievementCompleteListOk {
    pub unk0: u32,
    pub achievements: Vec<(u16, u32)>,
}

impl Clientbound for AchievementCompleteListOk {
    const COMMAND: CommandId = id::ACHIEVEMENT_COMPLETE_LIST_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.unk0);
        w.u16(self.achievements.len() as u16);
        for (achievement_id, val) in &self.achievements {
            w.u16(*achievement_id).u32(*val);
        }
    }
}

/// Framing stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestLeagueInfoOk {
    pub unk0: u8,
    pub unk1: u8,
    pub unk2: u32,
    pub unk3: u8,
    pub unk4: u8,
    pub unk5: u32,
    pub unk6: u8,
    pub unk7: u8,
    pub unk8: u8,
    pub unk9: u32,
    pub unk10: u8,
    pub unk11: u8,
    pub unk12: u8,
}

impl Clientbound for RequestLeagueInfoOk {
    const COMMAND: CommandId = id::REQUEST_LEAGUE_INFO_OK;

    fn write(&self, w: &mut Writer) {
        w.u8(self.unk0)
            .u8(self.unk1)
            .u32(self.unk2)
            .u8(self.unk3)
            .u8(self.unk4)
            .u32(self.unk5)
            .u8(self.unk6)
            .u8(self.unk7)
            .u8(self.unk8)
            .u32(self.unk9)
            .u8(self.unk10)
            .u8(self.unk11)
            .u8(self.unk12);
    }
}

/// Framing stub shared by the daily and regular quest lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuestListOk {
    pub val0: u32,
    pub quest_count: u16,
    pub unk_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestDailyQuestListOk(pub QuestListOk);

impl Clientbound for RequestDailyQuestListOk {
    const COMMAND: CommandId = id::REQUEST_DAILY_QUEST_LIST_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.0.val0).u16(self.0.quest_count).u16(self.0.unk_count);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestQuestListOk(pub QuestListOk);

impl Clientbound for RequestQuestListOk {
    const COMMAND: CommandId = id::REQUEST_QUEST_LIST_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.0.val0).u16(self.0.quest_count).u16(self.0.unk_count);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestSpecialEventList {
    pub unk0: u32,
}

impl RequestSpecialEventList {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self { unk0: r.u32()? })
    }
}

/// Framing stub.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestSpecialEventListOk {
    pub unk0: u32,
    pub events: Vec<(u16, u32)>,
    pub unk1: u32,
}

impl Clientbound for RequestSpecialEventListOk {
    const COMMAND: CommandId = id::REQUEST_SPECIAL_EVENT_LIST_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.unk0);
        w.u8(self.events.len() as u8);
        for (event_id, val) in &self.events {
            w.u16(*event_id).u32(*val);
        }
        w.u32(self.unk1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFestivalResult {
    pub unk0: u32,
}

impl RequestFestivalResult {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self { unk0: r.u32()? })
    }
}

/// Framing stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFestivalResultOk {
    pub unk0: u32,
    pub unk1: u32,
}

impl Clientbound for RequestFestivalResultOk {
    const COMMAND: CommandId = id::REQUEST_FESTIVAL_RESULT_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.unk0).u32(self.unk1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFestivalPrize {
    pub unk0: u32,
}

impl RequestFestivalPrize {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self { unk0: r.u32()? })
    }
}

/// Framing stub.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestFestivalPrizeOk {
    pub unk0: u32,
    pub prizes: Vec<(u32, u32)>,
}

impl Clientbound for RequestFestivalPrizeOk {
    const COMMAND: CommandId = id::REQUEST_FESTIVAL_PRIZE_OK;

    fn write(&self, w: &mut Writer) {
        w.u32(self.unk0);
        w.u8(self.prizes.len() as u8);
        for (prize_id, count) in &self.prizes {
            w.u32(*prize_id).u32(*count);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateSystemContent {
    pub val0: u8,
    pub key: u32,
    pub value: u32,
}

impl UpdateSystemContent {
    pub fn read(r: &mut Reader) -> Result<Self, ProtoError> {
        Ok(Self {
            val0: r.u8()?,
            key: r.u32()?,
            value: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateSystemContentNotify {
    pub values: Vec<(u32, u32)>,
}

impl Clientbound for UpdateSystemContentNotify {
    const COMMAND: CommandId = id::UPDATE_SYSTEM_CONTENT_NOTIFY;

    fn write(&self, w: &mut Writer) {
        w.u8(self.values.len() as u8);
        for (key, value) in &self.values {
            w.u32(*key).u32(*value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryServerTimeOk {
    pub time: u64,
}

impl Clientbound for QueryServerTimeOk {
    const COMMAND: CommandId = id::QUERY_SERVER_TIME_OK;

    fn write(&self, w: &mut Writer) {
        w.u64(self.time);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notice {
    pub message: Bytes,
}

impl Clientbound for Notice {
    const COMMAND: CommandId = id::NOTICE;

    fn write(&self, w: &mut Writer) {
        w.string(&self.message);
    }
}

/// Everything a client can send to the lobby tier.
#[derive(Debug, Clone)]
pub enum LobbyCommand {
    Login(Login),
    ShowInventory,
    CreateNickname(CreateNickname),
    EnterChannel(EnterChannel),
    LeaveChannel,
    RoomList(RoomList),
    MakeRoom(MakeRoom),
    EnterRoom(EnterRoom),
    LeaveRoom,
    EnterRanch(EnterRanch),
    Heartbeat,
    GetMessengerInfo,
    CheckWaitingSeqno,
    AchievementCompleteList(AchievementCompleteList),
    RequestLeagueInfo,
    RequestDailyQuestList,
    RequestQuestList,
    RequestSpecialEventList(RequestSpecialEventList),
    RequestFestivalResult(RequestFestivalResult),
    RequestFestivalPrize(RequestFestivalPrize),
    UpdateSystemContent(UpdateSystemContent),
    QueryServerTime,
}

impl LobbyCommand {
    pub fn decode(command: CommandId, payload: Bytes) -> Result<Self, ProtoError> {
        let mut r = Reader::new(payload);
        match command {
            id::LOGIN => Ok(LobbyCommand::Login(Login::read(&mut r)?)),
            id::SHOW_INVENTORY => Ok(LobbyCommand::ShowInventory),
            id::CREATE_NICKNAME => Ok(LobbyCommand::CreateNickname(CreateNickname::read(&mut r)?)),
            id::ENTER_CHANNEL => Ok(LobbyCommand::EnterChannel(EnterChannel::read(&mut r)?)),
            id::LEAVE_CHANNEL => Ok(LobbyCommand::LeaveChannel),
            id::ROOM_LIST => Ok(LobbyCommand::RoomList(RoomList::read(&mut r)?)),
            id::MAKE_ROOM => Ok(LobbyCommand::MakeRoom(MakeRoom::read(&mut r)?)),
            id::ENTER_ROOM => Ok(LobbyCommand::EnterRoom(EnterRoom::read(&mut r)?)),
            id::LEAVE_ROOM => Ok(LobbyCommand::LeaveRoom),
            id::ENTER_RANCH => Ok(LobbyCommand::EnterRanch(EnterRanch::read(&mut r)?)),
            id::HEARTBEAT => Ok(LobbyCommand::Heartbeat),
            id::GET_MESSENGER_INFO => Ok(LobbyCommand::GetMessengerInfo),
            id::CHECK_WAITING_SEQNO => Ok(LobbyCommand::CheckWaitingSeqno),
            id::ACHIEVEMENT_COMPLETE_LIST => Ok(LobbyCommand::AchievementCompleteList(
                AchievementCompleteList::read(&mut r)?,
            )),
            id::REQUEST_LEAGUE_INFO => Ok(LobbyCommand::RequestLeagueInfo),
            id::REQUEST_DAILY_QUEST_LIST => Ok(LobbyCommand::RequestDailyQuestList),
            id::REQUEST_QUEST_LIST => Ok(LobbyCommand::RequestQuestList),
            id::REQUEST_SPECIAL_EVENT_LIST => Ok(LobbyCommand::RequestSpecialEventList(
                RequestSpecialEventList::read(&mut r)?,
            )),
            id::REQUEST_FESTIVAL_RESULT => Ok(LobbyCommand::RequestFestivalResult(
                RequestFestivalResult::read(&mut r)?,
            )),
            id::REQUEST_FESTIVAL_PRIZE => Ok(LobbyCommand::RequestFestivalPrize(
                RequestFestivalPrize::read(&mut r)?,
            )),
            id::UPDATE_SYSTEM_CONTENT => Ok(LobbyCommand::UpdateSystemContent(
                UpdateSystemContent::read(&mut r)?,
            )),
            id::QUERY_SERVER_TIME => Ok(LobbyCommand::QueryServerTime),
            other => Err(ProtoError::UnknownCommand(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_round_trips() {
        let login = Login {
            constant0: 50,
            constant1: 281,
            login_id: Bytes::from_static(b"rider"),
            member_no: 4,
            auth_key: Bytes::from_static(b"token-1"),
            val0: 0,
        };

        let mut w = Writer::new();
        login.write(&mut w);
        let mut r = Reader::new(w.into_bytes());
        assert_eq!(Login::read(&mut r).unwrap(), login);
        assert!(r.is_empty());
    }

    #[test]
    fn login_ok_round_trips() {
        let ok = LoginOk {
            lobby_time: 0x01DB_0000_1234_5678,
            uid: 7,
            name: Bytes::from_static(b"rider"),
            motd: Bytes::from_static(b"welcome, 3 players online"),
            gender: 1,
            level: 21,
            carrots: -5,
            role: 2,
            character_equipment: vec![Item {
                uid: 1,
                tid: 30008,
                val: 0,
                count: 1,
            }],
            missions: vec![Mission {
                id: 0x18,
                progress: vec![MissionProgress { id: 2, value: 1 }],
            }],
            ranch_address: u32::from(std::net::Ipv4Addr::LOCALHOST),
            ranch_port: 10031,
            scrambling_constant: 0xACE0_ACE0,
            system_content: vec![(4, 0), (16, 1)],
            val9: (1, 2, 3),
            ..Default::default()
        };

        let mut w = Writer::new();
        Clientbound::write(&ok, &mut w);
        let mut r = Reader::new(w.into_bytes());
        assert_eq!(LoginOk::read(&mut r).unwrap(), ok);
        assert!(r.is_empty());
    }

    #[test]
    fn make_room_round_trips() {
        let cmd = MakeRoom {
            name: Bytes::from_static(b"friday night derby"),
            password: Bytes::from_static(b""),
            player_count: 4,
            game_mode: 1,
            team_mode: 2,
            mission_id: 0,
            unk3: 0,
            bitset: 0,
            unk4: 2,
        };
        let mut w = Writer::new();
        cmd.write(&mut w);
        let mut r = Reader::new(w.into_bytes());
        assert_eq!(MakeRoom::read(&mut r).unwrap(), cmd);
    }

    #[test]
    fn decode_rejects_unknown_command() {
        let err = LobbyCommand::decode(0x3FF0, Bytes::new()).unwrap_err();
        assert!(matches!(err, ProtoError::UnknownCommand(0x3FF0)));
    }

    #[test]
    fn heartbeat_decodes_from_empty_payload() {
        assert!(matches!(
            LobbyCommand::decode(id::HEARTBEAT, Bytes::new()).unwrap(),
            LobbyCommand::Heartbeat
        ));
    }
}
