//! The command id table.
//!
//! Ids are opaque constants from the protocol table the client was built
//! against; nothing is derived from their numeric values. Lobby-tier
//! commands live in the low block, race-tier commands in the 0x04xx block.

use crate::CommandId;

// Lobby tier.
pub const LOGIN: CommandId = 0x0001;
pub const LOGIN_OK: CommandId = 0x0002;
pub const LOGIN_CANCEL: CommandId = 0x0003;
pub const SHOW_INVENTORY: CommandId = 0x0007;
pub const SHOW_INVENTORY_OK: CommandId = 0x0008;
pub const CREATE_NICKNAME_NOTIFY: CommandId = 0x000A;
pub const CREATE_NICKNAME: CommandId = 0x000B;
pub const CREATE_NICKNAME_CANCEL: CommandId = 0x000C;
pub const ENTER_CHANNEL: CommandId = 0x000F;
pub const ENTER_CHANNEL_OK: CommandId = 0x0010;
pub const LEAVE_CHANNEL: CommandId = 0x0011;
pub const LEAVE_CHANNEL_OK: CommandId = 0x0012;
pub const ROOM_LIST: CommandId = 0x0013;
pub const ROOM_LIST_OK: CommandId = 0x0014;
pub const MAKE_ROOM: CommandId = 0x0015;
pub const MAKE_ROOM_OK: CommandId = 0x0016;
pub const MAKE_ROOM_CANCEL: CommandId = 0x0017;
pub const ENTER_ROOM: CommandId = 0x0018;
pub const ENTER_ROOM_OK: CommandId = 0x0019;
pub const ENTER_ROOM_CANCEL: CommandId = 0x001A;
pub const LEAVE_ROOM: CommandId = 0x001B;
pub const ENTER_RANCH: CommandId = 0x001C;
pub const ENTER_RANCH_OK: CommandId = 0x001D;
pub const ENTER_RANCH_CANCEL: CommandId = 0x001E;
pub const HEARTBEAT: CommandId = 0x001F;
pub const GET_MESSENGER_INFO: CommandId = 0x0020;
pub const GET_MESSENGER_INFO_OK: CommandId = 0x0021;
pub const CHECK_WAITING_SEQNO: CommandId = 0x0022;
pub const WAITING_SEQNO_NOTIFY: CommandId = 0x0023;
pub const ACHIEVEMENT_COMPLETE_LIST: CommandId = 0x0024;
pub const ACHIEVEMENT_COMPLETE_LIST_OK: CommandId = 0x0025;
pub const REQUEST_LEAGUE_INFO: CommandId = 0x0026;
pub const REQUEST_LEAGUE_INFO_OK: CommandId = 0x0027;
pub const REQUEST_DAILY_QUEST_LIST: CommandId = 0x0028;
pub const REQUEST_DAILY_QUEST_LIST_OK: CommandId = 0x0029;
pub const REQUEST_QUEST_LIST: CommandId = 0x002A;
pub const REQUEST_QUEST_LIST_OK: CommandId = 0x002B;
pub const REQUEST_SPECIAL_EVENT_LIST: CommandId = 0x002C;
pub const REQUEST_SPECIAL_EVENT_LIST_OK: CommandId = 0x002D;
pub const REQUEST_FESTIVAL_RESULT: CommandId = 0x002E;
pub const REQUEST_FESTIVAL_RESULT_OK: CommandId = 0x002F;
pub const REQUEST_FESTIVAL_PRIZE: CommandId = 0x0030;
pub const REQUEST_FESTIVAL_PRIZE_OK: CommandId = 0x0031;
pub const UPDATE_SYSTEM_CONTENT: CommandId = 0x0032;
pub const UPDATE_SYSTEM_CONTENT_NOTIFY: CommandId = 0x0033;
pub const QUERY_SERVER_TIME: CommandId = 0x0034;
pub const QUERY_SERVER_TIME_OK: CommandId = 0x0035;
pub const NOTICE: CommandId = 0x0036;

// Race tier.
pub const RACE_ENTER_ROOM: CommandId = 0x0401;
pub const RACE_ENTER_ROOM_OK: CommandId = 0x0402;
pub const RACE_ENTER_ROOM_CANCEL: CommandId = 0x0403;
pub const RACE_ENTER_ROOM_NOTIFY: CommandId = 0x0404;
pub const CHANGE_ROOM_OPTIONS: CommandId = 0x0405;
pub const CHANGE_ROOM_OPTIONS_NOTIFY: CommandId = 0x0406;
pub const CHANGE_TEAM: CommandId = 0x0407;
pub const CHANGE_TEAM_OK: CommandId = 0x0408;
pub const CHANGE_TEAM_NOTIFY: CommandId = 0x0409;
pub const RACE_LEAVE_ROOM: CommandId = 0x040A;
pub const RACE_LEAVE_ROOM_OK: CommandId = 0x040B;
pub const RACE_LEAVE_ROOM_NOTIFY: CommandId = 0x040C;
pub const CHANGE_MASTER_NOTIFY: CommandId = 0x040D;
pub const READY_RACE: CommandId = 0x040E;
pub const READY_RACE_NOTIFY: CommandId = 0x040F;
pub const START_RACE: CommandId = 0x0410;
pub const ROOM_COUNTDOWN: CommandId = 0x0411;
pub const START_RACE_NOTIFY: CommandId = 0x0412;
pub const RACE_TIMER: CommandId = 0x0413;
pub const RACE_TIMER_OK: CommandId = 0x0414;
pub const LOADING_COMPLETE: CommandId = 0x0415;
pub const LOADING_COMPLETE_NOTIFY: CommandId = 0x0416;
pub const USER_RACE_COUNTDOWN: CommandId = 0x0417;
pub const USER_RACE_UPDATE_POS: CommandId = 0x0418;
pub const USER_RACE_FINAL: CommandId = 0x0419;
pub const USER_RACE_FINAL_NOTIFY: CommandId = 0x041A;
pub const RACE_RESULT_NOTIFY: CommandId = 0x041B;
pub const RACE_RESULT: CommandId = 0x041C;
pub const RACE_RESULT_OK: CommandId = 0x041D;
pub const STAR_POINT_GET: CommandId = 0x041E;
pub const STAR_POINT_GET_OK: CommandId = 0x041F;
pub const REQUEST_SPUR: CommandId = 0x0420;
pub const REQUEST_SPUR_OK: CommandId = 0x0421;
pub const HURDLE_CLEAR_RESULT: CommandId = 0x0422;
pub const HURDLE_CLEAR_RESULT_OK: CommandId = 0x0423;
pub const STARTING_RATE: CommandId = 0x0424;
pub const USER_RACE_ITEM_GET: CommandId = 0x0425;
pub const RACE_ITEM_SPAWN: CommandId = 0x0426;
pub const RACE_ITEM_GET: CommandId = 0x0427;
pub const REQUEST_MAGIC_ITEM: CommandId = 0x0428;
pub const REQUEST_MAGIC_ITEM_OK: CommandId = 0x0429;
pub const REQUEST_MAGIC_ITEM_NOTIFY: CommandId = 0x042A;
pub const USE_MAGIC_ITEM: CommandId = 0x042B;
pub const USE_MAGIC_ITEM_OK: CommandId = 0x042C;
pub const USE_MAGIC_ITEM_NOTIFY: CommandId = 0x042D;
pub const START_MAGIC_TARGET: CommandId = 0x042E;
pub const CHANGE_MAGIC_TARGET_NOTIFY: CommandId = 0x042F;
pub const CHANGE_MAGIC_TARGET_OK: CommandId = 0x0430;
pub const CHANGE_MAGIC_TARGET_CANCEL: CommandId = 0x0431;
pub const REMOVE_MAGIC_TARGET: CommandId = 0x0432;
pub const CHAT: CommandId = 0x0433;
pub const CHAT_NOTIFY: CommandId = 0x0434;
pub const RELAY_COMMAND: CommandId = 0x0435;
pub const RELAY_COMMAND_NOTIFY: CommandId = 0x0436;
pub const RELAY: CommandId = 0x0437;
pub const RELAY_NOTIFY: CommandId = 0x0438;
pub const AWARD_START: CommandId = 0x0439;
pub const AWARD_END: CommandId = 0x043A;
pub const AWARD_NOTIFY: CommandId = 0x043B;
pub const P2P_RESULT: CommandId = 0x043C;
pub const RACE_P2P_RESULT: CommandId = 0x043D;
pub const CHANGE_SKILL_CARD_PRESET: CommandId = 0x043E;
