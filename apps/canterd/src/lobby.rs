//! The lobby director.
//!
//! Owns every per-client menu-level state and the login pipeline. All state
//! lives on one tick loop; the command server delivers connections,
//! commands, and disconnects through an event channel, and deferred work
//! goes through the director's scheduler.
//!
//! The login pipeline is two FIFO queues. A fresh login waits in the
//! request queue for its user record; once the token checks out it moves to
//! the response queue and waits for its character record. Each tick admits
//! at most one entry from each queue, which serializes the expensive store
//! interactions and gives clients a stable queue position to display.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{bail, Context as _};
use bytes::Bytes;
use canterproto::lobby::{self, LobbyCommand, LoginCancelReason};
use canterproto::shared;
use rand::RngCore;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::courses::HOT_MAPS_COURSE_ID;
use crate::datastore::{CharacterRecord, DataDirector, Uid, INVALID_UID};
use crate::infractions::InfractionList;
use crate::locale;
use crate::net::{ClientId, ServerEvent, ServerHandle};
use crate::otp::{self, OtpRegistry};
use crate::rooms::{GameMode, RoomRegistry, TeamMode};
use crate::scheduler::Scheduler;

const TICK_PERIOD: Duration = Duration::from_millis(50);

/// Client build this server speaks.
const CLIENT_VERSION_CONSTANT0: u16 = 50;
const CLIENT_VERSION_CONSTANT1: u16 = 281;

const ROOMS_PER_PAGE: usize = 8;

/// How long an enter-room reservation may sit unclaimed before the lobby
/// takes the slot back.
const ROOM_RESERVATION_GRACE: Duration = Duration::from_secs(7);

type Task = Box<dyn FnOnce(&mut LobbyDirector) + Send>;

#[derive(Debug, Default)]
struct ClientContext {
    is_authenticated: bool,
    user_name: String,
    character_uid: Uid,
    rancher_visit_preference: Uid,
}

#[derive(Debug, Default)]
struct QueuedLogin {
    user_name: String,
    user_token: String,
    user_load_requested: bool,
    character_load_requested: bool,
}

#[derive(Debug)]
struct UserInstance {
    character_uid: Uid,
    room_uid: u32,
}

pub struct LobbyDirector {
    server: ServerHandle,
    config: Arc<Config>,
    data: Arc<DataDirector>,
    otp: Arc<OtpRegistry>,
    rooms: Arc<RoomRegistry>,
    infractions: Arc<InfractionList>,
    scheduler: Scheduler<Task>,

    clients: HashMap<ClientId, ClientContext>,
    logins: HashMap<ClientId, QueuedLogin>,
    request_queue: VecDeque<ClientId>,
    response_queue: VecDeque<ClientId>,

    users: HashMap<String, UserInstance>,
    forced_into_creator: HashSet<Uid>,
}

impl LobbyDirector {
    pub fn new(
        server: ServerHandle,
        config: Arc<Config>,
        data: Arc<DataDirector>,
        otp: Arc<OtpRegistry>,
        rooms: Arc<RoomRegistry>,
        infractions: Arc<InfractionList>,
    ) -> Self {
        Self {
            server,
            config,
            data,
            otp,
            rooms,
            infractions,
            scheduler: Scheduler::new(),
            clients: HashMap::new(),
            logins: HashMap::new(),
            request_queue: VecDeque::new(),
            response_queue: VecDeque::new(),
            users: HashMap::new(),
            forced_into_creator: HashSet::new(),
        }
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ServerEvent<LobbyCommand>>) {
        let mut tick = tokio::time::interval(TICK_PERIOD);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => self.tick(),
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
    }

    fn handle_event(&mut self, event: ServerEvent<LobbyCommand>) {
        match event {
            ServerEvent::Connected(client, addr) => {
                debug!(client, peer = %addr, "client connected to the lobby");
                self.clients.insert(client, ClientContext::default());
                self.logins.insert(client, QueuedLogin::default());
            }
            ServerEvent::Command(client, command) => {
                if let Err(e) = self.dispatch(client, command) {
                    warn!(client, err = %e, "lobby handler failed, disconnecting client");
                    self.server.disconnect(client);
                }
            }
            ServerEvent::Disconnected(client) => self.handle_disconnected(client),
        }
    }

    fn dispatch(&mut self, client: ClientId, command: LobbyCommand) -> anyhow::Result<()> {
        match command {
            LobbyCommand::Login(cmd) => self.handle_login(client, cmd),
            LobbyCommand::ShowInventory => self.handle_show_inventory(client),
            LobbyCommand::CreateNickname(cmd) => self.handle_create_nickname(client, cmd),
            LobbyCommand::EnterChannel(cmd) => {
                self.server.queue_command(
                    client,
                    &lobby::EnterChannelOk {
                        unk0: cmd.channel,
                        unk1: 557,
                    },
                );
                Ok(())
            }
            LobbyCommand::LeaveChannel => {
                self.server.queue_command(client, &lobby::LeaveChannelOk);
                Ok(())
            }
            LobbyCommand::RoomList(cmd) => self.handle_room_list(client, cmd),
            LobbyCommand::MakeRoom(cmd) => self.handle_make_room(client, cmd),
            LobbyCommand::EnterRoom(cmd) => self.handle_enter_room(client, cmd),
            LobbyCommand::LeaveRoom => self.handle_leave_room(client),
            LobbyCommand::EnterRanch(cmd) => self.handle_enter_ranch(client, cmd),
            LobbyCommand::Heartbeat => Ok(()),
            LobbyCommand::GetMessengerInfo => self.handle_get_messenger_info(client),
            LobbyCommand::CheckWaitingSeqno => {
                let seqno = self.queue_position(client) as u32;
                self.server
                    .queue_command(client, &lobby::WaitingSeqnoNotify { seqno });
                Ok(())
            }
            LobbyCommand::AchievementCompleteList(cmd) => {
                self.server.queue_command(
                    client,
                    &lobby::AchievementCompleteListOk {
                        unk0: cmd.unk0,
                        achievements: Vec::new(),
                    },
                );
                Ok(())
            }
            LobbyCommand::RequestLeagueInfo => {
                self.server
                    .queue_command(client, &lobby::RequestLeagueInfoOk::default());
                Ok(())
            }
            LobbyCommand::RequestDailyQuestList => {
                self.server
                    .queue_command(client, &lobby::RequestDailyQuestListOk::default());
                Ok(())
            }
            LobbyCommand::RequestQuestList => {
                self.server
                    .queue_command(client, &lobby::RequestQuestListOk::default());
                Ok(())
            }
            LobbyCommand::RequestSpecialEventList(cmd) => {
                self.server.queue_command(
                    client,
                    &lobby::RequestSpecialEventListOk {
                        unk0: cmd.unk0,
                        events: Vec::new(),
                        unk1: 0,
                    },
                );
                Ok(())
            }
            LobbyCommand::RequestFestivalResult(cmd) => {
                self.server.queue_command(
                    client,
                    &lobby::RequestFestivalResultOk {
                        unk0: cmd.unk0,
                        unk1: 0,
                    },
                );
                Ok(())
            }
            LobbyCommand::RequestFestivalPrize(cmd) => {
                self.server.queue_command(
                    client,
                    &lobby::RequestFestivalPrizeOk {
                        unk0: cmd.unk0,
                        prizes: Vec::new(),
                    },
                );
                Ok(())
            }
            LobbyCommand::UpdateSystemContent(cmd) => {
                self.server.queue_command(
                    client,
                    &lobby::UpdateSystemContentNotify {
                        values: vec![(cmd.key, cmd.value)],
                    },
                );
                Ok(())
            }
            LobbyCommand::QueryServerTime => {
                self.server.queue_command(
                    client,
                    &lobby::QueryServerTimeOk {
                        time: win_file_time_now(),
                    },
                );
                Ok(())
            }
        }
    }

    fn tick(&mut self) {
        self.process_response_queue();
        self.process_request_queue();

        for task in self.scheduler.drain_due(Instant::now()) {
            task(self);
        }
    }

    fn context(&self, client: ClientId) -> anyhow::Result<&ClientContext> {
        let ctx = self
            .clients
            .get(&client)
            .context("lobby client is not available")?;
        if !ctx.is_authenticated {
            bail!("lobby client is not authenticated");
        }
        Ok(ctx)
    }

    fn client_by_character(&self, character_uid: Uid) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, ctx)| ctx.is_authenticated && ctx.character_uid == character_uid)
            .map(|(client, _)| *client)
    }

    /// Position estimate across both login queues.
    fn queue_position(&self, client: ClientId) -> usize {
        let mut position = 0;
        if let Some(idx) = self.response_queue.iter().position(|&c| c == client) {
            position += idx;
        }
        if let Some(idx) = self.request_queue.iter().position(|&c| c == client) {
            position += idx;
        }
        position
    }

    // -- Login pipeline ----------------------------------------------------

    fn handle_login(&mut self, client: ClientId, cmd: lobby::Login) -> anyhow::Result<()> {
        if cmd.constant0 != CLIENT_VERSION_CONSTANT0 || cmd.constant1 != CLIENT_VERSION_CONSTANT1 {
            self.reject_login(client, LoginCancelReason::InvalidVersion);
            return Ok(());
        }
        if cmd.login_id.is_empty() || cmd.auth_key.is_empty() {
            self.reject_login(client, LoginCancelReason::InvalidLoginId);
            return Ok(());
        }

        let user_name = locale::display(&cmd.login_id);
        let user_token = locale::display(&cmd.auth_key);

        // An authenticated session under this name blocks a second login
        // outright, before it ever reaches the pipeline.
        let already_online = self
            .clients
            .values()
            .any(|ctx| ctx.is_authenticated && ctx.user_name == user_name);
        if already_online {
            self.reject_login(client, LoginCancelReason::Duplicated);
            return Ok(());
        }

        let ctx = self
            .clients
            .get_mut(&client)
            .context("lobby client is not available")?;
        ctx.user_name = user_name.clone();

        let login = self
            .logins
            .get_mut(&client)
            .context("login context is not available")?;
        login.user_name = user_name;
        login.user_token = user_token;

        self.request_queue.push_back(client);
        Ok(())
    }

    /// The response queue: logins whose user record checked out, waiting
    /// for character data. At most one admission per tick.
    fn process_response_queue(&mut self) {
        while let Some(&client) = self.response_queue.front() {
            let Some(login) = self.logins.get_mut(&client) else {
                self.response_queue.pop_front();
                continue;
            };
            let user_name = login.user_name.clone();

            // A requested character load has to settle before this entry
            // can be decided.
            if login.character_load_requested && self.data.is_loading(&user_name) {
                break;
            }

            let Some(user_record) = self.data.user(&user_name) else {
                self.response_queue.pop_front();
                error!(user = %user_name, "user record vanished from the cache");
                self.reject_login(client, LoginCancelReason::Generic);
                break;
            };
            let character_uid = user_record.read(|u| u.character_uid);
            let has_character = character_uid != INVALID_UID;

            if has_character && !login.character_load_requested {
                self.data.request_load_character(&user_name, character_uid);
                login.character_load_requested = true;
                break;
            }

            self.response_queue.pop_front();

            let forced_creator = self.forced_into_creator.remove(&character_uid);
            if !has_character || forced_creator {
                debug!(user = %user_name, client, "authenticated, sent to the character creator");
                self.accept_login(client, true);
                break;
            }

            if !self.data.character_loaded(&user_name) {
                error!(user = %user_name, "character data not available");
                self.reject_login(client, LoginCancelReason::Generic);
                break;
            }

            if self.users.contains_key(&user_name) {
                self.reject_login(client, LoginCancelReason::Duplicated);
                break;
            }

            self.users.insert(
                user_name.clone(),
                UserInstance {
                    character_uid,
                    room_uid: 0,
                },
            );
            info!(user = %user_name, client, "user logged in");
            self.accept_login(client, false);
            self.logins.remove(&client);
            break;
        }
    }

    /// The request queue: fresh logins waiting for their user record. At
    /// most one verification per tick.
    fn process_request_queue(&mut self) {
        while let Some(&client) = self.request_queue.front() {
            let Some(login) = self.logins.get_mut(&client) else {
                self.request_queue.pop_front();
                continue;
            };
            let user_name = login.user_name.clone();

            if !login.user_load_requested {
                self.data.request_load_user(&user_name);
                login.user_load_requested = true;
                break;
            }

            if self.data.is_loading(&user_name) {
                break;
            }

            self.request_queue.pop_front();

            if !self.data.user_loaded(&user_name) {
                error!(user = %user_name, "user data not available");
                self.reject_login(client, LoginCancelReason::Generic);
                break;
            }

            let Some(user_record) = self.data.user(&user_name) else {
                self.reject_login(client, LoginCancelReason::Generic);
                break;
            };
            let token_matches = user_record.read(|u| u.token == login.user_token);

            if !token_matches {
                debug!(user = %user_name, "token mismatch");
                self.reject_login(client, LoginCancelReason::InvalidUser);
                break;
            }

            let verdict = self.infractions.check(&user_name);
            if verdict.prevent_joining {
                info!(user = %user_name, reason = %verdict.reason, "login blocked by infraction");
                self.reject_login(client, LoginCancelReason::DisconnectYourself);
            } else {
                self.response_queue.push_back(client);
            }
            break;
        }
    }

    fn accept_login(&mut self, client: ClientId, send_to_creator: bool) {
        let Some(ctx) = self.clients.get_mut(&client) else {
            // The client disconnected while queued; nothing to do.
            return;
        };
        ctx.is_authenticated = true;

        if send_to_creator {
            self.server
                .queue_command(client, &lobby::CreateNicknameNotify);
        } else if let Err(e) = self.send_login_ok(client) {
            warn!(client, err = %e, "failed to assemble login ok");
            self.reject_login(client, LoginCancelReason::Generic);
        }
    }

    fn reject_login(&mut self, client: ClientId, reason: LoginCancelReason) {
        self.server
            .queue_command(client, &lobby::LoginCancel { reason });
    }

    fn send_login_ok(&mut self, client: ClientId) -> anyhow::Result<()> {
        let user_name = {
            let ctx = self
                .clients
                .get(&client)
                .context("lobby client is not available")?;
            ctx.user_name.clone()
        };

        let user_record = self
            .data
            .user(&user_name)
            .context("user record unavailable")?;
        let character_uid = user_record.read(|u| u.character_uid);

        let character_record = self
            .data
            .character(character_uid)
            .context("character record unavailable")?;

        if let Some(ctx) = self.clients.get_mut(&client) {
            ctx.character_uid = character_uid;
        }

        let motd = render_notice(&self.config.notice, self.users.len());

        let mut response = lobby::LoginOk {
            lobby_time: win_file_time_now(),
            motd: Bytes::from(motd.into_bytes()),
            ranch_address: self.config.ranch_advert.wire_address(),
            ranch_port: self.config.ranch_advert.port,
            missions: default_missions(),
            ..lobby::LoginOk::default()
        };

        character_record.read(|character| {
            response.uid = character.uid;
            response.name = Bytes::from(character.name.clone().into_bytes());
            response.gender = character.gender;
            response.introduction = Bytes::from(character.introduction.clone().into_bytes());
            response.level = character.level;
            response.carrots = character.carrots;
            response.role = character.role;
            response.character = shared::Character {
                uid: character.uid,
                name: Bytes::from(character.name.clone().into_bytes()),
                gender: character.gender,
                level: character.level,
                parts: shared::CharacterParts {
                    char_id: character.char_id,
                    mouth_serial_id: character.mouth_serial_id,
                    face_serial_id: character.face_serial_id,
                    val0: 0,
                },
                appearance: shared::CharacterAppearance::default(),
            };
        });

        let mount_uid = character_record.read(|c| c.mount_uid);
        if let Some(horse_record) = self.data.horse(mount_uid) {
            horse_record.read(|horse| {
                response.horse = shared::Horse {
                    uid: horse.uid,
                    tid: horse.tid,
                    name: Bytes::from(horse.name.clone().into_bytes()),
                    ..shared::Horse::default()
                };
            });
        }

        // Roll a fresh scrambling constant; the client re-arms its XOR key
        // with it, and so do we once the acknowledgement is on the queue.
        let scrambling_constant = rand::rngs::OsRng.next_u32();
        response.scrambling_constant = scrambling_constant;

        self.server.queue_command(client, &response);
        self.server.set_code(client, scrambling_constant);
        Ok(())
    }

    fn handle_disconnected(&mut self, client: ClientId) {
        if let Some(ctx) = self.clients.get(&client) {
            if ctx.is_authenticated {
                info!(user = %ctx.user_name, client, "user logged out");
                self.users.remove(&ctx.user_name);
            }
        }

        self.request_queue.retain(|&c| c != client);
        self.response_queue.retain(|&c| c != client);
        self.logins.remove(&client);
        self.clients.remove(&client);
    }

    // -- Character creation ------------------------------------------------

    fn handle_create_nickname(
        &mut self,
        client: ClientId,
        cmd: lobby::CreateNickname,
    ) -> anyhow::Result<()> {
        let ctx = self.context(client)?;
        let user_name = ctx.user_name.clone();

        if !locale::is_name_valid(&cmd.nickname, locale::MAX_NAME_BYTES) {
            self.server
                .queue_command(client, &lobby::CreateNicknameCancel { error: 1 });
            return Ok(());
        }

        let template = CharacterRecord {
            name: locale::display(&cmd.nickname),
            level: 1,
            carrots: 5000,
            char_id: cmd.char_id,
            mouth_serial_id: cmd.mouth_serial_id,
            face_serial_id: cmd.face_serial_id,
            ..CharacterRecord::default()
        };

        let Some(record) = self.data.create_character(&user_name, template) else {
            bail!("character creation failed for user '{user_name}'");
        };
        let character_uid = record.read(|c| c.uid);
        info!(user = %user_name, character = character_uid, "character created");

        self.users
            .entry(user_name)
            .or_insert_with(|| UserInstance {
                character_uid,
                room_uid: 0,
            })
            .character_uid = character_uid;

        self.send_login_ok(client)
    }

    // -- Rooms -------------------------------------------------------------

    fn handle_room_list(&mut self, client: ClientId, cmd: lobby::RoomList) -> anyhow::Result<()> {
        self.context(client)?;

        let mut response = lobby::RoomListOk {
            page: cmd.page,
            game_mode: cmd.game_mode,
            team_mode: cmd.team_mode,
            rooms: Vec::new(),
            unk3: (0, Bytes::new(), 0),
        };

        let snapshots = self.rooms.rooms_snapshot();
        let pages = snapshots.chunks(ROOMS_PER_PAGE).collect::<Vec<_>>();
        if !pages.is_empty() {
            let page_index = (cmd.page as usize).min(pages.len() - 1);
            for room in pages[page_index] {
                if room.details.game_mode.to_wire() != cmd.game_mode
                    || room.details.team_mode.to_wire() != cmd.team_mode
                {
                    continue;
                }

                response.rooms.push(lobby::RoomListEntry {
                    uid: room.uid,
                    name: Bytes::from(room.details.name.clone()),
                    player_count: room.player_count as u8,
                    max_player_count: room.details.max_player_count as u8,
                    is_locked: u8::from(!room.details.password.is_empty()),
                    map: room.details.course_id,
                    has_started: u8::from(room.is_playing),
                    skill_bracket: room.details.skill_bracket,
                    ..lobby::RoomListEntry::default()
                });
            }
        }

        self.server.queue_command(client, &response);
        Ok(())
    }

    fn handle_make_room(&mut self, client: ClientId, cmd: lobby::MakeRoom) -> anyhow::Result<()> {
        let ctx = self.context(client)?;
        let character_uid = ctx.character_uid;

        // Only training rooms may go unnamed.
        let is_training = cmd.player_count == 1;
        if cmd.name.is_empty() && !is_training {
            self.server
                .queue_command(client, &lobby::MakeRoomCancel { unk0: 0 });
            return Ok(());
        }

        let game_mode = match cmd.game_mode {
            1 => GameMode::Speed,
            2 => GameMode::Magic,
            6 => GameMode::Tutorial,
            other => {
                error!(mode = other, "unknown game mode on make room");
                GameMode::Speed
            }
        };
        let team_mode = match cmd.team_mode {
            1 => TeamMode::Ffa,
            2 => TeamMode::Team,
            3 => TeamMode::Single,
            other => {
                error!(mode = other, "unknown team mode on make room");
                TeamMode::Ffa
            }
        };

        let room_uid = self.rooms.create_room(|room| {
            let details = room.details_mut();
            details.name = cmd.name.to_vec();
            details.password = cmd.password.to_vec();
            details.mission_id = cmd.mission_id;
            details.max_player_count = u32::from(cmd.player_count.min(8));
            details.game_mode = game_mode;
            details.team_mode = team_mode;
            details.npc_race = cmd.unk3;
            details.skill_bracket = cmd.unk4;
            // Until the master picks a course, the room plays the hot pool.
            details.course_id = HOT_MAPS_COURSE_ID;

            room.queue_player(character_uid);
            room.uid()
        });

        let code = self.otp.grant(otp::room_identity(character_uid, room_uid));
        info!(character = character_uid, room = room_uid, "room created");

        self.server.queue_command(
            client,
            &lobby::MakeRoomOk {
                room_uid,
                one_time_password: code,
                race_address: self.config.race_advert.wire_address(),
                race_port: self.config.race_advert.port,
                unk2: 0,
            },
        );
        Ok(())
    }

    fn handle_enter_room(&mut self, client: ClientId, cmd: lobby::EnterRoom) -> anyhow::Result<()> {
        let ctx = self.context(client)?;
        let character_uid = ctx.character_uid;
        let user_name = ctx.user_name.clone();

        let mut is_authorized = false;
        let mut is_room_full = false;
        let checked = self.rooms.get_room(cmd.room_uid, |room| {
            let password = &room.details().password;
            is_authorized = password.is_empty() || password[..] == cmd.password[..];

            is_room_full = room.is_full();
            if is_authorized && !is_room_full {
                room.queue_player(character_uid);
            }
        });

        let status = if checked.is_none() {
            Some(lobby::EnterRoomCancelStatus::InvalidRoom)
        } else if !is_authorized {
            Some(lobby::EnterRoomCancelStatus::BadPassword)
        } else if is_room_full {
            Some(lobby::EnterRoomCancelStatus::CrowdedRoom)
        } else {
            None
        };

        if let Some(status) = status {
            self.server
                .queue_command(client, &lobby::EnterRoomCancel { status });
            return Ok(());
        }

        let room_uid = cmd.room_uid;
        let code = self.otp.grant(otp::room_identity(character_uid, room_uid));

        self.server.queue_command(
            client,
            &lobby::EnterRoomOk {
                room_uid,
                one_time_password: code,
                race_address: self.config.race_advert.wire_address(),
                race_port: self.config.race_advert.port,
                member6: 0,
            },
        );

        // After the grace period: either the player claimed the slot on the
        // race tier (the reservation is gone) and we record their room, or
        // the reservation expires and frees the slot.
        self.scheduler.queue(
            Box::new(move |director: &mut LobbyDirector| {
                let mut entered = false;
                director.rooms.get_room(room_uid, |room| {
                    entered = !room.dequeue_player(character_uid);
                });
                if entered {
                    if let Some(user) = director.users.get_mut(&user_name) {
                        user.room_uid = room_uid;
                    }
                }
            }),
            Instant::now() + ROOM_RESERVATION_GRACE,
        );
        Ok(())
    }

    fn handle_leave_room(&mut self, client: ClientId) -> anyhow::Result<()> {
        let ctx = self.context(client)?;
        let user_name = ctx.user_name.clone();
        if let Some(user) = self.users.get_mut(&user_name) {
            user.room_uid = 0;
        }
        Ok(())
    }

    // -- Cross-tier handoff ------------------------------------------------

    fn handle_enter_ranch(&mut self, client: ClientId, cmd: lobby::EnterRanch) -> anyhow::Result<()> {
        let ctx = self.context(client)?;
        let character_uid = ctx.character_uid;

        let rancher_uid = if cmd.ranch_uid != INVALID_UID {
            cmd.ranch_uid
        } else if ctx.rancher_visit_preference != INVALID_UID {
            ctx.rancher_visit_preference
        } else {
            character_uid
        };

        let code = self.otp.grant(otp::character_identity(character_uid));
        self.server.queue_command(
            client,
            &lobby::EnterRanchOk {
                ranch_uid: rancher_uid,
                code,
                ranch_address: self.config.ranch_advert.wire_address(),
                ranch_port: self.config.ranch_advert.port,
            },
        );
        Ok(())
    }

    fn handle_get_messenger_info(&mut self, client: ClientId) -> anyhow::Result<()> {
        let ctx = self.context(client)?;
        let code = self.otp.grant(otp::character_identity(ctx.character_uid));

        self.server.queue_command(
            client,
            &lobby::GetMessengerInfoOk {
                code,
                messenger_address: self.config.messenger_advert.wire_address(),
                messenger_port: self.config.messenger_advert.port,
            },
        );
        Ok(())
    }

    // -- Misc --------------------------------------------------------------

    fn handle_show_inventory(&mut self, client: ClientId) -> anyhow::Result<()> {
        let ctx = self.context(client)?;
        let character_uid = ctx.character_uid;

        let mut response = lobby::ShowInventoryOk::default();
        if let Some(character) = self.data.character(character_uid) {
            let mount_uid = character.read(|c| c.mount_uid);
            if let Some(horse) = self.data.horse(mount_uid) {
                horse.read(|h| {
                    response.horses.push(shared::Horse {
                        uid: h.uid,
                        tid: h.tid,
                        name: Bytes::from(h.name.clone().into_bytes()),
                        ..shared::Horse::default()
                    });
                });
            }
        }

        self.server.queue_command(client, &response);
        Ok(())
    }

    /// Marks a character so their next login lands in the creator again.
    pub fn set_character_forced_into_creator(&mut self, character_uid: Uid, forced: bool) {
        if forced {
            self.forced_into_creator.insert(character_uid);
        } else {
            self.forced_into_creator.remove(&character_uid);
        }
    }

    /// Remembers which rancher this character wants to visit by default.
    pub fn set_character_visit_preference(&mut self, character_uid: Uid, rancher_uid: Uid) {
        if let Some(client) = self.client_by_character(character_uid) {
            if let Some(ctx) = self.clients.get_mut(&client) {
                ctx.rancher_visit_preference = rancher_uid;
            }
        }
    }
}

/// Substitute the online-count placeholder into the operator notice.
fn render_notice(notice: &str, players_online: usize) -> String {
    notice.replace("{players_online}", &players_online.to_string())
}

/// Windows file time: 100 ns intervals since 1601-01-01.
fn win_file_time_now() -> u64 {
    const UNIX_TO_FILETIME_OFFSET: u64 = 116_444_736_000_000_000;
    let unix = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    UNIX_TO_FILETIME_OFFSET + unix.as_nanos() as u64 / 100
}

fn default_missions() -> Vec<lobby::Mission> {
    [0x18u16, 0x1F, 0x23, 0x29, 0x2A, 0x2B, 0x2C, 0x2D]
        .into_iter()
        .map(|mission_id| lobby::Mission {
            id: mission_id,
            progress: vec![lobby::MissionProgress { id: 2, value: 1 }],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_substitutes_player_count() {
        assert_eq!(
            render_notice("welcome! {players_online} riders online", 3),
            "welcome! 3 riders online"
        );
        assert_eq!(render_notice("plain notice", 9), "plain notice");
    }

    #[test]
    fn file_time_is_past_2020() {
        // 2020-01-01 in Windows file time.
        assert!(win_file_time_now() > 132_223_104_000_000_000);
    }

    #[test]
    fn default_missions_are_complete() {
        let missions = default_missions();
        assert_eq!(missions.len(), 8);
        assert!(missions.iter().all(|m| m.progress.len() == 1));
    }
}
