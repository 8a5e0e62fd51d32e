//! The race director.
//!
//! One race instance per room that made it to the race tier. Entry is
//! authorized by the one-time password the lobby minted against the
//! character and room. The instance walks Waiting -> Loading -> Racing ->
//! Finishing on the tick loop; stage timeouts are the only liveness
//! guarantee, so no client can stall a race by never loading or never
//! crossing the line.
//!
//! All mutation is tick-serialized: handlers run on the director task and
//! deferred work (start notifies, item respawns) goes through the
//! scheduler. A handler returning an error disconnects the client; an oid
//! mismatch or an impossible gauge spend is treated as desync or cheating
//! and handled the same way.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context as _};
use bytes::Bytes;
use canterproto::race::{self, HurdleClearType, RaceCommand};
use canterproto::lobby::EnterRoomCancelStatus;
use canterproto::Clientbound;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::courses::{CourseRegistry, DECK_GOLD_HORSESHOE, DECK_SILVER_HORSESHOE};
use crate::datastore::{DataDirector, Uid, INVALID_UID};
use crate::net::{ClientId, ServerEvent, ServerHandle};
use crate::otp::{self, OtpRegistry};
use crate::rooms::{GameMode, PlayerTeam, RoomRegistry, TeamMode};
use crate::scheduler::Scheduler;
use crate::tracker::{RaceTracker, Racer, RacerState, RacerTeam, INVALID_OID};

const TICK_PERIOD: Duration = Duration::from_millis(50);

const ROOM_COUNTDOWN: Duration = Duration::from_millis(3000);
const ITEM_RESPAWN_DELAY: Duration = Duration::from_millis(500);

/// Distance under which a respawnable deck item appears for a racer.
const ITEM_SPAWN_DISTANCE: f64 = 90.0;

/// Gauge regeneration per position update while racing empty-handed in
/// magic mode. Tuned by eye, not a protocol contract.
const NO_ITEM_HELD_BOOST: u32 = 2000;

const MAGIC_ITEMS: [u32; 3] = [
    race::MAGIC_ITEM_BOLT,
    race::MAGIC_ITEM_SHIELD,
    race::MAGIC_ITEM_ICE_WALL,
];

/// Bolt strike timing sent with the hit notification.
const BOLT_CAST_DELAY: f32 = 1.0;
const BOLT_DOWN_DURATION: f32 = 3.0;

const BONUS_SKILLS_COMMON: &[u32] = &[43, 29, 30];
const BONUS_SKILLS_SPEED: &[u32] = &[59, 32, 31];
const BONUS_SKILLS_MAGIC: &[u32] = &[34, 35, 36, 57, 58];

type Task = Box<dyn FnOnce(&mut RaceDirector) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Waiting,
    Loading,
    Racing,
    Finishing,
}

#[derive(Debug, Default)]
struct ClientContext {
    is_authenticated: bool,
    character_uid: Uid,
    room_uid: u32,
}

struct RaceInstance {
    stage: Stage,
    stage_timeout: Instant,
    master_uid: Uid,
    tracker: RaceTracker,
    game_mode: GameMode,
    team_mode: TeamMode,
    map_block_id: u16,
    mission_id: u16,
    race_start_at: Instant,
    clients: HashSet<ClientId>,
}

impl RaceInstance {
    fn new() -> Self {
        Self {
            stage: Stage::Waiting,
            stage_timeout: Instant::now(),
            master_uid: INVALID_UID,
            tracker: RaceTracker::new(),
            game_mode: GameMode::Speed,
            team_mode: TeamMode::Ffa,
            map_block_id: 0,
            mission_id: 0,
            race_start_at: Instant::now(),
            clients: HashSet::new(),
        }
    }
}

pub struct RaceDirector {
    server: ServerHandle,
    config: Arc<Config>,
    data: Arc<DataDirector>,
    otp: Arc<OtpRegistry>,
    rooms: Arc<RoomRegistry>,
    courses: CourseRegistry,
    scheduler: Scheduler<Task>,

    clients: HashMap<ClientId, ClientContext>,
    races: HashMap<u32, RaceInstance>,

    /// Epoch of the race clock clients sync against.
    clock_epoch: Instant,
}

fn broadcast<C: Clientbound>(server: &ServerHandle, clients: &HashSet<ClientId>, message: &C) {
    for &client in clients {
        server.queue_command(client, message);
    }
}

fn broadcast_except<C: Clientbound>(
    server: &ServerHandle,
    clients: &HashSet<ClientId>,
    except: ClientId,
    message: &C,
) {
    for &client in clients {
        if client != except {
            server.queue_command(client, message);
        }
    }
}

fn race_clock(epoch: Instant, at: Instant) -> u64 {
    // The race clock counts 100 ns intervals.
    (at.saturating_duration_since(epoch).as_nanos() / 100) as u64
}

fn racer_of(race: &mut RaceInstance, character_uid: Uid) -> anyhow::Result<&mut Racer> {
    race.tracker
        .racer(character_uid)
        .context("character is not a racer in this race")
}

fn character_name(data: &DataDirector, character_uid: Uid) -> Bytes {
    data.character(character_uid)
        .map(|record| record.read(|c| Bytes::from(c.name.clone().into_bytes())))
        .unwrap_or_default()
}

fn team_color(team: RacerTeam) -> u8 {
    match team {
        RacerTeam::Solo => 0,
        RacerTeam::Red => 1,
        RacerTeam::Blue => 2,
    }
}

/// Scoreboard rows ordered by course time, disconnected racers last.
fn build_scoreboard(tracker: &RaceTracker) -> Vec<(Uid, u32, bool)> {
    let mut rows: Vec<(Uid, u32, bool)> = tracker
        .racers()
        .map(|(&uid, racer)| {
            let connected = racer.state != RacerState::Disconnected;
            let course_time = if connected { racer.course_time } else { u32::MAX };
            (uid, course_time, connected)
        })
        .collect();
    rows.sort_by_key(|&(_, course_time, _)| course_time);
    rows
}

impl RaceDirector {
    pub fn new(
        server: ServerHandle,
        config: Arc<Config>,
        data: Arc<DataDirector>,
        otp: Arc<OtpRegistry>,
        rooms: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            server,
            config,
            data,
            otp,
            rooms,
            courses: CourseRegistry::new(),
            scheduler: Scheduler::new(),
            clients: HashMap::new(),
            races: HashMap::new(),
            clock_epoch: Instant::now(),
        }
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ServerEvent<RaceCommand>>) {
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

    fn handle_event(&mut self, event: ServerEvent<RaceCommand>) {
        match event {
            ServerEvent::Connected(client, addr) => {
                debug!(client, peer = %addr, "client connected to the race server");
                self.clients.insert(client, ClientContext::default());
            }
            ServerEvent::Command(client, command) => {
                if let Err(e) = self.dispatch(client, command) {
                    warn!(client, err = %e, "race handler failed, disconnecting client");
                    self.server.disconnect(client);
                }
            }
            ServerEvent::Disconnected(client) => {
                let authenticated_in_room = self
                    .clients
                    .get(&client)
                    .map(|ctx| ctx.is_authenticated && self.races.contains_key(&ctx.room_uid))
                    .unwrap_or(false);
                if authenticated_in_room {
                    if let Err(e) = self.handle_leave_room(client) {
                        debug!(client, err = %e, "leave on disconnect failed");
                    }
                }
                info!(client, "client disconnected from the race server");
                self.clients.remove(&client);
            }
        }
    }

    fn dispatch(&mut self, client: ClientId, command: RaceCommand) -> anyhow::Result<()> {
        match command {
            RaceCommand::EnterRoom(cmd) => self.handle_enter_room(client, cmd),
            RaceCommand::ChangeRoomOptions(cmd) => self.handle_change_room_options(client, cmd),
            RaceCommand::ChangeTeam(cmd) => self.handle_change_team(client, cmd),
            RaceCommand::LeaveRoom => self.handle_leave_room(client),
            RaceCommand::ReadyRace => self.handle_ready_race(client),
            RaceCommand::StartRace(_) => self.handle_start_race(client),
            RaceCommand::RaceTimer(cmd) => {
                self.server.queue_command(
                    client,
                    &race::RaceTimerOk {
                        client_race_clock: cmd.client_clock,
                        server_race_clock: race_clock(self.clock_epoch, Instant::now()),
                    },
                );
                Ok(())
            }
            RaceCommand::LoadingComplete => self.handle_loading_complete(client),
            RaceCommand::UserRaceUpdatePos(cmd) => self.handle_update_pos(client, cmd),
            RaceCommand::UserRaceFinal(cmd) => self.handle_race_final(client, cmd),
            RaceCommand::UserRaceItemGet(cmd) => self.handle_item_get(client, cmd),
            RaceCommand::StarPointGet(cmd) => self.handle_star_point_get(client, cmd),
            RaceCommand::RequestSpur(cmd) => self.handle_request_spur(client, cmd),
            RaceCommand::HurdleClearResult(cmd) => self.handle_hurdle_clear(client, cmd),
            RaceCommand::StartingRate(cmd) => self.handle_starting_rate(client, cmd),
            RaceCommand::RequestMagicItem(cmd) => self.handle_request_magic_item(client, cmd),
            RaceCommand::UseMagicItem(cmd) => self.handle_use_magic_item(client, cmd),
            RaceCommand::StartMagicTarget(cmd) => self.handle_start_magic_target(client, cmd),
            RaceCommand::ChangeMagicTargetNotify(cmd) => {
                self.handle_change_magic_target(client, cmd)
            }
            RaceCommand::ChangeMagicTargetOk(cmd) => self.handle_magic_target_ok(client, cmd),
            RaceCommand::ChangeMagicTargetCancel(cmd) => {
                self.handle_magic_target_cancel(client, cmd)
            }
            RaceCommand::Chat(cmd) => self.handle_chat(client, cmd),
            RaceCommand::RelayCommand(cmd) => self.handle_relay_command(client, cmd),
            RaceCommand::Relay(cmd) => self.handle_relay(client, cmd),
            RaceCommand::AwardStart(cmd) => self.handle_award_start(client, cmd),
            RaceCommand::AwardEnd => Ok(()),
            RaceCommand::RaceResult => self.handle_race_result(client),
            RaceCommand::P2PResult => self.handle_p2p_result(client),
            RaceCommand::ChangeSkillCardPreset(cmd) => self.handle_skill_preset(client, cmd),
        }
    }

    fn tick(&mut self) {
        let due = self.scheduler.drain_due(Instant::now());
        for task in due {
            task(self);
        }

        self.advance_loading_races();
        self.advance_racing_races();
        self.advance_finishing_races();
    }

    fn context(&self, client: ClientId) -> anyhow::Result<(Uid, u32)> {
        let ctx = self
            .clients
            .get(&client)
            .context("race client is not available")?;
        if !ctx.is_authenticated {
            bail!("race client is not authenticated");
        }
        Ok((ctx.character_uid, ctx.room_uid))
    }

    // -- Stage machine -----------------------------------------------------

    fn advance_loading_races(&mut self) {
        let now = Instant::now();

        for (&room_uid, race) in self.races.iter_mut() {
            if race.stage != Stage::Loading {
                continue;
            }

            let all_loaded = race.tracker.racers().all(|(_, racer)| {
                racer.state == RacerState::Racing || racer.state == RacerState::Disconnected
            });
            let load_timeout = now >= race.stage_timeout;

            if !all_loaded && !load_timeout {
                continue;
            }
            if load_timeout {
                warn!(room = room_uid, "room reached the loading timeout");
            }

            // Stragglers are considered disconnected for this race.
            for (_, racer) in race.tracker.racers_mut() {
                if racer.state != RacerState::Racing {
                    racer.state = RacerState::Disconnected;
                }
            }

            let (time_limit, wait_time) = match self.courses.map_block(race.map_block_id) {
                Some(map) => (map.time_limit, map.wait_time),
                None => (180, 3),
            };

            race.stage = Stage::Racing;
            race.stage_timeout = now + Duration::from_secs(time_limit);
            race.race_start_at = now + Duration::from_secs(wait_time);

            let countdown = race::UserRaceCountdown {
                race_start_timestamp: race_clock(self.clock_epoch, race.race_start_at),
            };
            broadcast(&self.server, &race.clients, &countdown);
        }
    }

    fn advance_racing_races(&mut self) {
        let now = Instant::now();

        for (&room_uid, race) in self.races.iter_mut() {
            if race.stage != Stage::Racing {
                continue;
            }

            let race_timeout = now >= race.stage_timeout;
            let any_finishing = race
                .tracker
                .racers()
                .any(|(_, racer)| racer.state == RacerState::Finishing);

            if !any_finishing && !race_timeout {
                continue;
            }

            race.stage = Stage::Finishing;
            race.stage_timeout = now + self.config.finish_timeout;

            if race_timeout {
                debug!(room = room_uid, "race timeout, forcing the finale");
                // Make every participant commit its result.
                let notify = race::UserRaceFinalNotify::default();
                for &race_client in &race.clients {
                    let is_participant = self
                        .clients
                        .get(&race_client)
                        .map(|ctx| race.tracker.is_racer(ctx.character_uid))
                        .unwrap_or(false);
                    if is_participant {
                        self.server.queue_command(race_client, &notify);
                    }
                }
            }
        }
    }

    fn advance_finishing_races(&mut self) {
        let now = Instant::now();

        for (&room_uid, race) in self.races.iter_mut() {
            if race.stage != Stage::Finishing {
                continue;
            }

            let all_finished = race.tracker.racers().all(|(_, racer)| {
                racer.state == RacerState::Finishing || racer.state == RacerState::Disconnected
            });
            let finish_timeout = now >= race.stage_timeout;

            if !all_finished && !finish_timeout {
                continue;
            }
            if finish_timeout {
                warn!(room = room_uid, "room reached the finishing timeout");
            }

            let mut result = race::RaceResultNotify::default();
            for (uid, course_time, connected) in build_scoreboard(&race.tracker) {
                let mut score = race::ScoreInfo {
                    uid,
                    course_time,
                    bitset: if connected { race::score_bits::CONNECTED } else { 0 },
                    ..race::ScoreInfo::default()
                };

                if let Some(record) = self.data.character(uid) {
                    record.read(|character| {
                        score.name = Bytes::from(character.name.clone().into_bytes());
                        score.level = character.level;
                    });
                    let mount_uid = record.read(|c| c.mount_uid);
                    if let Some(horse) = self.data.horse(mount_uid) {
                        score.mount_name = horse.read(|h| Bytes::from(h.name.clone().into_bytes()));
                    }
                }
                result.scores.push(score);
            }

            broadcast(&self.server, &race.clients, &result);

            race.stage = Stage::Waiting;
            self.rooms.get_room(room_uid, |room| room.set_playing(false));
        }
    }

    // -- Room membership ---------------------------------------------------

    fn handle_enter_room(&mut self, client: ClientId, cmd: race::EnterRoom) -> anyhow::Result<()> {
        let authorized = self.otp.authorize(
            otp::room_identity(cmd.character_uid, cmd.room_uid),
            cmd.one_time_password,
        );
        let room_exists = self.rooms.room_exists(cmd.room_uid);

        let mut overcrowded = false;
        if authorized && room_exists {
            self.rooms.get_room(cmd.room_uid, |room| {
                overcrowded = !room.add_player(cmd.character_uid);
            });
        }

        let status = if !authorized {
            Some(EnterRoomCancelStatus::AuthError)
        } else if !room_exists {
            Some(EnterRoomCancelStatus::InvalidRoom)
        } else if overcrowded {
            Some(EnterRoomCancelStatus::CrowdedRoom)
        } else {
            None
        };
        if let Some(status) = status {
            self.server
                .queue_command(client, &race::EnterRoomCancel { status });
            return Ok(());
        }

        // The password checked out, so the identifiers can be trusted.
        let ctx = self.clients.entry(client).or_default();
        ctx.is_authenticated = true;
        ctx.character_uid = cmd.character_uid;
        ctx.room_uid = cmd.room_uid;

        let created = !self.races.contains_key(&cmd.room_uid);
        let race = self
            .races
            .entry(cmd.room_uid)
            .or_insert_with(RaceInstance::new);
        if created {
            race.master_uid = cmd.character_uid;
        }

        let name = character_name(&self.data, cmd.character_uid);
        if created {
            info!(player = %String::from_utf8_lossy(&name), room = cmd.room_uid, "player created a room");
        } else {
            info!(player = %String::from_utf8_lossy(&name), room = cmd.room_uid, "player joined a room");
        }

        // The race tier starts every session on the initial scrambling key.
        self.server.reset_code(client);

        let mut response = race::EnterRoomOk {
            room_uid: cmd.room_uid,
            is_room_waiting: u8::from(race.stage == Stage::Waiting),
            ..race::EnterRoomOk::default()
        };

        let mut roster: Vec<(Uid, bool, PlayerTeam)> = Vec::new();
        let room_found = self.rooms.get_room(cmd.room_uid, |room| {
            let details = room.details();
            response.description = race::RoomDescription {
                name: Bytes::from(details.name.clone()),
                max_player_count: details.max_player_count as u8,
                password: Bytes::from(details.password.clone()),
                game_mode_maps: details.game_mode.to_wire(),
                game_mode: details.game_mode.to_wire(),
                map_block_id: details.course_id,
                team_mode: details.team_mode.to_wire(),
                mission_id: details.mission_id,
                unk6: details.npc_race,
                skill_bracket: details.skill_bracket,
            };
            for (&uid, player) in room.players() {
                roster.push((uid, player.is_ready(), player.team()));
            }
        });
        if room_found.is_none() {
            bail!("client entered a room that was deleted mid-handshake");
        }

        let mut joining_racer = race::RoomRacer::default();
        for (uid, is_ready, team) in roster {
            let mut row = race::RoomRacer {
                uid,
                name: character_name(&self.data, uid),
                is_master: u8::from(uid == race.master_uid),
                is_ready: u8::from(is_ready),
                team_color: match team {
                    PlayerTeam::Solo => 0,
                    PlayerTeam::Red => 1,
                    PlayerTeam::Blue => 2,
                },
                ..race::RoomRacer::default()
            };
            if let Some(record) = self.data.character(uid) {
                row.level = record.read(|c| c.level);
            }
            if uid == cmd.character_uid {
                joining_racer = row.clone();
            }
            response.racers.push(row);
        }

        self.server.queue_command(client, &response);

        let notify = race::EnterRoomNotify {
            racer: joining_racer,
            average_time_record: cmd.character_uid,
        };
        broadcast(&self.server, &race.clients, &notify);

        race.clients.insert(client);
        Ok(())
    }

    fn handle_change_room_options(
        &mut self,
        client: ClientId,
        cmd: race::ChangeRoomOptions,
    ) -> anyhow::Result<()> {
        let (_, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let options = cmd.options_bitfield;
        self.rooms.get_room(room_uid, |room| {
            let details = room.details_mut();
            if options & 0x01 != 0 {
                details.name = cmd.name.to_vec();
            }
            if options & 0x02 != 0 {
                details.max_player_count = u32::from(cmd.player_count);
            }
            if options & 0x04 != 0 {
                details.password = cmd.password.to_vec();
            }
            if options & 0x08 != 0 {
                match cmd.game_mode {
                    1 => details.game_mode = GameMode::Speed,
                    2 => details.game_mode = GameMode::Magic,
                    6 => details.game_mode = GameMode::Tutorial,
                    other => warn!(mode = other, "unknown game mode on room options"),
                }
            }
            if options & 0x10 != 0 {
                details.course_id = cmd.map_block_id;
            }
            if options & 0x20 != 0 {
                details.npc_race = cmd.npc_race;
            }
        });

        let notify = race::ChangeRoomOptionsNotify {
            options_bitfield: cmd.options_bitfield,
            name: cmd.name,
            player_count: cmd.player_count,
            password: cmd.password,
            game_mode: cmd.game_mode,
            map_block_id: cmd.map_block_id,
            npc_race: cmd.npc_race,
        };
        broadcast(&self.server, &race.clients, &notify);
        Ok(())
    }

    fn handle_change_team(&mut self, client: ClientId, cmd: race::ChangeTeam) -> anyhow::Result<()> {
        let (_, room_uid) = self.context(client)?;

        let applied = self
            .rooms
            .get_room(room_uid, |room| {
                let Some(player) = room.player(cmd.character_uid) else {
                    return false;
                };
                match cmd.team_color {
                    1 => player.set_team(PlayerTeam::Red),
                    2 => player.set_team(PlayerTeam::Blue),
                    _ => {}
                }
                true
            })
            .unwrap_or(false);
        if !applied {
            bail!("change team for a character outside the room");
        }

        self.server.queue_command(
            client,
            &race::ChangeTeamOk {
                character_uid: cmd.character_uid,
                team_color: cmd.team_color,
            },
        );

        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;
        let notify = race::ChangeTeamNotify {
            character_uid: cmd.character_uid,
            team_color: cmd.team_color,
        };
        broadcast_except(&self.server, &race.clients, client, &notify);
        Ok(())
    }

    fn handle_leave_room(&mut self, client: ClientId) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        if room_uid == 0 {
            return Ok(());
        }

        let name = character_name(&self.data, character_uid);
        info!(player = %String::from_utf8_lossy(&name), room = room_uid, "player left the room");

        let mut delete_room = false;
        if let Some(race) = self.races.get_mut(&room_uid) {
            if let Some(racer) = race.tracker.racer(character_uid) {
                racer.state = RacerState::Disconnected;
            }

            race.clients.remove(&client);

            self.rooms.get_room(room_uid, |room| {
                room.remove_player(character_uid);
            });

            let notify = race::LeaveRoomNotify {
                character_uid,
                unk0: 1,
            };
            broadcast(&self.server, &race.clients, &notify);

            if race.master_uid == character_uid {
                let mut next_master = INVALID_UID;
                self.rooms.get_room(room_uid, |room| {
                    next_master = room
                        .players()
                        .next()
                        .map(|(&uid, _)| uid)
                        .unwrap_or(INVALID_UID);
                });

                if next_master != INVALID_UID {
                    race.master_uid = next_master;
                    info!(
                        master = next_master,
                        room = room_uid,
                        "mastership passed after the previous master left"
                    );
                    let notify = race::ChangeMasterNotify {
                        master_uid: next_master,
                    };
                    broadcast(&self.server, &race.clients, &notify);
                }
            }

            delete_room = race.clients.is_empty();
        }

        if delete_room {
            self.rooms.delete_room(room_uid);
            self.races.remove(&room_uid);
            info!(room = room_uid, "room torn down after the last leave");
        }

        if let Some(ctx) = self.clients.get_mut(&client) {
            ctx.room_uid = 0;
        }

        self.server.queue_command(client, &race::LeaveRoomOk);
        Ok(())
    }

    fn handle_ready_race(&mut self, client: ClientId) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;

        let is_ready = self
            .rooms
            .get_room(room_uid, |room| {
                room.player(character_uid).map(|p| p.toggle_ready())
            })
            .flatten()
            .context("ready toggle outside the room")?;

        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;
        let notify = race::ReadyRaceNotify {
            character_uid,
            is_ready: u8::from(is_ready),
        };
        broadcast(&self.server, &race.clients, &notify);
        Ok(())
    }

    // -- Race lifecycle ----------------------------------------------------

    fn handle_start_race(&mut self, client: ClientId) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        if character_uid != race.master_uid {
            bail!("non-master client tried to start the race");
        }

        let mut selected_course = 0u16;
        let mut room_game_mode = GameMode::Speed;
        self.rooms
            .get_room(room_uid, |room| {
                let details = room.details();
                race.game_mode = details.game_mode;
                race.team_mode = details.team_mode;
                race.mission_id = details.mission_id;
                room_game_mode = details.game_mode;
                selected_course = details.course_id;
            })
            .context("room vanished before race start")?;

        race.map_block_id = if self.courses.is_pool_course(selected_course) {
            let mode_info = self.courses.game_mode(room_game_mode);

            let mut master_level = 0u16;
            if let Some(record) = self.data.character(race.master_uid) {
                master_level = record.read(|c| c.level);
            }

            // Only maps the master has unlocked are eligible.
            let eligible: Vec<u16> = mode_info
                .map_pool
                .iter()
                .copied()
                .filter(|&map_id| {
                    self.courses
                        .map_block(map_id)
                        .map(|map| map.required_level <= master_level)
                        .unwrap_or(false)
                })
                .collect();

            eligible
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(1)
        } else {
            selected_course
        };

        let countdown = race::RoomCountdown {
            countdown_ms: ROOM_COUNTDOWN.as_millis() as u32,
            map_block_id: race.map_block_id,
        };
        broadcast(&self.server, &race.clients, &countdown);

        // Fresh oids for the new field.
        race.tracker.clear();

        // Deck items allowed by the mode, placed against the map origin.
        if let Some(map) = self.courses.map_block(race.map_block_id) {
            let mode_info = self.courses.game_mode(race.game_mode);
            for &used_deck_id in mode_info.used_deck_item_ids {
                for placement in map.deck_items {
                    if placement.deck_id != used_deck_id {
                        continue;
                    }
                    race.tracker.add_item(
                        placement.deck_id,
                        [
                            placement.position[0] + map.offset[0],
                            placement.position[1] + map.offset[1],
                            placement.position[2] + map.offset[2],
                        ],
                    );
                }
            }
        } else {
            warn!(room = room_uid, map = race.map_block_id, "no map block for item spawners");
        }

        // Seed the racers from the room roster.
        let mut roster: Vec<(Uid, PlayerTeam)> = Vec::new();
        self.rooms.get_room(room_uid, |room| {
            for (&uid, player) in room.players() {
                roster.push((uid, player.team()));
            }
        });
        for (uid, team) in roster {
            let racer = race.tracker.add_racer(uid);
            racer.state = RacerState::Loading;
            racer.team = match team {
                PlayerTeam::Solo => RacerTeam::Solo,
                PlayerTeam::Red => RacerTeam::Red,
                PlayerTeam::Blue => RacerTeam::Blue,
            };
        }

        race.stage = Stage::Loading;
        race.stage_timeout = Instant::now() + self.config.load_timeout;

        self.rooms.get_room(room_uid, |room| room.set_playing(true));

        // The start notify follows once the room countdown has run down.
        self.scheduler.queue(
            Box::new(move |director: &mut RaceDirector| {
                director.send_start_race_notify(room_uid);
            }),
            Instant::now() + ROOM_COUNTDOWN,
        );
        Ok(())
    }

    fn send_start_race_notify(&mut self, room_uid: u32) {
        let Some(race) = self.races.get_mut(&room_uid) else {
            // The room died during the countdown.
            return;
        };

        let mut notify = race::StartRaceNotify {
            game_mode: race.game_mode.to_wire(),
            team_mode: race.team_mode.to_wire(),
            map_block_id: race.map_block_id,
            p2p_relay_address: u32::from(
                match self.config.relay_bind.ip() {
                    std::net::IpAddr::V4(v4) => v4,
                    std::net::IpAddr::V6(_) => std::net::Ipv4Addr::LOCALHOST,
                },
            ),
            p2p_relay_port: self.config.relay_bind.port(),
            mission_id: race.mission_id,
            ..race::StartRaceNotify::default()
        };

        let mut names: HashMap<Uid, Bytes> = HashMap::new();
        for (&uid, _) in race.tracker.racers() {
            names.insert(uid, character_name(&self.data, uid));
        }

        for (&uid, racer) in race.tracker.racers() {
            notify.racers.push(race::StartRacePlayer {
                oid: racer.oid,
                name: names.get(&uid).cloned().unwrap_or_default(),
                p2p_id: racer.oid,
                team_color: team_color(racer.team),
            });
        }

        // Skill decks apply to free-for-all speed and magic races only.
        let skills_eligible = matches!(race.game_mode, GameMode::Speed | GameMode::Magic)
            && race.team_mode == TeamMode::Ffa;

        for &race_client in &race.clients {
            let Some(ctx) = self.clients.get(&race_client) else {
                continue;
            };
            let Some(racer) = race.tracker.racer(ctx.character_uid) else {
                continue;
            };
            notify.host_oid = racer.oid;

            notify.active_skill_set = race::ActiveSkillSet::default();
            if skills_eligible {
                if let Some(record) = self.data.character(ctx.character_uid) {
                    record.read(|character| {
                        let sets = match race.game_mode {
                            GameMode::Magic => &character.skills.magic,
                            _ => &character.skills.speed,
                        };
                        let set = if sets.active_set_id == 1 { sets.set2 } else { sets.set1 };
                        notify.active_skill_set.set_id = sets.active_set_id;
                        notify.active_skill_set.skills[0] = set.slot1;
                        notify.active_skill_set.skills[1] = set.slot2;
                    });
                }

                // The bonus slot is rolled per racer.
                let mut bonus_pool = BONUS_SKILLS_COMMON.to_vec();
                match race.game_mode {
                    GameMode::Magic => bonus_pool.extend_from_slice(BONUS_SKILLS_MAGIC),
                    _ => bonus_pool.extend_from_slice(BONUS_SKILLS_SPEED),
                }
                notify.active_skill_set.skills[2] = *bonus_pool
                    .choose(&mut rand::thread_rng())
                    .unwrap_or(&BONUS_SKILLS_COMMON[0]);
            }

            self.server.queue_command(race_client, &notify);
        }
    }

    fn handle_loading_complete(&mut self, client: ClientId) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let racer = racer_of(race, character_uid)?;
        racer.state = RacerState::Racing;
        let oid = racer.oid;

        broadcast(
            &self.server,
            &race.clients,
            &race::LoadingCompleteNotify { oid },
        );
        Ok(())
    }

    fn handle_race_final(&mut self, client: ClientId, cmd: race::UserRaceFinal) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let racer = racer_of(race, character_uid)?;
        racer.state = RacerState::Finishing;
        racer.course_time = cmd.course_time;
        let oid = racer.oid;

        let notify = race::UserRaceFinalNotify {
            oid,
            course_time: cmd.course_time,
        };
        broadcast(&self.server, &race.clients, &notify);
        Ok(())
    }

    fn handle_race_result(&mut self, client: ClientId) -> anyhow::Result<()> {
        let (character_uid, _) = self.context(client)?;

        let mut response = race::RaceResultOk {
            member1: 1,
            member2: 1,
            member3: 1,
            member4: 1,
            member5: 1,
            current_carrots: 0,
        };
        if let Some(record) = self.data.character(character_uid) {
            response.current_carrots = record.read(|c| c.carrots);
        }

        self.server.queue_command(client, &response);
        Ok(())
    }

    fn handle_p2p_result(&mut self, client: ClientId) -> anyhow::Result<()> {
        let (_, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let entries = race
            .tracker
            .racers()
            .map(|(_, racer)| (racer.oid, 0u32))
            .collect();
        self.server
            .queue_command(client, &race::RaceP2PResult { entries });
        Ok(())
    }

    fn handle_award_start(&mut self, client: ClientId, cmd: race::AwardStart) -> anyhow::Result<()> {
        let (_, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        // Only spectators get the award scene.
        let notify = race::AwardNotify {
            member1: cmd.member1,
        };
        for &race_client in &race.clients {
            let is_participating = self
                .clients
                .get(&race_client)
                .and_then(|ctx| race.tracker.racer_state(ctx.character_uid))
                .map(|state| state != RacerState::Disconnected)
                .unwrap_or(false);
            if !is_participating {
                self.server.queue_command(race_client, &notify);
            }
        }
        Ok(())
    }

    // -- Per-racer scoring -------------------------------------------------

    fn handle_star_point_get(
        &mut self,
        client: ClientId,
        cmd: race::StarPointGet,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;
        let mode_info = self.courses.game_mode(race.game_mode);

        let racer = racer_of(race, character_uid)?;
        if cmd.character_oid != racer.oid {
            bail!("client acted on behalf of a different racer");
        }

        racer.star_points = racer
            .star_points
            .saturating_add(cmd.gained_star_points)
            .min(mode_info.star_points_max);

        // Boost gain never hands out a magic item by itself.
        self.server.queue_command(
            client,
            &race::StarPointGetOk {
                character_oid: cmd.character_oid,
                star_point_value: racer.star_points,
                give_magic_item: 0,
            },
        );
        Ok(())
    }

    fn handle_request_spur(&mut self, client: ClientId, cmd: race::RequestSpur) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;
        let mode_info = self.courses.game_mode(race.game_mode);

        let racer = racer_of(race, character_uid)?;
        if cmd.character_oid != racer.oid {
            bail!("client acted on behalf of a different racer");
        }

        if racer.star_points < mode_info.spur_consume_star_points {
            bail!("spur without the points to pay for it (desync or cheating)");
        }
        racer.star_points -= mode_info.spur_consume_star_points;

        self.server.queue_command(
            client,
            &race::RequestSpurOk {
                character_oid: cmd.character_oid,
                active_boosters: cmd.active_boosters,
                star_point_value: racer.star_points,
                combo_break: cmd.combo_break,
            },
        );
        self.server.queue_command(
            client,
            &race::StarPointGetOk {
                character_oid: cmd.character_oid,
                star_point_value: racer.star_points,
                give_magic_item: 0,
            },
        );
        Ok(())
    }

    fn handle_hurdle_clear(
        &mut self,
        client: ClientId,
        cmd: race::HurdleClearResult,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;
        let mode_info = self.courses.game_mode(race.game_mode);
        let game_mode = race.game_mode;

        let racer = racer_of(race, character_uid)?;
        if cmd.character_oid != racer.oid {
            bail!("client acted on behalf of a different racer");
        }

        let mut response = race::HurdleClearResultOk {
            character_oid: cmd.character_oid,
            hurdle_clear_type: cmd.hurdle_clear_type as u8,
            jump_combo: 0,
            unk3: 0,
        };

        match cmd.hurdle_clear_type {
            HurdleClearType::Perfect => {
                racer.jump_combo = (racer.jump_combo + 1).min(99);
                if game_mode == GameMode::Speed {
                    // The combo counter only renders in speed races.
                    response.jump_combo = racer.jump_combo;
                }

                let applicable_combo = racer.jump_combo.min(mode_info.perfect_jump_max_bonus_combo);
                let combo_bonus = applicable_combo * mode_info.perfect_jump_unit_star_points;
                racer.star_points = racer
                    .star_points
                    .saturating_add(mode_info.perfect_jump_star_points + combo_bonus)
                    .min(mode_info.star_points_max);
            }
            HurdleClearType::Good | HurdleClearType::DoubleJumpOrGlide => {
                racer.jump_combo = 0;
                racer.star_points = racer
                    .star_points
                    .saturating_add(mode_info.good_jump_star_points)
                    .min(mode_info.star_points_max);
            }
            HurdleClearType::Collision => {
                racer.jump_combo = 0;
            }
        }

        // A maxed gauge off a perfect clear triggers the magic item prompt.
        let give_magic_item = game_mode == GameMode::Magic
            && racer.star_points >= mode_info.star_points_max
            && cmd.hurdle_clear_type == HurdleClearType::Perfect;

        if cmd.hurdle_clear_type != HurdleClearType::Collision {
            self.server.queue_command(
                client,
                &race::StarPointGetOk {
                    character_oid: cmd.character_oid,
                    star_point_value: racer.star_points,
                    give_magic_item: u8::from(give_magic_item),
                },
            );
        }
        self.server.queue_command(client, &response);
        Ok(())
    }

    fn handle_starting_rate(
        &mut self,
        client: ClientId,
        cmd: race::StartingRate,
    ) -> anyhow::Result<()> {
        if cmd.unk1 < 1 && cmd.boost_gained < 1 {
            return Ok(());
        }

        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;
        let mode_info = self.courses.game_mode(race.game_mode);

        let racer = racer_of(race, character_uid)?;
        if cmd.character_oid != racer.oid {
            bail!("client acted on behalf of a different racer");
        }

        racer.star_points = racer
            .star_points
            .saturating_add(cmd.boost_gained)
            .min(mode_info.star_points_max);

        self.server.queue_command(
            client,
            &race::StarPointGetOk {
                character_oid: cmd.character_oid,
                star_point_value: racer.star_points,
                give_magic_item: 0,
            },
        );
        Ok(())
    }

    // -- Position updates and deck items -----------------------------------

    fn handle_update_pos(
        &mut self,
        client: ClientId,
        cmd: race::UserRaceUpdatePos,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;
        let mode_info = self.courses.game_mode(race.game_mode);
        let game_mode = race.game_mode;
        let race_started = Instant::now() >= race.race_start_at;

        let now = Instant::now();
        let items: Vec<(u16, u32, [f32; 3], Instant)> = race
            .tracker
            .items()
            .map(|(&oid, item)| (oid, item.deck_id, item.position, item.respawn_at))
            .collect();

        let racer = racer_of(race, character_uid)?;
        if cmd.oid != racer.oid {
            bail!("client acted on behalf of a different racer");
        }

        let mut spawns: Vec<race::RaceItemSpawn> = Vec::new();
        for (item_oid, deck_id, position, respawn_at) in items {
            if now < respawn_at {
                continue;
            }

            let dx = f64::from(cmd.position[0] - position[0]);
            let dy = f64::from(cmd.position[1] - position[1]);
            let dz = f64::from(cmd.position[2] - position[2]);
            let distance = (dx * dx + dy * dy + dz * dz).sqrt();
            let in_proximity = distance < ITEM_SPAWN_DISTANCE;
            let already_tracked = racer.tracked_items.contains(&item_oid);

            if already_tracked {
                // Out of range again: the client despawns it locally.
                if !in_proximity {
                    racer.tracked_items.remove(&item_oid);
                }
                continue;
            }
            if !in_proximity {
                continue;
            }

            racer.tracked_items.insert(item_oid);
            spawns.push(race::RaceItemSpawn {
                item_id: item_oid,
                item_type: deck_id,
                position,
                orientation: [0.0, 0.0, 0.0, 1.0],
                size_level: 0,
                remove_delay: -1,
            });
        }

        // Empty hands regenerate the magic gauge once the race is running.
        let mut gauge_update = None;
        if game_mode == GameMode::Magic
            && racer.state == RacerState::Racing
            && race_started
            && racer.magic_item.is_none()
        {
            if racer.star_points < mode_info.star_points_max {
                racer.star_points =
                    (racer.star_points + NO_ITEM_HELD_BOOST).min(mode_info.star_points_max);
            }
            gauge_update = Some(race::StarPointGetOk {
                character_oid: cmd.oid,
                star_point_value: racer.star_points,
                give_magic_item: u8::from(racer.star_points >= mode_info.star_points_max),
            });
        }

        for spawn in &spawns {
            self.server.queue_command(client, spawn);
        }
        if let Some(update) = gauge_update {
            self.server.queue_command(client, &update);
        }

        // Position fan-out to peers rides the UDP relay, not this path.
        Ok(())
    }

    fn handle_item_get(&mut self, client: ClientId, cmd: race::UserRaceItemGet) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;
        let mode_info = self.courses.game_mode(race.game_mode);
        let game_mode = race.game_mode;

        let (item_oid, deck_id) = {
            let item = race
                .tracker
                .item(cmd.item_id)
                .context("picked up an item that does not exist")?;
            item.respawn_at = Instant::now() + ITEM_RESPAWN_DELAY;
            (item.oid, item.deck_id)
        };

        match game_mode {
            GameMode::Magic => {
                let racer = racer_of(race, character_uid)?;
                if racer.magic_item.is_some() {
                    warn!(
                        character = character_uid,
                        room = room_uid,
                        "magic pickup while already holding an item, skipping"
                    );
                    return Ok(());
                }

                let gained = random_magic_item();
                racer.magic_item = Some(gained);

                self.server.queue_command(
                    client,
                    &race::RequestMagicItemOk {
                        character_oid: cmd.character_oid,
                        magic_item_id: gained,
                        member3: 0,
                    },
                );
                let notify = race::RequestMagicItemNotify {
                    magic_item_id: gained,
                    character_oid: cmd.character_oid,
                };
                broadcast(&self.server, &race.clients, &notify);
            }
            _ => {
                let racer = racer_of(race, character_uid)?;
                match deck_id {
                    // A gold shoe tops the gauge up to the next full boost.
                    DECK_GOLD_HORSESHOE => {
                        racer.star_points = ((racer.star_points / 40_000) + 1)
                            .saturating_mul(40_000)
                            .min(mode_info.star_points_max);
                    }
                    DECK_SILVER_HORSESHOE => {
                        racer.star_points =
                            (racer.star_points + 10_000).min(mode_info.star_points_max);
                    }
                    other => {
                        warn!(client, deck = other, "pickup of an unknown deck item type");
                    }
                }

                self.server.queue_command(
                    client,
                    &race::StarPointGetOk {
                        character_oid: cmd.character_oid,
                        star_point_value: racer.star_points,
                        give_magic_item: 0,
                    },
                );
            }
        }

        let get = race::RaceItemGet {
            character_oid: cmd.character_oid,
            item_id: cmd.item_id,
            item_type: deck_id,
        };
        broadcast(&self.server, &race.clients, &get);

        // Everyone's client despawned it; forget who had it spawned.
        for (_, racer) in race.tracker.racers_mut() {
            racer.tracked_items.remove(&item_oid);
        }

        // Respawn broadcast after the delay.
        self.scheduler.queue(
            Box::new(move |director: &mut RaceDirector| {
                let Some(race) = director.races.get_mut(&room_uid) else {
                    return;
                };
                let Some(item) = race.tracker.item(item_oid) else {
                    return;
                };
                let spawn = race::RaceItemSpawn {
                    item_id: item.oid,
                    item_type: item.deck_id,
                    position: item.position,
                    orientation: [0.0, 0.0, 0.0, 1.0],
                    size_level: 0,
                    remove_delay: -1,
                };
                broadcast(&director.server, &race.clients, &spawn);
            }),
            Instant::now() + ITEM_RESPAWN_DELAY,
        );
        Ok(())
    }

    // -- Magic items -------------------------------------------------------

    fn handle_request_magic_item(
        &mut self,
        client: ClientId,
        cmd: race::RequestMagicItem,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let racer = racer_of(race, character_uid)?;
        if cmd.character_oid != racer.oid {
            debug!(client, "magic item request with a stale oid, ignoring");
            return Ok(());
        }

        if racer.magic_item.is_some() {
            // There is no cancel for this; the client just asked twice.
            warn!(
                character = character_uid,
                room = room_uid,
                "magic item requested while already holding one, skipping"
            );
            return Ok(());
        }

        // The gauge is spent on the draw.
        racer.star_points = 0;
        self.server.queue_command(
            client,
            &race::StarPointGetOk {
                character_oid: cmd.character_oid,
                star_point_value: 0,
                give_magic_item: 0,
            },
        );

        let gained = random_magic_item();
        racer.magic_item = Some(gained);

        self.server.queue_command(
            client,
            &race::RequestMagicItemOk {
                character_oid: cmd.character_oid,
                magic_item_id: gained,
                member3: 0,
            },
        );

        let notify = race::RequestMagicItemNotify {
            magic_item_id: gained,
            character_oid: cmd.character_oid,
        };
        broadcast_except(&self.server, &race.clients, client, &notify);
        Ok(())
    }

    fn handle_use_magic_item(
        &mut self,
        client: ClientId,
        cmd: race::UseMagicItem,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let racer = racer_of(race, character_uid)?;
        if cmd.character_oid != racer.oid {
            debug!(client, "magic item use with a stale oid, ignoring");
            return Ok(());
        }

        info!(
            client,
            item = cmd.magic_item_id,
            oid = cmd.character_oid,
            "magic item used"
        );

        self.server.queue_command(
            client,
            &race::UseMagicItemOk {
                character_oid: cmd.character_oid,
                magic_item_id: cmd.magic_item_id,
                unk3: cmd.character_oid,
                unk4: 0,
                bolt: cmd.bolt.clone(),
            },
        );

        match cmd.magic_item_id {
            race::MAGIC_ITEM_ICE_WALL => {
                // An ice wall becomes a field obstacle where the caster is.
                let wall_position = [25.0, -25.0, -8010.0];
                let wall = race.tracker.add_item(DECK_SILVER_HORSESHOE, wall_position);
                let spawn = race::RaceItemSpawn {
                    item_id: wall.oid,
                    item_type: wall.deck_id,
                    position: wall.position,
                    orientation: [0.0, 0.0, 0.0, 1.0],
                    size_level: 0,
                    remove_delay: -1,
                };
                broadcast(&self.server, &race.clients, &spawn);
            }
            race::MAGIC_ITEM_BOLT => {
                let usage = race::UseMagicItemNotify {
                    character_oid: cmd.character_oid,
                    magic_item_id: cmd.magic_item_id,
                    unk3: cmd.character_oid,
                    bolt: Some(cmd.bolt.clone().unwrap_or_default()),
                };
                broadcast_except(&self.server, &race.clients, client, &usage);

                // Auto-target: the first other racer still racing.
                let target_oid = race
                    .tracker
                    .racers()
                    .find(|(_, r)| {
                        r.oid != cmd.character_oid && r.state == RacerState::Racing
                    })
                    .map(|(_, r)| r.oid)
                    .unwrap_or(INVALID_OID);

                if target_oid != INVALID_OID {
                    let hit = race::UseMagicItemNotify {
                        character_oid: target_oid,
                        magic_item_id: race::MAGIC_ITEM_BOLT,
                        unk3: target_oid,
                        bolt: Some(race::BoltPayload {
                            targets: Vec::new(),
                            cast_delay: BOLT_CAST_DELAY,
                            down_duration: BOLT_DOWN_DURATION,
                        }),
                    };
                    broadcast(&self.server, &race.clients, &hit);

                    // The strike knocks any held item out of the target.
                    for (_, target) in race.tracker.racers_mut() {
                        if target.oid == target_oid {
                            if let Some(lost) = target.magic_item.take() {
                                debug!(oid = target_oid, item = lost, "bolt knocked out a held item");
                            }
                            break;
                        }
                    }
                } else {
                    debug!(client, "no valid target for the bolt");
                }
            }
            _ => {
                let usage = race::UseMagicItemNotify {
                    character_oid: cmd.character_oid,
                    magic_item_id: cmd.magic_item_id,
                    unk3: cmd.character_oid,
                    bolt: None,
                };
                broadcast_except(&self.server, &race.clients, client, &usage);
            }
        }

        if let Some(racer) = race.tracker.racer(character_uid) {
            racer.magic_item = None;
        }
        Ok(())
    }

    fn handle_start_magic_target(
        &mut self,
        client: ClientId,
        cmd: race::StartMagicTarget,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let racer = racer_of(race, character_uid)?;
        if cmd.character_oid != racer.oid {
            warn!(client, "oid mismatch on start magic target");
            return Ok(());
        }

        racer.is_targeting = true;
        racer.current_target = INVALID_OID;
        Ok(())
    }

    fn handle_change_magic_target(
        &mut self,
        client: ClientId,
        cmd: race::ChangeMagicTarget,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let racer = racer_of(race, character_uid)?;
        if cmd.character_oid != racer.oid {
            warn!(client, "oid mismatch on change magic target");
            return Ok(());
        }
        racer.current_target = cmd.target_oid;

        // The target sees who is aiming at them.
        let notify = race::ChangeMagicTargetNotify {
            character_oid: cmd.character_oid,
            target_oid: cmd.target_oid,
        };
        if let Some(target_client) = self.find_racer_client(room_uid, cmd.target_oid) {
            self.server.queue_command(target_client, &notify);
        }
        Ok(())
    }

    fn handle_magic_target_ok(
        &mut self,
        client: ClientId,
        cmd: race::ChangeMagicTarget,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        {
            let racer = racer_of(race, character_uid)?;
            if cmd.character_oid != racer.oid {
                warn!(client, "oid mismatch on confirm magic target");
                return Ok(());
            }
        }

        // The confirmed bolt lands: the target loses any held item.
        for (_, target) in race.tracker.racers_mut() {
            if target.oid == cmd.target_oid {
                target.magic_item = None;
                break;
            }
        }

        let hit = race::UseMagicItemNotify {
            character_oid: cmd.target_oid,
            magic_item_id: race::MAGIC_ITEM_BOLT,
            unk3: cmd.target_oid,
            bolt: Some(race::BoltPayload {
                targets: Vec::new(),
                cast_delay: BOLT_CAST_DELAY,
                down_duration: BOLT_DOWN_DURATION,
            }),
        };
        broadcast(&self.server, &race.clients, &hit);

        let racer = racer_of(race, character_uid)?;
        racer.is_targeting = false;
        racer.current_target = INVALID_OID;
        racer.magic_item = None;
        Ok(())
    }

    fn handle_magic_target_cancel(
        &mut self,
        client: ClientId,
        cmd: race::StartMagicTarget,
    ) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let current_target = {
            let racer = racer_of(race, character_uid)?;
            if cmd.character_oid != racer.oid {
                warn!(client, "oid mismatch on cancel magic target");
                return Ok(());
            }
            let target = racer.current_target;
            racer.is_targeting = false;
            racer.current_target = INVALID_OID;
            target
        };

        if current_target != INVALID_OID {
            let notify = race::RemoveMagicTarget {
                character_oid: cmd.character_oid,
            };
            if let Some(target_client) = self.find_racer_client(room_uid, current_target) {
                self.server.queue_command(target_client, &notify);
            }
        }
        Ok(())
    }

    /// Client currently bound to the racer with this oid, if any.
    fn find_racer_client(&mut self, room_uid: u32, oid: u16) -> Option<ClientId> {
        let race = self.races.get_mut(&room_uid)?;
        let race_clients = race.clients.clone();
        for race_client in race_clients {
            let Some(ctx) = self.clients.get(&race_client) else {
                continue;
            };
            if let Some(racer) = race.tracker.racer(ctx.character_uid) {
                if racer.oid == oid {
                    return Some(race_client);
                }
            }
        }
        None
    }

    // -- Social ------------------------------------------------------------

    fn handle_chat(&mut self, client: ClientId, cmd: race::Chat) -> anyhow::Result<()> {
        let (character_uid, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let author = character_name(&self.data, character_uid);

        info!(
            room = room_uid,
            author = %String::from_utf8_lossy(&author),
            message = %String::from_utf8_lossy(&cmd.message),
            "chat"
        );

        let notify = race::ChatNotify {
            author,
            message: cmd.message,
            is_system: 0,
        };
        broadcast(&self.server, &race.clients, &notify);
        Ok(())
    }

    fn handle_relay_command(
        &mut self,
        client: ClientId,
        cmd: race::RelayCommand,
    ) -> anyhow::Result<()> {
        let (_, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let notify = race::RelayCommandNotify {
            member1: cmd.member1,
            member2: cmd.member2,
        };
        broadcast_except(&self.server, &race.clients, client, &notify);
        Ok(())
    }

    fn handle_relay(&mut self, client: ClientId, cmd: race::Relay) -> anyhow::Result<()> {
        let (_, room_uid) = self.context(client)?;
        let race = self
            .races
            .get_mut(&room_uid)
            .context("no race instance for the room")?;

        let notify = race::RelayNotify {
            oid: cmd.oid,
            member2: cmd.member2,
            member3: cmd.member3,
            data: cmd.data,
        };
        broadcast_except(&self.server, &race.clients, client, &notify);
        Ok(())
    }

    fn handle_skill_preset(
        &mut self,
        client: ClientId,
        cmd: race::ChangeSkillCardPreset,
    ) -> anyhow::Result<()> {
        if cmd.set_id > 2 {
            debug!(client, set = cmd.set_id, "skill preset out of range, ignoring");
            return Ok(());
        }
        if cmd.game_mode != GameMode::Speed.to_wire() && cmd.game_mode != GameMode::Magic.to_wire()
        {
            debug!(client, mode = cmd.game_mode, "skill preset for an invalid mode, ignoring");
            return Ok(());
        }

        let (character_uid, _) = self.context(client)?;
        if let Some(record) = self.data.character(character_uid) {
            record.write(|character| {
                let sets = if cmd.game_mode == GameMode::Magic.to_wire() {
                    &mut character.skills.magic
                } else {
                    &mut character.skills.speed
                };
                sets.active_set_id = cmd.set_id;
            });
        }
        // No acknowledgement for this one.
        Ok(())
    }
}

fn random_magic_item() -> u32 {
    let idx = rand::thread_rng().gen_range(0..MAGIC_ITEMS.len());
    MAGIC_ITEMS[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoreboard_orders_by_time_with_disconnected_last() {
        let mut tracker = RaceTracker::new();

        let fast = tracker.add_racer(44);
        fast.state = RacerState::Finishing;
        fast.course_time = 60_000;

        let gone = tracker.add_racer(45);
        gone.state = RacerState::Disconnected;
        gone.course_time = 1; // Stale value must not matter once disconnected.

        let slow = tracker.add_racer(46);
        slow.state = RacerState::Finishing;
        slow.course_time = 88_000;

        let rows = build_scoreboard(&tracker);
        assert_eq!(rows[0], (44, 60_000, true));
        assert_eq!(rows[1], (46, 88_000, true));
        assert_eq!(rows[2], (45, u32::MAX, false));
    }

    #[test]
    fn scoreboard_keeps_tied_finishers() {
        let mut tracker = RaceTracker::new();
        for uid in [1u32, 2] {
            let racer = tracker.add_racer(uid);
            racer.state = RacerState::Finishing;
            racer.course_time = 60_000;
        }
        assert_eq!(build_scoreboard(&tracker).len(), 2);
    }

    #[test]
    fn race_clock_counts_hundred_nanos() {
        let epoch = Instant::now();
        let later = epoch + Duration::from_millis(1);
        assert_eq!(race_clock(epoch, later), 10_000);
        // Before the epoch saturates to zero rather than wrapping.
        assert_eq!(race_clock(later, epoch), 0);
    }

    #[test]
    fn random_magic_item_stays_in_the_table() {
        for _ in 0..64 {
            assert!(MAGIC_ITEMS.contains(&random_magic_item()));
        }
    }
}
