//! End-to-end scenarios over in-process TCP: a test client speaks the real
//! framed protocol against fully assembled lobby and race tiers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use canterd::config::{AdvertisedEndpoint, Config};
use canterd::datastore::{DataDirector, MemoryRecordSource, RecordSource, Uid};
use canterd::infractions::InfractionList;
use canterd::lobby::LobbyDirector;
use canterd::otp::OtpRegistry;
use canterd::race::RaceDirector;
use canterd::rooms::RoomRegistry;
use canterd::{net, LobbyProtocol, RaceProtocol};
use canterio::{Frame, FrameReader, FrameWriter, Scrambler};
use canterproto::wire::{Reader, Writer};
use canterproto::{id, lobby, race};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    lobby_addr: SocketAddr,
    race_addr: SocketAddr,
    source: Arc<MemoryRecordSource>,
}

async fn start_server() -> Harness {
    start_server_with(|_| {}).await
}

async fn start_server_with(customize: impl FnOnce(&mut Config)) -> Harness {
    let lobby_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let race_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let lobby_addr = lobby_listener.local_addr().unwrap();
    let race_addr = race_listener.local_addr().unwrap();

    let mut config = Config {
        lobby_bind: lobby_addr,
        race_bind: race_addr,
        relay_bind: "127.0.0.1:0".parse().unwrap(),
        ranch_advert: AdvertisedEndpoint {
            address: "127.0.0.1".parse().unwrap(),
            port: 10031,
        },
        race_advert: AdvertisedEndpoint {
            address: "127.0.0.1".parse().unwrap(),
            port: race_addr.port(),
        },
        messenger_advert: AdvertisedEndpoint {
            address: "127.0.0.1".parse().unwrap(),
            port: 10033,
        },
        notice: "welcome! {players_online} riders online".to_string(),
        bans_path: PathBuf::from("/nonexistent/bans.json"),
        // Short stage timeouts keep the timeout scenarios fast.
        load_timeout: Duration::from_millis(600),
        finish_timeout: Duration::from_millis(600),
    };
    customize(&mut config);
    let config = Arc::new(config);

    let infractions = Arc::new(InfractionList::load(&config.bans_path).unwrap());
    let source = Arc::new(MemoryRecordSource::new());
    let data = Arc::new(DataDirector::new(
        Arc::clone(&source) as Arc<dyn RecordSource>
    ));
    let otp = Arc::new(OtpRegistry::new());
    let rooms = Arc::new(RoomRegistry::new());

    let (lobby_handle, lobby_events) = net::start::<LobbyProtocol>(lobby_listener, "lobby");
    tokio::spawn(
        LobbyDirector::new(
            lobby_handle,
            Arc::clone(&config),
            Arc::clone(&data),
            Arc::clone(&otp),
            Arc::clone(&rooms),
            infractions,
        )
        .run(lobby_events),
    );

    let (race_handle, race_events) = net::start::<RaceProtocol>(race_listener, "race");
    tokio::spawn(
        RaceDirector::new(
            race_handle,
            Arc::clone(&config),
            Arc::clone(&data),
            Arc::clone(&otp),
            Arc::clone(&rooms),
        )
        .run(race_events),
    );

    Harness {
        lobby_addr,
        race_addr,
        source,
    }
}

struct TestClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    scrambler: Scrambler,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        stream.set_nodelay(true).unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            scrambler: Scrambler::new(),
        }
    }

    fn set_code(&mut self, code: u32) {
        self.scrambler.set_code(code);
    }

    async fn send(&mut self, command: u16, build: impl FnOnce(&mut Writer)) {
        let mut w = Writer::new();
        build(&mut w);
        self.writer
            .write_frame(command, &w.into_bytes(), &self.scrambler)
            .await
            .unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Frame {
        tokio::time::timeout(RECV_TIMEOUT, self.reader.read_frame(&self.scrambler))
            .await
            .expect("timed out waiting for a frame")
            .expect("connection error")
            .expect("connection closed")
    }

    /// Read frames until one carries the wanted command id.
    async fn recv_command(&mut self, command: u16) -> Frame {
        loop {
            let frame = self.recv().await;
            if frame.command == command {
                return frame;
            }
        }
    }

    /// Drain any in-flight frames and require the server to close the
    /// connection. A reset counts as closed.
    async fn expect_closed(&mut self) {
        loop {
            let result =
                tokio::time::timeout(RECV_TIMEOUT, self.reader.read_frame(&self.scrambler))
                    .await
                    .expect("timed out waiting for close");
            match result {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return,
            }
        }
    }
}

fn write_login(w: &mut Writer, name: &str, token: &str) {
    lobby::Login {
        constant0: 50,
        constant1: 281,
        login_id: Bytes::copy_from_slice(name.as_bytes()),
        member_no: 1,
        auth_key: Bytes::copy_from_slice(token.as_bytes()),
        val0: 0,
    }
    .write(w);
}

/// Log in and re-arm the scrambler with the granted constant.
async fn login_ok(client: &mut TestClient, name: &str, token: &str) -> lobby::LoginOk {
    client.send(id::LOGIN, |w| write_login(w, name, token)).await;
    let frame = client.recv().await;
    assert_eq!(
        frame.command,
        id::LOGIN_OK,
        "expected login ok, got command 0x{:04X}",
        frame.command
    );
    let ok = lobby::LoginOk::read(&mut Reader::new(frame.payload)).unwrap();
    client.set_code(ok.scrambling_constant);
    ok
}

/// Create a room from the lobby and return `(room uid, otp)`.
async fn make_room(client: &mut TestClient, name: &str, player_count: u8, game_mode: u8) -> (u32, u32) {
    client
        .send(id::MAKE_ROOM, |w| {
            lobby::MakeRoom {
                name: Bytes::copy_from_slice(name.as_bytes()),
                password: Bytes::new(),
                player_count,
                game_mode,
                team_mode: 1,
                mission_id: 0,
                unk3: 0,
                bitset: 0,
                unk4: 0,
            }
            .write(w)
        })
        .await;
    let frame = client.recv_command(id::MAKE_ROOM_OK).await;
    let ok = lobby::MakeRoomOk::read(&mut Reader::new(frame.payload)).unwrap();
    (ok.room_uid, ok.one_time_password)
}

/// Enter the race tier with an OTP and return the acknowledgement.
async fn enter_race_room(
    client: &mut TestClient,
    character_uid: Uid,
    room_uid: u32,
    otp: u32,
) -> race::EnterRoomOk {
    client
        .send(id::RACE_ENTER_ROOM, |w| {
            race::EnterRoom {
                character_uid,
                one_time_password: otp,
                room_uid,
            }
            .write(w)
        })
        .await;
    let frame = client.recv_command(id::RACE_ENTER_ROOM_OK).await;
    race::EnterRoomOk::read(&mut Reader::new(frame.payload)).unwrap()
}

#[tokio::test]
async fn happy_path_login() {
    let server = start_server().await;
    server.source.add_user_with_character("rider", "token-1", "Rider");

    let mut client = TestClient::connect(server.lobby_addr).await;
    let ok = login_ok(&mut client, "rider", "token-1").await;

    assert_eq!(&ok.name[..], b"Rider");
    assert_eq!(&ok.motd[..], b"welcome! 1 riders online");
    assert_ne!(ok.uid, 0);
    assert_eq!(ok.ranch_port, 10031);
    assert_ne!(ok.scrambling_constant, 0);

    // Exactly one login acknowledgement and nothing else unprompted.
    let extra =
        tokio::time::timeout(Duration::from_millis(300), client.reader.read_frame(&client.scrambler))
            .await;
    assert!(extra.is_err(), "unexpected extra frame after login ok");
}

#[tokio::test]
async fn duplicate_login_is_rejected() {
    let server = start_server().await;
    server.source.add_user_with_character("rider", "token-1", "Rider");

    let mut first = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut first, "rider", "token-1").await;

    let mut second = TestClient::connect(server.lobby_addr).await;
    second
        .send(id::LOGIN, |w| write_login(w, "rider", "token-1"))
        .await;
    let frame = second.recv_command(id::LOGIN_CANCEL).await;
    let cancel = lobby::LoginCancel::read(&mut Reader::new(frame.payload)).unwrap();
    assert_eq!(cancel.reason, lobby::LoginCancelReason::Duplicated);
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let server = start_server().await;
    server.source.add_user_with_character("rider", "token-1", "Rider");

    let mut client = TestClient::connect(server.lobby_addr).await;
    client
        .send(id::LOGIN, |w| write_login(w, "rider", "wrong"))
        .await;
    let frame = client.recv_command(id::LOGIN_CANCEL).await;
    let cancel = lobby::LoginCancel::read(&mut Reader::new(frame.payload)).unwrap();
    assert_eq!(cancel.reason, lobby::LoginCancelReason::InvalidUser);
}

#[tokio::test]
async fn banned_user_is_rejected() {
    let dir = std::env::temp_dir().join("canterd-e2e-bans");
    std::fs::create_dir_all(&dir).unwrap();
    let bans_path = dir.join("bans.json");
    std::fs::write(
        &bans_path,
        r#"{"version":1,"user_bans":[{"name_lc":"rider","reason":"test ban"}]}"#,
    )
    .unwrap();

    let server = start_server_with(|config| config.bans_path = bans_path.clone()).await;
    server.source.add_user_with_character("rider", "token-1", "Rider");

    let mut client = TestClient::connect(server.lobby_addr).await;
    client
        .send(id::LOGIN, |w| write_login(w, "rider", "token-1"))
        .await;
    let frame = client.recv_command(id::LOGIN_CANCEL).await;
    let cancel = lobby::LoginCancel::read(&mut Reader::new(frame.payload)).unwrap();
    assert_eq!(cancel.reason, lobby::LoginCancelReason::DisconnectYourself);
}

#[tokio::test]
async fn fresh_account_goes_through_the_creator() {
    let server = start_server().await;
    server.source.add_user("fresh", "token-2");

    let mut client = TestClient::connect(server.lobby_addr).await;
    client
        .send(id::LOGIN, |w| write_login(w, "fresh", "token-2"))
        .await;
    client.recv_command(id::CREATE_NICKNAME_NOTIFY).await;

    client
        .send(id::CREATE_NICKNAME, |w| {
            lobby::CreateNickname {
                nickname: Bytes::from_static(b"Newbie"),
                char_id: 1,
                mouth_serial_id: 2,
                face_serial_id: 3,
                val0: 0,
            }
            .write(w)
        })
        .await;

    let frame = client.recv_command(id::LOGIN_OK).await;
    let ok = lobby::LoginOk::read(&mut Reader::new(frame.payload)).unwrap();
    assert_eq!(&ok.name[..], b"Newbie");
}

#[tokio::test]
async fn malformed_frame_drops_the_connection() {
    let server = start_server().await;
    let stream = TcpStream::connect(server.lobby_addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();

    use tokio::io::AsyncWriteExt;
    // Header with bit 15 clear: not a valid magic.
    write_half.write_all(&[0u8; 8]).await.unwrap();

    let mut client = TestClient {
        reader: FrameReader::new(read_half),
        writer: FrameWriter::new(write_half),
        scrambler: Scrambler::new(),
    };
    client.expect_closed().await;
}

#[tokio::test]
async fn room_list_shows_created_rooms() {
    let server = start_server().await;
    server.source.add_user_with_character("rider", "token-1", "Rider");

    let mut client = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut client, "rider", "token-1").await;
    let (room_uid, _otp) = make_room(&mut client, "friday derby", 4, 1).await;

    client
        .send(id::ROOM_LIST, |w| {
            lobby::RoomList {
                page: 0,
                game_mode: 1,
                team_mode: 1,
            }
            .write(w)
        })
        .await;
    let frame = client.recv_command(id::ROOM_LIST_OK).await;
    let list = lobby::RoomListOk::read(&mut Reader::new(frame.payload)).unwrap();

    assert_eq!(list.rooms.len(), 1);
    assert_eq!(list.rooms[0].uid, room_uid);
    assert_eq!(&list.rooms[0].name[..], b"friday derby");
    assert_eq!(list.rooms[0].max_player_count, 4);
    assert_eq!(list.rooms[0].has_started, 0);
}

#[tokio::test]
async fn make_and_enter_room_hands_off_via_otp() {
    let server = start_server().await;
    let master_uid = server
        .source
        .add_user_with_character("rider", "token-1", "Rider");
    let joiner_uid = server
        .source
        .add_user_with_character("chaser", "token-2", "Chaser");

    // The master makes a 4-player room and enters the race tier.
    let mut master_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut master_lobby, "rider", "token-1").await;
    let (room_uid, master_otp) = make_room(&mut master_lobby, "friday derby", 4, 1).await;

    let mut master_race = TestClient::connect(server.race_addr).await;
    let ok = enter_race_room(&mut master_race, master_uid, room_uid, master_otp).await;
    assert_eq!(ok.room_uid, room_uid);
    assert_eq!(ok.racers.len(), 1);
    assert_eq!(ok.racers[0].is_master, 1);
    assert_eq!(&ok.description.name[..], b"friday derby");

    // The second player asks the lobby for the room, then joins.
    let mut joiner_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut joiner_lobby, "chaser", "token-2").await;
    joiner_lobby
        .send(id::ENTER_ROOM, |w| {
            lobby::EnterRoom {
                room_uid,
                password: Bytes::new(),
                member3: 0,
            }
            .write(w)
        })
        .await;
    let frame = joiner_lobby.recv_command(id::ENTER_ROOM_OK).await;
    let lobby_ok = lobby::EnterRoomOk::read(&mut Reader::new(frame.payload)).unwrap();
    assert_eq!(lobby_ok.room_uid, room_uid);
    assert_eq!(lobby_ok.race_port, server.race_addr.port());

    let mut joiner_race = TestClient::connect(server.race_addr).await;
    let ok = enter_race_room(
        &mut joiner_race,
        joiner_uid,
        room_uid,
        lobby_ok.one_time_password,
    )
    .await;
    assert_eq!(ok.racers.len(), 2);

    // The master hears about the join.
    let frame = master_race.recv_command(id::RACE_ENTER_ROOM_NOTIFY).await;
    assert!(!frame.payload.is_empty());
}

#[tokio::test]
async fn otp_cannot_be_replayed() {
    let server = start_server().await;
    let master_uid = server
        .source
        .add_user_with_character("rider", "token-1", "Rider");

    let mut master_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut master_lobby, "rider", "token-1").await;
    let (room_uid, otp) = make_room(&mut master_lobby, "friday derby", 4, 1).await;

    let mut race_client = TestClient::connect(server.race_addr).await;
    enter_race_room(&mut race_client, master_uid, room_uid, otp).await;

    // A second connection replaying the same code is refused.
    let mut replayer = TestClient::connect(server.race_addr).await;
    replayer
        .send(id::RACE_ENTER_ROOM, |w| {
            race::EnterRoom {
                character_uid: master_uid,
                one_time_password: otp,
                room_uid,
            }
            .write(w)
        })
        .await;
    let frame = replayer.recv_command(id::RACE_ENTER_ROOM_CANCEL).await;
    assert_eq!(frame.payload[0], 10, "expected an auth error status");
}

/// Drives a 2-player room through a full race where only one racer
/// finishes; the finish timeout settles the scoreboard.
#[tokio::test]
async fn race_with_timeout_produces_a_scoreboard() {
    let server = start_server().await;
    let master_uid = server
        .source
        .add_user_with_character("rider", "token-1", "Rider");
    let joiner_uid = server
        .source
        .add_user_with_character("chaser", "token-2", "Chaser");

    let mut master_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut master_lobby, "rider", "token-1").await;
    let (room_uid, master_otp) = make_room(&mut master_lobby, "friday derby", 4, 1).await;

    let mut master_race = TestClient::connect(server.race_addr).await;
    enter_race_room(&mut master_race, master_uid, room_uid, master_otp).await;

    let mut joiner_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut joiner_lobby, "chaser", "token-2").await;
    joiner_lobby
        .send(id::ENTER_ROOM, |w| {
            lobby::EnterRoom {
                room_uid,
                password: Bytes::new(),
                member3: 0,
            }
            .write(w)
        })
        .await;
    let frame = joiner_lobby.recv_command(id::ENTER_ROOM_OK).await;
    let lobby_ok = lobby::EnterRoomOk::read(&mut Reader::new(frame.payload)).unwrap();

    let mut joiner_race = TestClient::connect(server.race_addr).await;
    enter_race_room(
        &mut joiner_race,
        joiner_uid,
        room_uid,
        lobby_ok.one_time_password,
    )
    .await;

    // Master starts; both clients get the countdown and report loaded.
    master_race.send(id::START_RACE, |w| race::StartRace::default().write(w)).await;
    master_race.recv_command(id::ROOM_COUNTDOWN).await;
    joiner_race.recv_command(id::ROOM_COUNTDOWN).await;

    master_race.send(id::LOADING_COMPLETE, |_| {}).await;
    joiner_race.send(id::LOADING_COMPLETE, |_| {}).await;

    // Both loaded: the race goes live.
    master_race.recv_command(id::USER_RACE_COUNTDOWN).await;

    // Seeding follows uid order, so the master (created first) is oid 1.
    master_race
        .send(id::USER_RACE_FINAL, |w| {
            race::UserRaceFinal {
                oid: 1,
                course_time: 60_000,
            }
            .write(w)
        })
        .await;

    // The other racer never finishes; the finish timeout fires and the
    // scoreboard goes out.
    let frame = master_race.recv_command(id::RACE_RESULT_NOTIFY).await;
    let result = race::RaceResultNotify::read(&mut Reader::new(frame.payload)).unwrap();

    assert_eq!(result.scores.len(), 2);
    assert_eq!(result.scores[0].uid, master_uid);
    assert_eq!(result.scores[0].course_time, 60_000);
    assert_eq!(result.scores[0].bitset & race::score_bits::CONNECTED, race::score_bits::CONNECTED);
    assert_eq!(result.scores[1].uid, joiner_uid);
    assert_eq!(result.scores[1].course_time, u32::MAX);

    // The joiner gets the same table.
    joiner_race.recv_command(id::RACE_RESULT_NOTIFY).await;
}

/// A bolt clears both the attacker's and the victim's held items and the
/// victim is notified of the strike.
#[tokio::test]
async fn bolt_strips_the_targets_held_item() {
    let server = start_server().await;
    let master_uid = server
        .source
        .add_user_with_character("rider", "token-1", "Rider");
    let joiner_uid = server
        .source
        .add_user_with_character("chaser", "token-2", "Chaser");

    let mut master_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut master_lobby, "rider", "token-1").await;
    // Magic mode room.
    let (room_uid, master_otp) = make_room(&mut master_lobby, "storm derby", 4, 2).await;

    let mut master_race = TestClient::connect(server.race_addr).await;
    enter_race_room(&mut master_race, master_uid, room_uid, master_otp).await;

    let mut joiner_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut joiner_lobby, "chaser", "token-2").await;
    joiner_lobby
        .send(id::ENTER_ROOM, |w| {
            lobby::EnterRoom {
                room_uid,
                password: Bytes::new(),
                member3: 0,
            }
            .write(w)
        })
        .await;
    let frame = joiner_lobby.recv_command(id::ENTER_ROOM_OK).await;
    let lobby_ok = lobby::EnterRoomOk::read(&mut Reader::new(frame.payload)).unwrap();

    let mut joiner_race = TestClient::connect(server.race_addr).await;
    enter_race_room(
        &mut joiner_race,
        joiner_uid,
        room_uid,
        lobby_ok.one_time_password,
    )
    .await;

    master_race.send(id::START_RACE, |w| race::StartRace::default().write(w)).await;
    master_race.recv_command(id::ROOM_COUNTDOWN).await;
    master_race.send(id::LOADING_COMPLETE, |_| {}).await;
    joiner_race.send(id::LOADING_COMPLETE, |_| {}).await;
    master_race.recv_command(id::USER_RACE_COUNTDOWN).await;

    // Both racers draw a magic item.
    master_race
        .send(id::REQUEST_MAGIC_ITEM, |w| {
            race::RequestMagicItem {
                character_oid: 1,
                member2: 0,
            }
            .write(w)
        })
        .await;
    master_race.recv_command(id::REQUEST_MAGIC_ITEM_OK).await;

    joiner_race
        .send(id::REQUEST_MAGIC_ITEM, |w| {
            race::RequestMagicItem {
                character_oid: 2,
                member2: 0,
            }
            .write(w)
        })
        .await;
    joiner_race.recv_command(id::REQUEST_MAGIC_ITEM_OK).await;

    // The master casts a bolt; auto-targeting picks the joiner.
    master_race
        .send(id::USE_MAGIC_ITEM, |w| {
            race::UseMagicItem {
                character_oid: 1,
                magic_item_id: race::MAGIC_ITEM_BOLT,
                bolt: Some(race::BoltPayload::default()),
            }
            .write(w)
        })
        .await;
    master_race.recv_command(id::USE_MAGIC_ITEM_OK).await;

    // The victim sees the strike against their own oid.
    let hit = loop {
        let frame = joiner_race.recv_command(id::USE_MAGIC_ITEM_NOTIFY).await;
        let notify = race::UseMagicItemNotify::read(&mut Reader::new(frame.payload)).unwrap();
        if notify.character_oid == 2 {
            break notify;
        }
    };
    assert_eq!(hit.magic_item_id, race::MAGIC_ITEM_BOLT);

    // Both held items are gone: both racers can draw again.
    joiner_race
        .send(id::REQUEST_MAGIC_ITEM, |w| {
            race::RequestMagicItem {
                character_oid: 2,
                member2: 0,
            }
            .write(w)
        })
        .await;
    joiner_race.recv_command(id::REQUEST_MAGIC_ITEM_OK).await;

    master_race
        .send(id::REQUEST_MAGIC_ITEM, |w| {
            race::RequestMagicItem {
                character_oid: 1,
                member2: 0,
            }
            .write(w)
        })
        .await;
    master_race.recv_command(id::REQUEST_MAGIC_ITEM_OK).await;
}

/// A lone racer still walks the whole Waiting -> Loading -> Racing ->
/// Finishing ladder, with the load timeout covering the silent client.
#[tokio::test]
async fn single_racer_race_advances_through_all_stages() {
    let server = start_server().await;
    let master_uid = server
        .source
        .add_user_with_character("rider", "token-1", "Rider");

    let mut master_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut master_lobby, "rider", "token-1").await;
    let (room_uid, master_otp) = make_room(&mut master_lobby, "solo run", 4, 1).await;

    let mut master_race = TestClient::connect(server.race_addr).await;
    enter_race_room(&mut master_race, master_uid, room_uid, master_otp).await;

    master_race.send(id::START_RACE, |w| race::StartRace::default().write(w)).await;
    master_race.recv_command(id::ROOM_COUNTDOWN).await;
    master_race.send(id::LOADING_COMPLETE, |_| {}).await;
    master_race.recv_command(id::USER_RACE_COUNTDOWN).await;

    master_race
        .send(id::USER_RACE_FINAL, |w| {
            race::UserRaceFinal {
                oid: 1,
                course_time: 61_500,
            }
            .write(w)
        })
        .await;

    let frame = master_race.recv_command(id::RACE_RESULT_NOTIFY).await;
    let result = race::RaceResultNotify::read(&mut Reader::new(frame.payload)).unwrap();
    assert_eq!(result.scores.len(), 1);
    assert_eq!(result.scores[0].course_time, 61_500);
}

/// Claiming another racer's oid is desync or cheating; the server drops
/// the offender.
#[tokio::test]
async fn acting_for_another_oid_disconnects() {
    let server = start_server().await;
    let master_uid = server
        .source
        .add_user_with_character("rider", "token-1", "Rider");

    let mut master_lobby = TestClient::connect(server.lobby_addr).await;
    login_ok(&mut master_lobby, "rider", "token-1").await;
    let (room_uid, master_otp) = make_room(&mut master_lobby, "solo run", 4, 1).await;

    let mut master_race = TestClient::connect(server.race_addr).await;
    enter_race_room(&mut master_race, master_uid, room_uid, master_otp).await;

    master_race.send(id::START_RACE, |w| race::StartRace::default().write(w)).await;
    master_race.recv_command(id::ROOM_COUNTDOWN).await;
    master_race.send(id::LOADING_COMPLETE, |_| {}).await;
    master_race.recv_command(id::USER_RACE_COUNTDOWN).await;

    // Wrong oid on a star point claim.
    master_race
        .send(id::STAR_POINT_GET, |w| {
            race::StarPointGet {
                character_oid: 42,
                gained_star_points: 1000,
            }
            .write(w)
        })
        .await;
    master_race.expect_closed().await;
}
