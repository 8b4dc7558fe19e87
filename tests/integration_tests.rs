//! Integration tests for the party server
//!
//! These tests start a real server on an ephemeral port and talk to it over
//! TCP exactly like a game client would.

use server::network::SharedState;
use server::{Server, ServerConfig, ServerError};
use shared::protocol::{ArenaSnapshot, BallGameSnapshot};
use shared::{LobbyPhase, ServerInfo};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

struct TestServer {
    addr: SocketAddr,
    state: SharedState,
    handle: JoinHandle<Result<(), ServerError>>,
}

async fn start_server(config: ServerConfig) -> TestServer {
    let config = ServerConfig { port: 0, ..config };
    let server = Server::bind(&config).await.expect("bind test server");
    let addr = server.local_addr().unwrap();
    let state = server.state();
    let handle = tokio::spawn(server.run());
    TestServer {
        addr,
        state,
        handle,
    }
}

/// A scripted client speaking the text protocol.
struct Probe {
    stream: TcpStream,
    greeting: String,
}

impl Probe {
    async fn connect(addr: SocketAddr) -> Probe {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let greeting = read_reply(&mut stream).await;
        Probe { stream, greeting }
    }

    /// Connects and sends the display name.
    async fn join(addr: SocketAddr, name: &str) -> Probe {
        let mut probe = Probe::connect(addr).await;
        probe.send(name).await;
        probe
    }

    async fn send(&mut self, message: &str) {
        self.stream
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .expect("write");
    }

    async fn request(&mut self, message: &str) -> String {
        self.send(message).await;
        read_reply(&mut self.stream).await
    }

    /// True once the server closed the connection.
    async fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 64];
        matches!(
            timeout(REPLY_TIMEOUT, self.stream.read(&mut buf)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}

async fn read_reply(stream: &mut TcpStream) -> String {
    let mut buf = [0u8; 4096];
    let len = timeout(REPLY_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("reply timed out")
        .expect("read");
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

/// Polls the shared state until `check` holds or a second went by.
async fn wait_for(state: &SharedState, check: impl Fn(&server::Orchestrator) -> bool) -> bool {
    for _ in 0..100 {
        if check(&*state.read().await) {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    #[tokio::test]
    async fn connection_receives_incrementing_keys() {
        let server = start_server(ServerConfig::default()).await;

        let first = Probe::join(server.addr, "alice").await;
        let second = Probe::join(server.addr, "bob").await;

        assert_eq!(first.greeting, "1");
        assert_eq!(second.greeting, "2");
        server.handle.abort();
    }

    #[tokio::test]
    async fn set_character_shows_in_server_info() {
        let server = start_server(ServerConfig::default()).await;
        let mut client = Probe::join(server.addr, "alice").await;

        assert_eq!(client.request(r#"{"set_perso": "luiji"}"#).await, "ok");
        let reply = client.request("infos_serveur").await;
        let info: ServerInfo = serde_json::from_str(&reply).expect("server info JSON");

        let key = client.greeting.parse::<u32>().unwrap();
        let me = &info.joueurs[&shared::PlayerKey(key)];
        assert_eq!(me.perso, "luiji");
        assert_eq!(me.pseudo, "alice");
        assert_eq!(me.argent, 0);
        assert!(!me.ia);
        assert_eq!(info.nb_joueurs, 1);
        assert_eq!(info.mini_jeu, "");
        server.handle.abort();
    }

    #[tokio::test]
    async fn global_commands_and_errors() {
        let server = start_server(ServerConfig::default()).await;
        let mut client = Probe::join(server.addr, "alice").await;

        assert_eq!(client.request("get_etat").await, "character_select");
        assert_eq!(client.request("sing").await, "not_found");
        assert_eq!(
            client.request(r#"{"set_perso": "bowsa"}"#).await,
            "invalid_input"
        );
        assert_eq!(client.request("close").await, "closing");
        assert!(client.is_closed().await);
        server.handle.abort();
    }

    #[tokio::test]
    async fn fifth_player_is_rejected() {
        let server = start_server(ServerConfig::default()).await;
        let mut players = Vec::new();
        for name in ["a", "b", "c", "d"] {
            players.push(Probe::join(server.addr, name).await);
        }

        let mut late = Probe::connect(server.addr).await;

        assert_eq!(late.greeting, "lobby_full");
        assert!(late.is_closed().await);
        server.handle.abort();
    }

    #[tokio::test]
    async fn disconnect_frees_lobby_slot() {
        let server = start_server(ServerConfig::default()).await;
        let mut players = Vec::new();
        for name in ["a", "b", "c", "d"] {
            players.push(Probe::join(server.addr, name).await);
        }

        drop(players.remove(1));
        assert!(wait_for(&server.state, |o| o.registry().len() == 3).await);

        let replacement = Probe::join(server.addr, "e").await;
        assert_eq!(replacement.greeting, "5");
        server.handle.abort();
    }

    #[tokio::test]
    async fn lobby_closes_once_everyone_is_ready() {
        let server = start_server(ServerConfig::default()).await;
        let mut client = Probe::join(server.addr, "alice").await;

        assert_eq!(client.request("ready_for_next_state").await, "ok");
        assert!(
            wait_for(&server.state, |o| o.lobby_phase() == LobbyPhase::MinigameSelect).await
        );
        assert_eq!(server.state.read().await.registry().len(), 4);

        let late = Probe::connect(server.addr).await;
        assert_eq!(late.greeting, "lobby_closed");
        server.handle.abort();
    }
}

/// SESSION TESTS
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn idle_server_shuts_down() {
        let server = start_server(ServerConfig {
            idle_timeout: Duration::from_millis(200),
            ..ServerConfig::default()
        })
        .await;

        let result = timeout(Duration::from_secs(3), server.handle)
            .await
            .expect("server did not stop on its own")
            .expect("server task panicked");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn dropped_player_is_taken_over_by_ai() {
        let server = start_server(ServerConfig::default()).await;
        let mut client = Probe::join(server.addr, "alice").await;
        let key = shared::PlayerKey(client.greeting.parse().unwrap());

        client.request("ready_for_next_state").await;
        assert!(wait_for(&server.state, |o| o.active().is_some()).await);
        drop(client);

        assert!(
            wait_for(&server.state, |o| o
                .registry()
                .get(&key)
                .map_or(false, |p| p.is_ai && !p.connected))
            .await
        );
        let state = server.state.read().await;
        let game = state.active().expect("minigame running");
        assert!(game.core().seat(&key).unwrap().is_ai);
        drop(state);
        server.handle.abort();
    }

    #[tokio::test]
    async fn input_returns_minigame_snapshot() {
        let server = start_server(ServerConfig::default()).await;
        let mut client = Probe::join(server.addr, "alice").await;
        client.request(r#"{"set_perso": "yochi"}"#).await;

        let mut phase = String::new();
        for _ in 0..200 {
            phase = client.request("get_etat").await;
            if phase == "minigame_during" {
                break;
            }
            client.request("ready_for_next_state").await;
            sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(phase, "minigame_during");

        let info: ServerInfo =
            serde_json::from_str(&client.request("infos_serveur").await).unwrap();
        let reply = client.request("0|1").await;

        if info.mini_jeu == "ball_game" {
            let snapshot: BallGameSnapshot = serde_json::from_str(&reply).unwrap();
            assert_eq!(snapshot.joueurs.len(), 4);
            assert!(snapshot.temps_restant <= 60);
        } else {
            let snapshot: ArenaSnapshot = serde_json::from_str(&reply).unwrap();
            assert_eq!(snapshot.joueurs.len(), 4);
            assert!(snapshot.temps_restant <= 60);
        }

        assert_eq!(client.request("2|x").await, "invalid_input");
        assert_eq!(client.request("desactive_son_but").await, "ok");
        server.handle.abort();
    }

    #[tokio::test]
    async fn batched_messages_get_one_reply_each() {
        let server = start_server(ServerConfig::default()).await;
        let mut client = Probe::connect(server.addr).await;

        client.send("alice\nget_etat").await;
        assert_eq!(read_reply(&mut client.stream).await, "character_select");
        server.handle.abort();
    }
}
