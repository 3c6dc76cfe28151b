//! Shared fixtures: a fake ADB device on loopback and throwaway key pairs.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use adb_protocol::{AdbMessage, AuthType, Command, MessageHeader, HEADER_SIZE, MAX_PAYLOAD, VERSION};
use cec_adbd::config::MonitorConfig;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Challenge the fake device sends.
pub const TOKEN: [u8; 20] = [0x5a; 20];

/// Stream id the fake device assigns to the shell stream.
const REMOTE_ID: u32 = 42;

const BANNER: &[u8] = b"device::ro.product.name=fake;ro.product.model=Fake TV;\0";

/// How the fake device answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Accepts a valid signature; the shell prints nothing
    Accept,
    /// Accepts a valid signature; the shell prints the given text
    AcceptWithOutput(&'static str),
    /// Rejects every signature and never answers the public key
    RejectSignature,
    /// Rejects the signature but accepts the offered public key
    AcceptPublicKey,
    /// Never answers anything
    Silent,
    /// Authentication disabled: answers `CNXN` straight away
    NoAuth,
    /// Refuses to open the shell stream
    RefuseShell,
}

/// What the fake device observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Connect,
    Signature { valid: bool },
    PublicKey,
    Shell(String),
}

struct DeviceState {
    behavior: Mutex<Behavior>,
    public_key: RsaPublicKey,
    seen: Mutex<Vec<Seen>>,
    accepted: AtomicUsize,
    closed: AtomicUsize,
}

/// A scripted ADB device listening on `127.0.0.1`.
pub struct FakeDevice {
    port: u16,
    state: Arc<DeviceState>,
    task: tokio::task::JoinHandle<()>,
}

impl FakeDevice {
    pub async fn start(behavior: Behavior, public_key: RsaPublicKey) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(DeviceState {
            behavior: Mutex::new(behavior),
            public_key,
            seen: Mutex::new(Vec::new()),
            accepted: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        });

        let accept_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                let conn_state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    serve(stream, &conn_state).await;
                    conn_state.closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self { port, state, task }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.state.behavior.lock().unwrap() = behavior;
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.state.seen.lock().unwrap().clone()
    }

    pub fn clear_seen(&self) {
        self.state.seen.lock().unwrap().clear();
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// Connections the client has closed so far.
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Waits until `count` connections have been closed by the client.
    pub async fn wait_for_closed(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.closed() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} closed connections, saw {}", self.closed()));
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn record(state: &DeviceState, seen: Seen) {
    state.seen.lock().unwrap().push(seen);
}

async fn send(stream: &mut TcpStream, message: AdbMessage) -> Option<()> {
    stream.write_all(&message.encode()).await.ok()
}

async fn read_message(stream: &mut TcpStream) -> Option<AdbMessage> {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await.ok()?;
    let header = MessageHeader::decode(&header).ok()?;
    let mut payload = vec![0u8; header.payload_len()];
    stream.read_exact(&mut payload).await.ok()?;
    AdbMessage::from_parts(header, payload).ok()
}

/// Serves one connection until the client closes it.
async fn serve(mut stream: TcpStream, state: &DeviceState) {
    let banner = AdbMessage::new(Command::Cnxn, VERSION, MAX_PAYLOAD, BANNER.to_vec());
    let challenge = AdbMessage::auth(AuthType::Token, TOKEN.to_vec());

    while let Some(message) = read_message(&mut stream).await {
        let behavior = *state.behavior.lock().unwrap();
        let reply = match (message.command, message.auth_type()) {
            (Command::Cnxn, _) => {
                record(state, Seen::Connect);
                match behavior {
                    Behavior::Silent => None,
                    Behavior::NoAuth => Some(vec![banner.clone()]),
                    _ => Some(vec![challenge.clone()]),
                }
            }
            (Command::Auth, Some(AuthType::Signature)) => {
                let valid = state
                    .public_key
                    .verify(Pkcs1v15Sign::new::<Sha1>(), &TOKEN, &message.payload)
                    .is_ok();
                record(state, Seen::Signature { valid });
                let accepts = matches!(
                    behavior,
                    Behavior::Accept | Behavior::AcceptWithOutput(_) | Behavior::RefuseShell
                );
                if accepts && valid {
                    Some(vec![banner.clone()])
                } else {
                    Some(vec![challenge.clone()])
                }
            }
            (Command::Auth, Some(AuthType::RsaPublicKey)) => {
                record(state, Seen::PublicKey);
                match behavior {
                    Behavior::AcceptPublicKey => Some(vec![banner.clone()]),
                    _ => None,
                }
            }
            (Command::Open, _) => {
                let destination = message.payload_text();
                let command = destination
                    .strip_prefix("shell:")
                    .unwrap_or(&destination)
                    .to_string();
                record(state, Seen::Shell(command));

                let local = message.arg0;
                match behavior {
                    Behavior::RefuseShell => Some(vec![AdbMessage::close(0, local)]),
                    Behavior::AcceptWithOutput(text) => Some(vec![
                        AdbMessage::okay(REMOTE_ID, local),
                        AdbMessage::write(REMOTE_ID, local, text.as_bytes().to_vec()),
                        AdbMessage::close(REMOTE_ID, local),
                    ]),
                    _ => Some(vec![
                        AdbMessage::okay(REMOTE_ID, local),
                        AdbMessage::close(REMOTE_ID, local),
                    ]),
                }
            }
            _ => None,
        };

        for message in reply.into_iter().flatten() {
            if send(&mut stream, message).await.is_none() {
                return;
            }
        }
    }
}

struct KeyMaterial {
    private_pem: String,
    public_key: RsaPublicKey,
}

fn key_material() -> &'static KeyMaterial {
    static KEY: OnceLock<KeyMaterial> = OnceLock::new();
    KEY.get_or_init(|| {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let private_pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        KeyMaterial {
            private_pem,
            public_key: RsaPublicKey::from(&private),
        }
    })
}

/// A key pair written to `<dir>/adbkey` and `<dir>/adbkey.pub`.
pub struct TestKeys {
    pub dir: tempfile::TempDir,
    pub key_path: PathBuf,
}

impl TestKeys {
    pub fn new() -> Self {
        let material = key_material();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("adbkey");
        std::fs::write(&key_path, &material.private_pem).unwrap();
        std::fs::write(dir.path().join("adbkey.pub"), "QAAAAFakePublicKey= test@monitor\n").unwrap();
        Self { dir, key_path }
    }

    pub fn public_key(&self) -> RsaPublicKey {
        key_material().public_key.clone()
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.dir.path().join("adbkey.pub")
    }
}

/// Config pointing at `127.0.0.1:<port>` with short timeouts.
pub fn config(port: u16, keys: &TestKeys) -> MonitorConfig {
    MonitorConfig::builder()
        .address("127.0.0.1")
        .port(port)
        .key_path(&keys.key_path)
        .transport_timeout(Duration::from_secs(2))
        .auth_timeout(Duration::from_millis(100))
        .build()
        .unwrap()
}

/// A port nothing is listening on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
