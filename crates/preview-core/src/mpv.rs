/// `PlaybackEngine` backed by an mpv child process over its JSON IPC.
///
/// ```text
///   MpvEngine ── ensure_connected() ── MpvDriver::spawn_and_connect()
///                                          │
///                                          ├── writer_task  ← IpcRequest via mpsc → socket
///                                          └── reader_task  ← JSON lines from socket
///                                                 ├── reply (request_id) → oneshot
///                                                 └── property-change   → translate_task
///                                                                           └── EngineEvent
/// ```
///
/// mpv is spawned lazily on the first `load`, so a missing binary only
/// surfaces once the user actually asks for audio.
///
/// Platform notes:
/// - Unix:   Unix domain socket
/// - Windows: Named pipe  \\.\pipe\<name>
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

use crate::engine::{EngineEvent, EngineState, PlaybackEngine};
use crate::error::EngineError;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const IPC_TIMEOUT: tokio::time::Duration = tokio::time::Duration::from_secs(5);

// observe_property ids
const OBS_PAUSE: u64 = 1;
const OBS_IDLE: u64 = 2;
const OBS_EOF: u64 = 3;
const OBS_TIME_POS: u64 = 4;
const OBS_DURATION: u64 = 5;

type Reply = oneshot::Sender<Result<Value, EngineError>>;
type PendingMap = Arc<Mutex<HashMap<u64, Reply>>>;

struct IpcRequest {
    req_id: u64,
    payload: String,
    reply: Reply,
}

// ── handle ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct MpvHandle {
    tx: mpsc::Sender<IpcRequest>,
}

impl MpvHandle {
    async fn send(&self, command: Value) -> Result<Value, EngineError> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let mut payload = json!({ "command": command, "request_id": req_id }).to_string();
        payload.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(IpcRequest {
                req_id,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::Unavailable("mpv writer task gone".into()))?;

        tokio::time::timeout(IPC_TIMEOUT, reply_rx)
            .await
            .map_err(|_| EngineError::Command(format!("mpv IPC timeout for req={}", req_id)))?
            .map_err(|_| EngineError::Unavailable(format!("mpv reply dropped req={}", req_id)))?
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<(), EngineError> {
        self.send(json!(["set_property", name, value])).await?;
        Ok(())
    }

    async fn get_bool(&self, name: &str) -> Result<bool, EngineError> {
        let resp = self.send(json!(["get_property", name])).await?;
        Ok(resp["data"].as_bool().unwrap_or(false))
    }

    async fn observe_properties(&self) {
        let props = [
            (OBS_PAUSE, "pause"),
            (OBS_IDLE, "idle-active"),
            (OBS_EOF, "eof-reached"),
            (OBS_TIME_POS, "time-pos"),
            (OBS_DURATION, "duration"),
        ];
        for (id, name) in props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    fn new() -> Self {
        Self {
            socket_name: preview_proto::platform::mpv_socket_name(),
            process: None,
        }
    }

    fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("mpv process exited: {}", status);
                false
            }
            Err(e) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
        }
    }

    fn command(&self, volume: f32) -> Result<tokio::process::Command, EngineError> {
        let binary = preview_proto::platform::find_mpv_binary()
            .ok_or_else(|| EngineError::Unavailable("mpv binary not found".into()))?;

        let mut cmd = tokio::process::Command::new(binary);
        cmd.arg("--no-video")
            .arg("--idle=yes")
            .arg("--keep-open=yes")
            .arg("--quiet")
            .arg(format!(
                "--volume={}",
                (volume * 100.0).clamp(0.0, 100.0).round() as i64
            ))
            .arg(preview_proto::platform::mpv_socket_arg())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }

    #[cfg(unix)]
    async fn spawn_and_connect(
        &mut self,
        volume: f32,
        event_tx: mpsc::Sender<Value>,
    ) -> Result<MpvHandle, EngineError> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        info!("mpv: spawning new process");
        let child = self
            .command(volume)?
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("failed to spawn mpv: {}", e)))?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            return Err(EngineError::Unavailable(
                "mpv IPC socket did not appear".into(),
            ));
        }

        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| EngineError::Unavailable(format!("mpv IPC connect: {}", e)))?;
        info!("mpv: connected to IPC socket");

        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    async fn spawn_and_connect(
        &mut self,
        volume: f32,
        event_tx: mpsc::Sender<Value>,
    ) -> Result<MpvHandle, EngineError> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        info!("mpv: spawning new process");
        let child = self
            .command(volume)?
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("failed to spawn mpv: {}", e)))?;
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        Err(EngineError::Unavailable(
            "mpv named pipe did not appear".into(),
        ))
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<Value>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<IpcRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, Arc::clone(&pending)));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn fail_all(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(EngineError::Unavailable(reason.to_string())));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<Value>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(Value::as_u64) {
                    let Some(tx) = pending.lock().await.remove(&req_id) else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                        continue;
                    };
                    let status = val["error"].as_str().unwrap_or("unknown error").to_string();
                    let result = if status == "success" {
                        Ok(val)
                    } else {
                        debug!("mpv reader: response req={} err={}", req_id, status);
                        Err(EngineError::Command(status))
                    };
                    let _ = tx.send(result);
                } else if event_tx.send(val).await.is_err() {
                    debug!("mpv reader: event consumer gone");
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<IpcRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can always match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(EngineError::Unavailable(format!("mpv write error: {}", e))));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── property translation ──────────────────────────────────────────────────────

/// Folds mpv property changes into `EngineEvent`s.  Playing means unpaused,
/// not idle and not parked at the end of the file.
#[derive(Debug)]
struct PropertyTracker {
    pause: bool,
    idle: bool,
    eof: bool,
    last_state: EngineState,
}

impl Default for PropertyTracker {
    fn default() -> Self {
        Self {
            pause: true,
            idle: true,
            eof: false,
            last_state: EngineState::Stopped,
        }
    }
}

impl PropertyTracker {
    fn apply(&mut self, raw: &Value) -> Vec<EngineEvent> {
        if raw.get("event").and_then(Value::as_str) != Some("property-change") {
            return Vec::new();
        }
        let Some(id) = raw.get("id").and_then(Value::as_u64) else {
            return Vec::new();
        };
        let data = raw.get("data").unwrap_or(&Value::Null);

        let mut events = Vec::new();
        match id {
            OBS_PAUSE => self.pause = data.as_bool().unwrap_or(true),
            OBS_IDLE => self.idle = data.as_bool().unwrap_or(true),
            OBS_EOF => self.eof = data.as_bool().unwrap_or(false),
            OBS_TIME_POS => {
                if let Some(secs) = data.as_f64() {
                    events.push(EngineEvent::PositionChanged {
                        position_ms: secs_to_ms(secs),
                    });
                }
            }
            OBS_DURATION => {
                if let Some(secs) = data.as_f64() {
                    events.push(EngineEvent::DurationChanged {
                        duration_ms: secs_to_ms(secs),
                    });
                }
            }
            _ => {}
        }

        let state = if !self.pause && !self.idle && !self.eof {
            EngineState::Playing
        } else {
            EngineState::Stopped
        };
        if state != self.last_state {
            debug!("mpv: state {:?} → {:?}", self.last_state, state);
            self.last_state = state;
            events.push(EngineEvent::StateChanged(state));
        }
        events
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

async fn translate_task(mut raw_rx: mpsc::Receiver<Value>, events: mpsc::Sender<EngineEvent>) {
    let mut tracker = PropertyTracker::default();
    while let Some(raw) = raw_rx.recv().await {
        for event in tracker.apply(&raw) {
            if events.send(event).await.is_err() {
                debug!("mpv: engine event consumer gone");
                return;
            }
        }
    }
    debug!("mpv: translate task exiting");
}

// ── engine ────────────────────────────────────────────────────────────────────

pub struct MpvEngine {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    volume: f32,
    events: mpsc::Sender<EngineEvent>,
}

impl MpvEngine {
    /// `events` receives the engine's state / duration / position changes.
    pub fn new(volume: f32, events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            driver: MpvDriver::new(),
            handle: None,
            volume,
            events,
        }
    }

    async fn ensure_connected(&mut self) -> Result<MpvHandle, EngineError> {
        if let Some(handle) = &self.handle {
            if self.driver.process_alive() {
                return Ok(handle.clone());
            }
            warn!("mpv: process died, respawning");
            self.handle = None;
        }

        let (raw_tx, raw_rx) = mpsc::channel(256);
        let handle = self.driver.spawn_and_connect(self.volume, raw_tx).await?;
        tokio::spawn(translate_task(raw_rx, self.events.clone()));
        handle.observe_properties().await;

        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Handle for commands that make no sense before anything was loaded.
    fn connected(&self) -> Result<&MpvHandle, EngineError> {
        self.handle
            .as_ref()
            .ok_or_else(|| EngineError::Unavailable("mpv not started".into()))
    }
}

#[async_trait]
impl PlaybackEngine for MpvEngine {
    async fn load(&mut self, url: &str) -> Result<(), EngineError> {
        let handle = self.ensure_connected().await?;
        handle.set_property("pause", json!(true)).await?;
        debug!("mpv: loadfile {}", url);
        handle.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    async fn play(&mut self) -> Result<(), EngineError> {
        let handle = self.connected()?;
        if handle.get_bool("eof-reached").await.unwrap_or(false) {
            handle.set_property("time-pos", json!(0.0)).await?;
        }
        handle.set_property("pause", json!(false)).await
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        let handle = self.connected()?;
        handle.set_property("pause", json!(true)).await?;
        if let Err(e) = handle.set_property("time-pos", json!(0.0)).await {
            debug!("mpv: rewind after stop failed: {}", e);
        }
        Ok(())
    }

    async fn set_position(&mut self, position_ms: u64) -> Result<(), EngineError> {
        // No player process means nothing is loaded; mpv clamps the rest.
        let Some(handle) = self.handle.as_ref() else {
            debug!("mpv: seek to {} ms before anything was loaded", position_ms);
            return Ok(());
        };
        handle
            .set_property("time-pos", json!(position_ms as f64 / 1000.0))
            .await
    }
}
