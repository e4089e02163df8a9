//! Common test utilities for kuzco integration tests.
//!
//! Provides `TestEnv` for isolated runs that never read the user's own
//! dotfile or environment, and `FakeOllama`, a tiny HTTP server that
//! answers the two endpoints kuzco uses.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::Command;
pub use tempfile::TempDir;

/// Setting names cleared from the child environment.
const SETTING_VARS: &[&str] = &[
    "SAFE_MODE",
    "CREATE_BACKUPS",
    "MAX_PREVIEW_SIZE",
    "COMMAND_TIMEOUT",
    "DEFAULT_MODEL",
    "MAX_EDIT_SIZE",
    "BACKUP_DIR",
    "EXIT_COMMANDS",
    "SUDO_PREFIXES",
    "OLLAMA_HOST",
];

/// A port nothing listens on, so an unconfigured run fails fast.
pub const UNREACHABLE_HOST: &str = "http://127.0.0.1:9";

/// A test environment with an isolated home and working directory.
///
/// - `home_dir`: `HOME`/`XDG_CONFIG_HOME`, and the dotfile location
/// - `work_dir`: the child's current directory (where `.env` is read)
pub struct TestEnv {
    pub home_dir: TempDir,
    pub work_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            home_dir: TempDir::new().unwrap(),
            work_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the kuzco binary with a scrubbed environment.
    pub fn kuzco(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_kuzco"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("HOME", self.home_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.home_dir.path());
        cmd.env("KUZCO_CONFIG", self.config_path());
        for var in SETTING_VARS {
            cmd.env_remove(var);
        }
        cmd.env_remove("KUZCO_LOG");
        cmd.env("OLLAMA_HOST", UNREACHABLE_HOST);
        cmd
    }

    pub fn path(&self) -> &Path {
        self.work_dir.path()
    }

    /// Where the child looks for `config.toml`.
    pub fn config_path(&self) -> PathBuf {
        self.home_dir.path().join("config.toml")
    }

    pub fn write_config(&self, toml: &str) {
        std::fs::write(self.config_path(), toml).unwrap();
    }

    /// Write a file into the working directory.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.work_dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.work_dir.path().join(name)).unwrap()
    }

    /// Names in the working directory ending in `.bak`, sorted.
    pub fn backups(&self) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(self.work_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "bak"))
            .collect();
        found.sort();
        found
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-process stand-in for an Ollama server.
///
/// Serves `GET /api/tags` from a fixed model list and answers each
/// `POST /api/chat` with the next queued reply, streamed as NDJSON.
pub struct FakeOllama {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeOllama {
    pub fn start(models: &[&str], replies: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let models: Vec<String> = models.iter().map(|m| m.to_string()).collect();
        let replies: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(
            replies.iter().map(|r| r.to_string()).collect(),
        ));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                handle(stream, &models, &replies, &seen);
            }
        });

        Self { url, requests }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bodies of every chat request received so far.
    pub fn chat_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle(
    mut stream: TcpStream,
    models: &[String],
    replies: &Mutex<VecDeque<String>>,
    seen: &Mutex<Vec<String>>,
) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).unwrap_or(0) == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    let _ = reader.read_exact(&mut body);

    let (status, content_type, payload) = if request_line.starts_with("GET /api/tags") {
        let models: Vec<_> = models
            .iter()
            .map(|name| serde_json::json!({ "name": name, "size": 1024 }))
            .collect();
        (
            "200 OK",
            "application/json",
            serde_json::json!({ "models": models }).to_string(),
        )
    } else if request_line.starts_with("POST /api/chat") {
        seen.lock()
            .unwrap()
            .push(String::from_utf8_lossy(&body).into_owned());
        match replies.lock().unwrap().pop_front() {
            Some(reply) => {
                let mut ndjson = String::new();
                for piece in split_reply(&reply) {
                    let chunk = serde_json::json!({
                        "message": { "role": "assistant", "content": piece },
                        "done": false
                    });
                    ndjson.push_str(&chunk.to_string());
                    ndjson.push('\n');
                }
                ndjson.push_str("{\"done\":true}\n");
                ("200 OK", "application/x-ndjson", ndjson)
            }
            None => (
                "500 Internal Server Error",
                "application/json",
                "{\"error\":\"no reply queued\"}".to_string(),
            ),
        }
    } else {
        ("404 Not Found", "text/plain", "not found".to_string())
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        payload.len(),
        payload
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Split a reply into a few chunks the way a streaming model would.
fn split_reply(reply: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in reply.chars() {
        current.push(ch);
        if ch == '\n' || current.len() >= 16 {
            pieces.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
