use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn teamwatch(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_teamwatch"));
    command
        .env("TEAMWATCH_CONFIG", dir.join("missing-config.toml"))
        .env_remove("TEAMWATCH_SERVER")
        .env_remove("TEAMWATCH_LOG_DIR")
        .env_remove("TEAMWATCH_DEBUG_LOG");
    command
}

fn write_login(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("login.json");
    let login = json!({
        "data": {
            "user": {"agentCode": "S1", "agentName": "Sam", "teamId": "t-1", "teamName": "Support"},
            "teamData": [
                {"agentCode": "A1", "agentName": "Alice", "extension": "201"},
                {"agentCode": "A2", "agentName": "Bob"}
            ],
            "token": "tok-1"
        }
    });
    std::fs::write(&path, login.to_string()).expect("write login");
    path
}

#[test]
fn replay_prints_final_snapshot() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let login = write_login(temp_dir.path());
    let events = temp_dir.path().join("events.jsonl");
    std::fs::write(
        &events,
        [
            r#"{"event":"agent_connected","data":{"agentCode":"A1","timestamp":"2026-02-01T09:00:00Z"}}"#,
            r#"{"event":"agent_status_update","data":{"agentCode":"A1","status":"Busy","timestamp":"2026-02-01T09:05:00Z"}}"#,
            r#"{"event":"agent_status_update","data":{"agentCode":"X9","status":"Busy","timestamp":"2026-02-01T09:06:00Z"}}"#,
            r#"{"event":"new_message","data":{"fromCode":"A1","sender":"Alice","text":"hello"}}"#,
            r#"not a frame"#,
        ]
        .join("\n"),
    )
    .expect("write events");

    let output = teamwatch(temp_dir.path())
        .arg("replay")
        .arg("--login")
        .arg(&login)
        .arg("--events")
        .arg(&events)
        .output()
        .expect("run teamwatch");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let snapshot: Value = serde_json::from_slice(&output.stdout).expect("snapshot json");
    assert_eq!(snapshot["supervisor"]["supervisorCode"], json!("S1"));
    assert_eq!(snapshot["connected"], json!(false));
    assert_eq!(snapshot["agents"].as_array().map(Vec::len), Some(2));
    assert_eq!(snapshot["agents"][0]["isOnline"], json!(true));
    assert_eq!(snapshot["agents"][0]["currentStatus"], json!("Busy"));
    assert_eq!(snapshot["agents"][0]["extension"], json!("201"));
    assert_eq!(snapshot["agents"][1]["isOnline"], json!(false));
    assert_eq!(snapshot["messages"][0]["text"], json!("hello"));
    assert_eq!(snapshot["stats"]["unknownAgentEvents"], json!(1));
}

#[test]
fn invalid_login_exits_with_error() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let login = temp_dir.path().join("login.json");
    std::fs::write(&login, r#"{"user": {"agentName": "Sam"}, "teamData": []}"#)
        .expect("write login");
    let events = temp_dir.path().join("events.jsonl");
    std::fs::write(&events, "").expect("write events");

    let output = teamwatch(temp_dir.path())
        .arg("replay")
        .arg("--login")
        .arg(&login)
        .arg("--events")
        .arg(&events)
        .output()
        .expect("run teamwatch");
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn watch_follows_server_and_sends_messages() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let login = write_login(temp_dir.path());
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("addr").to_string();

    let (server_tx, server_rx) = mpsc::channel::<Value>();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut writer = stream.try_clone().expect("clone");
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            let frame: Value = serde_json::from_str(&line).expect("client frame");
            if frame["event"] == json!("join") {
                writer
                    .write_all(
                        b"{\"event\":\"agent_connected\",\"data\":{\"agentCode\":\"A1\",\"timestamp\":\"2026-02-01T09:00:00Z\"}}\n",
                    )
                    .expect("push presence");
            }
            if server_tx.send(frame).is_err() {
                break;
            }
            line.clear();
        }
    });

    let mut child = teamwatch(temp_dir.path())
        .arg("watch")
        .arg("--login")
        .arg(&login)
        .arg("--server")
        .arg(&address)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn teamwatch");

    let stdout = child.stdout.take().expect("stdout");
    let (line_tx, line_rx) = mpsc::channel::<Value>();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if let Ok(value) = serde_json::from_str::<Value>(&line) {
                if line_tx.send(value).is_err() {
                    break;
                }
            }
        }
    });

    let join = server_rx.recv_timeout(WAIT).expect("join frame");
    assert_eq!(join["data"]["supervisorCode"], json!("S1"));
    assert_eq!(join["data"]["token"], json!("tok-1"));

    loop {
        let snapshot = line_rx.recv_timeout(WAIT).expect("snapshot line");
        if snapshot["connected"] == json!(true) && snapshot["agents"][0]["isOnline"] == json!(true)
        {
            break;
        }
    }

    let mut stdin = child.stdin.take().expect("stdin");
    stdin.write_all(b"on my way\n").expect("write message");
    stdin.flush().expect("flush");

    let sent = server_rx.recv_timeout(WAIT).expect("send_message frame");
    assert_eq!(sent["event"], json!("send_message"));
    assert_eq!(sent["data"]["text"], json!("on my way"));
    assert_eq!(sent["data"]["fromCode"], json!("S1"));

    stdin.write_all(b"/logout\n").expect("write logout");
    stdin.flush().expect("flush");
    let status = child.wait().expect("wait");
    assert!(status.success());
    let _ = server.join();
}
