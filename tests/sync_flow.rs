use assert_cmd::prelude::*;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;
use std::sync::{Arc, Mutex};

fn rutero_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("rutero"))
}

fn run_ok(home: &tempfile::TempDir, args: &[&str]) {
    let mut cmd = rutero_cmd();
    cmd.env("RUTERO_HOME", home.path());
    cmd.args(args);
    cmd.assert().success();
}

fn run_ok_out(home: &tempfile::TempDir, args: &[&str]) -> String {
    let mut cmd = rutero_cmd();
    cmd.env("RUTERO_HOME", home.path());
    cmd.args(args);
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).expect("utf8 stdout")
}

const TOKEN: &str = "tok-e2e-123";

#[derive(Default)]
struct StubState {
    snapshot: Option<String>,
    /// When set, every authenticated endpoint answers 401.
    expire_sessions: bool,
}

/// Minimal single-threaded HTTP stub implementing the sync API:
/// POST /api/login, GET /api/sync, POST /api/sync. Runs on localhost
/// with an ephemeral port; the thread dies with the test process.
fn spawn_stub(state: Arc<Mutex<StubState>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            handle_conn(stream, &state);
        }
    });

    format!("http://{addr}")
}

fn handle_conn(stream: TcpStream, state: &Mutex<StubState>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut stream = stream;

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }

    let mut content_length = 0usize;
    let mut authorized = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).is_err() {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(v) = lower.strip_prefix("content-length:") {
            content_length = v.trim().parse().unwrap_or(0);
        }
        if lower == format!("authorization: bearer {}", TOKEN.to_ascii_lowercase()) {
            authorized = true;
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 && reader.read_exact(&mut body).is_err() {
        return;
    }
    let body = String::from_utf8_lossy(&body).to_string();

    let expired = state.lock().expect("stub lock").expire_sessions;

    if request_line.starts_with("POST /api/login") {
        if body.contains("\"password\":\"secret\"") {
            respond(
                &mut stream,
                "200 OK",
                &format!("{{\"token\":\"{TOKEN}\"}}"),
            );
        } else {
            respond(&mut stream, "401 Unauthorized", "{\"error\":\"bad login\"}");
        }
        return;
    }

    if !authorized || expired {
        respond(&mut stream, "401 Unauthorized", "{\"error\":\"expired\"}");
        return;
    }

    if request_line.starts_with("GET /api/sync") {
        let snapshot = state.lock().expect("stub lock").snapshot.clone();
        match snapshot {
            Some(json) => respond(&mut stream, "200 OK", &json),
            None => respond(&mut stream, "200 OK", "null"),
        }
        return;
    }

    if request_line.starts_with("POST /api/sync") {
        state.lock().expect("stub lock").snapshot = Some(body);
        respond(&mut stream, "200 OK", "{\"ok\":true}");
        return;
    }

    respond(&mut stream, "404 Not Found", "{\"error\":\"no route\"}");
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

#[test]
fn two_homes_share_a_ledger_through_the_remote_store() {
    let home_a = tempfile::tempdir().expect("tempdir home_a");
    let home_b = tempfile::tempdir().expect("tempdir home_b");

    let state = Arc::new(Mutex::new(StubState::default()));
    let url = spawn_stub(state.clone());

    println!("[sync_flow] logging in both homes against {url}");
    run_ok(
        &home_a,
        &["login", "--url", &url, "--user", "driver", "--password", "secret"],
    );
    run_ok(
        &home_b,
        &["login", "--url", &url, "--user", "driver", "--password", "secret"],
    );

    // First pull on A: remote has nothing yet.
    let out = run_ok_out(&home_a, &["sync", "pull"]);
    assert!(out.contains("remote empty"), "pull output: {out}");

    // A records a trip; the post-mutation push uploads the snapshot.
    println!("[sync_flow] recording trip on home A");
    run_ok(
        &home_a,
        &[
            "trip", "add", "--date", "2024-06-10", "--client", "Centro", "--price", "5000",
            "--km", "12",
        ],
    );
    assert!(
        state.lock().expect("stub lock").snapshot.is_some(),
        "trip add should have pushed a snapshot"
    );

    // B pulls and sees A's trip.
    println!("[sync_flow] pulling on home B");
    let out = run_ok_out(&home_b, &["sync", "pull"]);
    assert!(out.contains("pulled\t1 trips"), "pull output: {out}");

    let out = run_ok_out(
        &home_b,
        &["report", "--from", "2024-06-01", "--to", "2024-06-30"],
    );
    assert!(out.contains("Centro"), "report output: {out}");
    assert!(out.contains("income\t5000"), "report output: {out}");

    println!("[sync_flow] complete");
}

#[test]
fn explicit_push_uploads_the_local_snapshot() {
    let home = tempfile::tempdir().expect("tempdir");
    let state = Arc::new(Mutex::new(StubState::default()));
    let url = spawn_stub(state.clone());

    run_ok(
        &home,
        &["login", "--url", &url, "--user", "driver", "--password", "secret"],
    );
    run_ok(&home, &["sync", "pull"]);
    run_ok(
        &home,
        &[
            "expense", "add", "--date", "2024-06-10", "--concept", "Gasolina", "--amount",
            "1500",
        ],
    );

    let out = run_ok_out(&home, &["sync", "push"]);
    assert!(out.contains("pushed"), "push output: {out}");

    let snapshot = state
        .lock()
        .expect("stub lock")
        .snapshot
        .clone()
        .expect("uploaded snapshot");
    assert!(snapshot.contains("\"gastos\""), "snapshot: {snapshot}");
    assert!(snapshot.contains("Gasolina"), "snapshot: {snapshot}");
}

#[test]
fn push_refuses_empty_ledger_before_first_pull() {
    let home = tempfile::tempdir().expect("tempdir");
    let state = Arc::new(Mutex::new(StubState::default()));
    let url = spawn_stub(state);

    run_ok(
        &home,
        &["login", "--url", &url, "--user", "driver", "--password", "secret"],
    );

    let mut cmd = rutero_cmd();
    cmd.env("RUTERO_HOME", home.path());
    cmd.args(["sync", "push"]);
    let out = cmd.assert().failure().get_output().stderr.clone();
    let err = String::from_utf8(out).expect("utf8 stderr");
    assert!(err.contains("Refusing to overwrite"), "stderr: {err}");
}

#[test]
fn expired_session_drops_the_token_and_keeps_local_data() {
    let home = tempfile::tempdir().expect("tempdir");
    let state = Arc::new(Mutex::new(StubState::default()));
    let url = spawn_stub(state.clone());

    run_ok(
        &home,
        &["login", "--url", &url, "--user", "driver", "--password", "secret"],
    );
    run_ok(&home, &["sync", "pull"]);
    run_ok(
        &home,
        &[
            "trip", "add", "--date", "2024-06-10", "--price", "5000", "--km", "12",
        ],
    );

    state.lock().expect("stub lock").expire_sessions = true;

    let mut cmd = rutero_cmd();
    cmd.env("RUTERO_HOME", home.path());
    cmd.args(["sync", "pull"]);
    let out = cmd.assert().failure().get_output().stderr.clone();
    let err = String::from_utf8(out).expect("utf8 stderr");
    assert!(err.contains("Session expired"), "stderr: {err}");

    // Token gone, local records intact.
    let out = run_ok_out(&home, &["sync", "status"]);
    assert!(out.contains("token\t<not set>"), "status output: {out}");
    assert!(out.contains("local_trips\t1"), "status output: {out}");

    let out = run_ok_out(
        &home,
        &["report", "--from", "2024-06-01", "--to", "2024-06-30"],
    );
    assert!(out.contains("income\t5000"), "report output: {out}");
}

#[test]
fn wrong_password_is_rejected() {
    let home = tempfile::tempdir().expect("tempdir");
    let state = Arc::new(Mutex::new(StubState::default()));
    let url = spawn_stub(state);

    let mut cmd = rutero_cmd();
    cmd.env("RUTERO_HOME", home.path());
    cmd.args(["login", "--url", &url, "--user", "driver", "--password", "nope"]);
    let out = cmd.assert().failure().get_output().stderr.clone();
    let err = String::from_utf8(out).expect("utf8 stderr");
    assert!(err.contains("Invalid credentials"), "stderr: {err}");
}
