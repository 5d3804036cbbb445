use std::{
    io::{Read, Write},
    net::TcpListener,
    path::{Path, PathBuf},
    process::{Command, Output},
    thread,
    time::{Duration, Instant},
};

fn launch_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_objcentric-launch"))
}

fn probe_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_objcentric-probe"))
}

fn run_launch(project: &Path, args: &[&str]) -> Output {
    Command::new(launch_bin())
        .args(args)
        .current_dir(project)
        .env_remove("HOST")
        .env_remove("PORT")
        .output()
        .expect("failed to execute objcentric-launch")
}

fn run_probe(args: &[&str]) -> Output {
    Command::new(probe_bin())
        .args(args)
        .output()
        .expect("failed to execute objcentric-probe")
}

fn describe(output: &Output) -> String {
    format!(
        "status={:?}\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn assert_exit_code(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "expected exit code {code}, got {}",
        describe(output)
    );
}

fn runnable_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("Cargo.toml"), "[workspace]\nmembers = []\n").unwrap();
    let entry = dir.path().join("crates/objcentric-server/src/main.rs");
    std::fs::create_dir_all(entry.parent().unwrap()).unwrap();
    std::fs::write(entry, "fn main() {}\n").unwrap();
    dir
}

#[test]
fn help_exits_zero_without_side_effects() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_launch(dir.path(), &["--help"]);
    assert_exit_code(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--host", "--port", "--workers", "--reload", "--log-level", "--docker"] {
        assert!(stdout.contains(flag), "usage must mention {flag}\n{stdout}");
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn unknown_flag_exits_one_with_usage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_launch(dir.path(), &["--frobnicate"]);
    assert_exit_code(&output, 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--frobnicate"), "{}", describe(&output));
    assert!(stderr.contains("Usage"), "{}", describe(&output));
}

#[test]
fn missing_files_fail_for_every_flag_combination() {
    let combinations: [&[&str]; 6] = [
        &[],
        &["--reload"],
        &["--docker"],
        &["--workers", "4"],
        &["--reload", "--docker", "--log-level", "debug"],
        &["--host", "127.0.0.1", "--port", "9000", "--dry-run"],
    ];

    for args in combinations {
        let empty = tempfile::tempdir().expect("tempdir");
        let output = run_launch(empty.path(), args);
        assert_exit_code(&output, 1);
        assert!(
            String::from_utf8_lossy(&output.stderr).contains("error"),
            "args {args:?}: {}",
            describe(&output)
        );
        assert!(!empty.path().join(".objcentric").exists(), "args {args:?}");
    }
}

#[test]
fn missing_entry_point_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("Cargo.toml"), "[workspace]\n").unwrap();

    let output = run_launch(dir.path(), &[]);
    assert_exit_code(&output, 1);
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("entry point"),
        "{}",
        describe(&output)
    );
    assert!(!dir.path().join(".objcentric").exists());
}

#[test]
fn zero_workers_is_rejected_before_building() {
    let project = runnable_project();
    let output = run_launch(project.path(), &["--workers", "0"]);
    assert_exit_code(&output, 1);
    assert!(!project.path().join(".objcentric").exists());
}

#[test]
fn dry_run_prints_the_default_server_command() {
    let project = runnable_project();
    let output = run_launch(project.path(), &["--dry-run"]);
    assert_exit_code(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("--host 0.0.0.0 --port 8000 --log-level info"),
        "{}",
        describe(&output)
    );
    assert!(!stdout.contains("--workers"), "{}", describe(&output));
    assert!(!project.path().join(".objcentric").exists());
}

#[test]
fn dry_run_forwards_multiple_workers() {
    let project = runnable_project();
    let output = run_launch(project.path(), &["--dry-run", "--workers", "4"]);
    assert_exit_code(&output, 0);
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("--workers 4"),
        "{}",
        describe(&output)
    );
}

#[test]
fn health_probe_fails_when_nothing_listens() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{port}");
    let output = run_probe(&["health", "--url", &url, "--timeout", "2"]);
    assert_exit_code(&output, 1);
}

#[test]
fn health_probe_fails_on_server_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf);
        let _ = stream.write_all(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
    });

    let output = run_probe(&["health", "--url", &url, "--timeout", "5"]);
    assert_exit_code(&output, 1);
    server.join().unwrap();
}

#[test]
fn health_probe_fails_when_docs_are_too_slow() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_secs(4));
        drop(stream);
    });

    let started = Instant::now();
    let output = run_probe(&["health", "--url", &url, "--timeout", "1"]);
    assert_exit_code(&output, 1);
    assert!(started.elapsed() < Duration::from_secs(4), "{}", describe(&output));
    server.join().unwrap();
}

#[test]
fn health_probe_passes_on_success() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf);
        let _ = stream.write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        );
    });

    let output = run_probe(&["health", "--url", &url]);
    assert_exit_code(&output, 0);
    server.join().unwrap();
}
