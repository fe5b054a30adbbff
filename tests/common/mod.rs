use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// The hermetic HOME the case ran under, for asserting on files the
    /// run did (or did not) create.
    #[allow(dead_code)]
    pub home: PathBuf,
    #[allow(dead_code)]
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_dsh") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "dsh.exe" } else { "dsh" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve dsh binary path for integration test"),
    }
}

/// Run the dsh binary with a hermetic HOME and per-case output format,
/// capturing stdout/stderr into a per-case log file.
pub fn run_cli_case(case_name: &str, args: &[&str], output_format: &str) -> CmdResult {
    run_cli_case_with_stdin(case_name, args, output_format, None)
}

pub fn run_cli_case_with_stdin(
    case_name: &str,
    args: &[&str],
    output_format: &str,
    stdin_payload: Option<&[u8]>,
) -> CmdResult {
    let root = std::env::temp_dir().join("dsh-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    // Isolated HOME so the run never touches the developer's real config
    // or activity log.
    let home = root.join(format!("home-{}-{}", sanitize(case_name), now_millis()));
    fs::create_dir_all(&home).expect("create temp home dir");

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("HOME", &home)
        .env("DSH_OUTPUT_FORMAT", output_format)
        .env("RUST_BACKTRACE", "1");

    let output = if let Some(payload) = stdin_payload {
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        let mut child = command.spawn().expect("spawn dsh command");
        child
            .stdin
            .as_mut()
            .expect("child stdin")
            .write_all(payload)
            .expect("write stdin payload");
        child.wait_with_output().expect("wait for dsh command")
    } else {
        command.stdin(Stdio::null());
        command.output().expect("execute dsh command")
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        home,
        log_path,
    }
}
