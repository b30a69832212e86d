/// End-to-end tests: run snippets through the `xmd` binary and compare its
/// output.
///
/// Scripts are piped to `xmd run -` and documents to `xmd process -`.  A
/// config file under a temporary directory is always passed with `-c` so the
/// user's own `xmdrc` never leaks into a run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `xmd` binary built by this Cargo workspace.
fn xmd_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_xmd"))
}

/// Run `xmd -c<config> <args>` with `stdin` piped in.
fn run_xmd(config: &Path, args: &[&str], stdin: &str) -> Output {
    let mut cmd = Command::new(xmd_binary());
    cmd.arg(format!("-c{}", config.display()))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("XMD_MAX_LOOP_ITERATIONS")
        .env_remove("XMD_ALLOW_FILE_ACCESS")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().expect("failed to spawn xmd binary");
    {
        let stdin_pipe = child.stdin.as_mut().expect("stdin not open");
        stdin_pipe.write_all(stdin.as_bytes()).expect("write to stdin");
    }
    child.wait_with_output().expect("wait failed")
}

struct Env {
    dir: tempfile::TempDir,
    config: PathBuf,
}

fn env_with(config: &str) -> Env {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("xmdrc");
    std::fs::write(&path, config).expect("write config");
    Env { dir, config: path }
}

fn env() -> Env {
    env_with("")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

/// Run a script and check stdout and a successful exit.
fn check(script: &str, expected: &str) {
    let e = env();
    let out = run_xmd(&e.config, &["run", "-"], script);
    assert!(
        out.status.success(),
        "\nscript:\n{script}\nstderr:\n{}",
        stderr(&out)
    );
    assert_eq!(stdout(&out), expected, "\nscript:\n{script}");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn hello_world() {
    check("set name = \"World\"\nprint(\"Hello \" + name)", "Hello World\n");
}

#[test]
fn loops_and_functions() {
    check(
        "function square(n)\n    return n * n\nfor i in 1..3\n    print(square(i))",
        "1\n4\n9\n",
    );
}

#[test]
fn process_document_from_stdin() {
    let e = env();
    let doc = "# Report\n<!-- xmd: set total = 3 * 4 -->Total: {{total}}\n";
    let out = run_xmd(&e.config, &["process", "-"], doc);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "# Report\nTotal: 12\n");
}

#[test]
fn process_to_output_file() {
    let e = env();
    let input = e.dir.path().join("in.md");
    let output = e.dir.path().join("out.md");
    std::fs::write(&input, "<!-- xmd: set x = 2 -->x is {{x}}").unwrap();
    let out = run_xmd(
        &e.config,
        &["process", input.to_str().unwrap(), "-o", output.to_str().unwrap()],
        "",
    );
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "");
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "x is 2");
}

#[test]
fn evaluation_error_exits_nonzero_but_keeps_output() {
    let e = env();
    let out = run_xmd(&e.config, &["run", "-"], "print(\"before\")\nthrow \"broken\"\n");
    assert!(!out.status.success());
    assert_eq!(stdout(&out), "before\n");
    assert!(stderr(&out).contains("broken"), "{}", stderr(&out));
}

#[test]
fn config_file_limits_loops() {
    let e = env_with("max_loop_iterations = 3\n");
    let out = run_xmd(&e.config, &["run", "-"], "loop 5 times { print(\"x\") }\n");
    assert!(!out.status.success());
    assert_eq!(stdout(&out), "x\nx\nx\n");
}

#[test]
fn config_command_prints_effective_settings() {
    let e = env_with("allow_file_access = false\n");
    let out = run_xmd(&e.config, &["config"], "");
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("allow_file_access = false"), "{text}");
    assert!(text.contains("max_loop_iterations = 10000"), "{text}");
}

#[test]
fn validate_reports_errors() {
    let e = env();
    let out = run_xmd(&e.config, &["validate", "-"], "ok\n<!-- xmd:\nfunction (x)\n-->\n");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("-:3:"), "{}", stderr(&out));

    let out = run_xmd(&e.config, &["validate", "-"], "<!-- xmd: set x = 1 -->\n");
    assert!(out.status.success(), "{}", stderr(&out));
}

#[test]
fn version_and_usage() {
    let e = env();
    let out = run_xmd(&e.config, &["version"], "");
    assert_eq!(stdout(&out), format!("xmd {}\n", env!("CARGO_PKG_VERSION")));

    let out = run_xmd(&e.config, &["-z"], "");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("unknown option: -z"));
}

#[test]
fn missing_input_file() {
    let e = env();
    let out = run_xmd(&e.config, &["process", "/no/such/file.md"], "");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("/no/such/file.md"));
}
