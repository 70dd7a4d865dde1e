//! CLI arg parsing tests for telemux (viewer)
use std::process::Command;

fn run(args: &[&str]) -> (bool, String) {
    let out = Command::new(env!("CARGO_BIN_EXE_telemux"))
        .args(args)
        .output()
        .expect("run telemux");
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    (out.status.success(), text)
}

#[test]
fn test_help_mentions_short_and_long_flags() {
    let (ok, text) = run(&["--help"]);
    assert!(ok);
    assert!(
        text.contains("--tls-ca") && text.contains("-t") && text.contains("--action") && text.contains("--reconnect"),
        "help text missing expected flags (--tls-ca/-t, --action, --reconnect)\n{text}"
    );
}

#[test]
fn test_tls_ca_arg_long_and_short_parsed() {
    // Combine with --help to exercise arg acceptance without a network
    let (ok, text) = run(&["--tls-ca", "/tmp/cert.pem", "--help"]);
    assert!(ok, "telemux --tls-ca … --help did not succeed");
    assert!(text.contains("Usage:"));
    let (ok2, text2) = run(&["-t", "/tmp/cert.pem", "--help"]);
    assert!(ok2, "telemux -t … --help did not succeed");
    assert!(text2.contains("Usage:"));
}

#[test]
fn test_malformed_action_is_rejected() {
    let (ok, text) = run(&["--action", "restart", "ws://127.0.0.1:1/ws"]);
    assert!(!ok);
    assert!(text.contains("ACTION:NAME"), "unexpected output: {text}");
}

#[test]
fn test_wss_without_ca_fails_fast() {
    let (ok, text) = run(&["wss://127.0.0.1:1/ws"]);
    assert!(!ok);
    assert!(text.contains("--tls-ca"), "unexpected output: {text}");
}
