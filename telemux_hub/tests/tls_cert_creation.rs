use assert_cmd::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use std::time::Instant;

fn expected_paths(config_home: &std::path::Path) -> (PathBuf, PathBuf) {
    let base = config_home.join("telemux_hub").join("tls");
    (base.join("cert.pem"), base.join("key.pem"))
}

#[test]
fn generates_self_signed_cert_and_key_in_xdg_path() {
    // Create an isolated fake XDG_CONFIG_HOME
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let xdg = tmpdir.path().to_path_buf();

    // Run the hub once with --enable-ssl; it is killed as soon as the files appear
    let mut cmd = Command::cargo_bin("telemux_hub").expect("binary exists");
    // Bind to an ephemeral port (-p 0) to avoid conflicts/flakes
    cmd.env("XDG_CONFIG_HOME", &xdg)
        .arg("--enable-ssl")
        .arg("-p")
        .arg("0");

    // Spawn the process and poll for cert generation
    let mut child = cmd.spawn().expect("spawn hub");

    // Poll up to ~3s for files to appear to avoid timing flakes
    let (cert_path, key_path) = expected_paths(&xdg);
    let start = Instant::now();
    let timeout = Duration::from_millis(3000);
    let interval = Duration::from_millis(50);
    while start.elapsed() < timeout {
        if cert_path.exists() && key_path.exists() {
            break;
        }
        std::thread::sleep(interval);
    }

    // Terminate the process regardless
    let _ = child.kill();
    let _ = child.wait();

    // Verify files exist at expected paths
    assert!(
        cert_path.exists(),
        "cert not found at {}",
        cert_path.display()
    );
    assert!(key_path.exists(), "key not found at {}", key_path.display());

    // Both are PEM
    let cert = fs::read_to_string(&cert_path).expect("read cert");
    let key = fs::read_to_string(&key_path).expect("read key");
    assert!(cert.contains("BEGIN CERTIFICATE"), "cert is not PEM");
    assert!(key.contains("PRIVATE KEY"), "key is not PEM");
}
