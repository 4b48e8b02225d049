//! Integration tests for the mqcert CLI
//!
//! These tests run the actual mqcert binary and verify its behavior.
//! Each test uses an isolated temp certificate directory via MQCERT_DIR.

use mqcert::{parse_cert_file, CertType};
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Create a test environment with an isolated certificate directory
struct TestEnv {
    /// Temporary directory that will be cleaned up on drop
    _temp_dir: TempDir,
    /// The directory where mqcert writes its files
    cert_dir: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cert_dir = temp_dir.path().join("certs");

        TestEnv {
            _temp_dir: temp_dir,
            cert_dir,
        }
    }

    /// Run mqcert with the isolated certificate directory
    fn run(&self, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_mqcert"))
            .args(args)
            .env("MQCERT_DIR", &self.cert_dir)
            .output()
            .expect("Failed to execute mqcert")
    }

    fn ca_cert_exists(&self) -> bool {
        self.cert_dir.join("ca.crt").exists()
    }

    fn ca_key_exists(&self) -> bool {
        self.cert_dir.join("ca.key").exists()
    }

    fn cert_exists(&self, name: &str) -> bool {
        self.cert_dir.join(format!("{}.crt", name)).exists()
    }

    fn key_exists(&self, name: &str) -> bool {
        self.cert_dir.join(format!("{}.key", name)).exists()
    }

    fn config_exists(&self) -> bool {
        self.cert_dir.join("mqcert.toml").exists()
    }

    fn cert_path(&self, name: &str) -> PathBuf {
        self.cert_dir.join(format!("{}.crt", name))
    }
}

// ============================================================================
// Test: mqcert ca
// ============================================================================

#[test]
fn test_ca_creates_key_and_cert() {
    let env = TestEnv::new();

    let output = env.run(&["ca"]);

    assert!(
        output.status.success(),
        "ca failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(env.ca_cert_exists(), "CA certificate was not created");
    assert!(env.ca_key_exists(), "CA key was not created");
    assert!(env.config_exists(), "Config file was not created");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("ca.crt"),
        "Output should mention the CA certificate path"
    );
}

#[test]
fn test_ca_is_self_signed_root() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());

    let info = parse_cert_file(&env.cert_path("ca")).expect("CA cert should parse");
    assert!(info.is_ca, "CA certificate should have CA:TRUE");
    assert!(info.is_self_signed(), "CA certificate should be self-signed");
    assert_eq!(info.common_name.as_deref(), Some("MyRootCA"));
}

#[test]
fn test_ca_refuses_to_overwrite_without_force() {
    let env = TestEnv::new();

    assert!(env.run(&["ca"]).status.success(), "First ca should succeed");

    let output = env.run(&["ca"]);
    assert!(
        !output.status.success(),
        "Second ca without --force should fail"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("already exists"),
        "Error should mention existing CA: {}",
        stderr
    );
}

#[test]
fn test_ca_force_regenerates() {
    let env = TestEnv::new();

    assert!(env.run(&["ca"]).status.success());
    let first = std::fs::read_to_string(env.cert_path("ca")).expect("CA cert readable");

    let output = env.run(&["ca", "--force"]);
    assert!(output.status.success(), "ca --force should succeed");

    let second = std::fs::read_to_string(env.cert_path("ca")).expect("CA cert readable");
    assert_ne!(first, second, "--force should generate a new CA certificate");
}

#[test]
fn test_ca_rejects_invalid_days() {
    let env = TestEnv::new();

    let output = env.run(&["ca", "--days", "0"]);
    assert!(!output.status.success(), "days=0 should be rejected");

    let output = env.run(&["ca", "--days", "99999"]);
    assert!(!output.status.success(), "days above max should be rejected");
    assert!(!env.ca_cert_exists(), "No CA should be written on failure");
}

// ============================================================================
// Test: mqcert server
// ============================================================================

#[test]
fn test_server_requires_ca() {
    let env = TestEnv::new();

    let output = env.run(&["server"]);
    assert!(!output.status.success(), "server without CA should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("mqcert ca"),
        "Error should tell the user to run 'mqcert ca' first: {}",
        stderr
    );
    assert!(!env.cert_exists("server"), "No server cert should be written");
}

#[test]
fn test_server_creates_cert_with_default_sans() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());

    let output = env.run(&["server"]);
    assert!(
        output.status.success(),
        "server failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(env.cert_exists("server"), "Server certificate was not created");
    assert!(env.key_exists("server"), "Server key was not created");

    let info = parse_cert_file(&env.cert_path("server")).expect("server cert should parse");
    assert!(!info.is_ca);
    assert!(!info.is_self_signed(), "Server cert must be CA-issued");
    assert_eq!(info.cert_type, CertType::Server);
    assert_eq!(info.issuer_common_name.as_deref(), Some("MyRootCA"));
    assert!(info.subject_alt_names.contains(&"localhost".to_string()));
    assert!(info.subject_alt_names.contains(&"emqx.local".to_string()));
    assert!(info.subject_alt_names.contains(&"127.0.0.1".to_string()));
}

#[test]
fn test_server_custom_sans() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());

    let output = env.run(&["server", "--san", "broker.internal", "--san", "10.0.0.5"]);
    assert!(
        output.status.success(),
        "server with custom SANs failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let info = parse_cert_file(&env.cert_path("server")).expect("server cert should parse");
    assert_eq!(
        info.subject_alt_names,
        vec!["broker.internal".to_string(), "10.0.0.5".to_string()]
    );
}

#[test]
fn test_server_refuses_to_overwrite_without_force() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());
    assert!(env.run(&["server"]).status.success());

    let output = env.run(&["server"]);
    assert!(
        !output.status.success(),
        "Second server without --force should fail"
    );

    let output = env.run(&["server", "--force"]);
    assert!(output.status.success(), "server --force should succeed");
}

// ============================================================================
// Test: mqcert client
// ============================================================================

#[test]
fn test_client_requires_ca() {
    let env = TestEnv::new();

    let output = env.run(&["client", "mqtt-client"]);
    assert!(!output.status.success(), "client without CA should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("mqcert ca"),
        "Error should tell the user to run 'mqcert ca' first: {}",
        stderr
    );
}

#[test]
fn test_client_creates_cert() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());

    let output = env.run(&["client", "mqtt-client"]);
    assert!(
        output.status.success(),
        "client failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(env.cert_exists("mqtt-client"));
    assert!(env.key_exists("mqtt-client"));

    let info = parse_cert_file(&env.cert_path("mqtt-client")).expect("client cert should parse");
    assert!(!info.is_ca);
    assert_eq!(info.cert_type, CertType::Client);
    assert_eq!(info.common_name.as_deref(), Some("mqtt-client"));
    assert_eq!(info.issuer_common_name.as_deref(), Some("MyRootCA"));
    assert!(
        info.subject_alt_names.is_empty(),
        "Client certs carry no SANs"
    );
}

#[test]
fn test_client_multiple_names() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());

    let output = env.run(&["client", "sensor-01", "sensor-02", "gateway"]);
    assert!(
        output.status.success(),
        "multi-client failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    for name in ["sensor-01", "sensor-02", "gateway"] {
        assert!(env.cert_exists(name), "{} cert missing", name);
        assert!(env.key_exists(name), "{} key missing", name);
    }
}

#[test]
fn test_client_rejects_reserved_name() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());

    let output = env.run(&["client", "ca"]);
    assert!(!output.status.success(), "client named 'ca' should fail");

    let output = env.run(&["client", "server"]);
    assert!(
        !output.status.success(),
        "client named 'server' should fail"
    );
}

#[test]
fn test_client_rejects_path_traversal_name() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());

    let output = env.run(&["client", "../evil"]);
    assert!(!output.status.success(), "path traversal name should fail");
}

// ============================================================================
// Test: status / list / inspect / chain / path
// ============================================================================

#[test]
fn test_status_before_and_after_init() {
    let env = TestEnv::new();

    let output = env.run(&["status"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("not initialized"));

    assert!(env.run(&["ca"]).status.success());
    assert!(env.run(&["server"]).status.success());

    let output = env.run(&["status"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("initialized"));
    assert!(stdout.contains("server.crt"));
}

#[test]
fn test_list_shows_types() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());
    assert!(env.run(&["server"]).status.success());
    assert!(env.run(&["client", "mqtt-client"]).status.success());

    let output = env.run(&["list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("server"));
    assert!(stdout.contains("mqtt-client"));
    assert!(stdout.contains("client"));
}

#[test]
fn test_list_requires_ca() {
    let env = TestEnv::new();

    let output = env.run(&["list"]);
    assert!(!output.status.success(), "list without CA should fail");
}

#[test]
fn test_inspect_server() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());
    assert!(env.run(&["server"]).status.success());

    let output = env.run(&["inspect", "server"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("serverAuth"));
    assert!(stdout.contains("emqx.local"));
    assert!(stdout.contains("MyRootCA"));
}

#[test]
fn test_inspect_missing_cert() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());

    let output = env.run(&["inspect", "nope"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_chain_concatenates_leaf_and_ca() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());
    assert!(env.run(&["server"]).status.success());

    let output = env.run(&["chain", "server"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    let cert_count = stdout.matches("BEGIN CERTIFICATE").count();
    assert_eq!(cert_count, 2, "Chain should contain leaf and CA");

    let server_pem =
        std::fs::read_to_string(env.cert_path("server")).expect("server cert readable");
    assert!(
        stdout.starts_with(server_pem.trim_end()),
        "Leaf certificate should come first in the chain"
    );
}

#[test]
fn test_chain_writes_output_file() {
    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());
    assert!(env.run(&["client", "mqtt-client"]).status.success());

    let out_path = env.cert_dir.join("bundle.pem");
    let output = env.run(&["chain", "mqtt-client", "--output", out_path.to_str().unwrap()]);
    assert!(output.status.success());

    let bundle = std::fs::read_to_string(&out_path).expect("bundle should be written");
    assert_eq!(bundle.matches("BEGIN CERTIFICATE").count(), 2);
}

#[test]
fn test_path_command() {
    let env = TestEnv::new();

    let output = env.run(&["path"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ca.crt"));
    assert!(stdout.contains("ca.key"));

    let output = env.run(&["path", "server"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("server.crt"));
    assert!(stdout.contains("server.key"));
}

// ============================================================================
// Test: --dir flag and key permissions
// ============================================================================

#[test]
fn test_dir_flag_overrides_env() {
    let env = TestEnv::new();
    let other_dir = env._temp_dir.path().join("elsewhere");

    let output = env.run(&["--dir", other_dir.to_str().unwrap(), "ca"]);
    assert!(
        output.status.success(),
        "ca with --dir failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(other_dir.join("ca.crt").exists());
    assert!(
        !env.ca_cert_exists(),
        "--dir should win over the MQCERT_DIR env var"
    );
}

#[cfg(unix)]
#[test]
fn test_key_files_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let env = TestEnv::new();
    assert!(env.run(&["ca"]).status.success());
    assert!(env.run(&["server"]).status.success());

    for key in ["ca.key", "server.key"] {
        let mode = std::fs::metadata(env.cert_dir.join(key))
            .expect("key metadata readable")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600, "{} should be mode 0600", key);
    }
}
