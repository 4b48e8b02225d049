// Copyright 2025 mqcert developers
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current config file version. Increment when making breaking changes.
const CONFIG_VERSION: u32 = 1;

/// Deployment-wide defaults for issued certificates.
///
/// Stored as `mqcert.toml` next to the certificates so a deployment pins its
/// subject fields once and every later issuance reuses them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Config file version for future migration support
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub subject: SubjectConfig,
    #[serde(default)]
    pub ca: CaConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

/// Subject name fields shared by every certificate in the deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_locality")]
    pub locality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaConfig {
    #[serde(default = "default_ca_common_name")]
    pub common_name: String,
    #[serde(default = "default_ca_organization")]
    pub organization: String,
    /// Validity of the root certificate in days
    #[serde(default = "default_ca_days")]
    pub days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_common_name")]
    pub common_name: String,
    #[serde(default = "default_server_organization")]
    pub organization: String,
    #[serde(default = "default_leaf_days")]
    pub days: u32,
    /// Identities the broker certificate is valid for (DNS names or IPs)
    #[serde(default = "default_server_sans")]
    pub sans: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_organization")]
    pub organization: String,
    #[serde(default = "default_leaf_days")]
    pub days: u32,
}

fn default_country() -> String {
    "VN".into()
}

fn default_state() -> String {
    "Hanoi".into()
}

fn default_locality() -> String {
    "Hanoi".into()
}

fn default_ca_common_name() -> String {
    "MyRootCA".into()
}

fn default_ca_organization() -> String {
    "MyIoT-CA".into()
}

fn default_server_common_name() -> String {
    "emqx.local".into()
}

fn default_server_organization() -> String {
    "MyIoT-Server".into()
}

fn default_client_organization() -> String {
    "MyIoT-Client".into()
}

fn default_ca_days() -> u32 {
    3650
}

fn default_leaf_days() -> u32 {
    365
}

fn default_server_sans() -> Vec<String> {
    vec!["localhost".into(), "emqx.local".into(), "127.0.0.1".into()]
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            state: default_state(),
            locality: default_locality(),
        }
    }
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            common_name: default_ca_common_name(),
            organization: default_ca_organization(),
            days: default_ca_days(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            common_name: default_server_common_name(),
            organization: default_server_organization(),
            days: default_leaf_days(),
            sans: default_server_sans(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            organization: default_client_organization(),
            days: default_leaf_days(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            subject: SubjectConfig::default(),
            ca: CaConfig::default(),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
        } else {
            Self::default()
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        use crate::cert::validate_days;

        if self.config_version > CONFIG_VERSION {
            eprintln!(
                "Warning: mqcert.toml version {} is newer than supported version {}.",
                self.config_version, CONFIG_VERSION
            );
            eprintln!("         Some settings may not be recognized. Consider upgrading mqcert.");
        }

        validate_days(self.ca.days)?;
        validate_days(self.server.days)?;
        validate_days(self.client.days)?;

        if self.server.sans.is_empty() {
            return Err(Error::Config(
                "server.sans must list at least one DNS name or IP".into(),
            ));
        }

        if self.ca.common_name.is_empty() {
            return Err(Error::Config("ca.common_name cannot be empty".into()));
        }
        if self.server.common_name.is_empty() {
            return Err(Error::Config("server.common_name cannot be empty".into()));
        }

        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// File locations for the CA and issued certificates.
#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
    pub ca_key: PathBuf,
    pub ca_cert: PathBuf,
    pub config: PathBuf,
}

/// Default output directory, relative to the working directory.
pub const DEFAULT_CERT_DIR: &str = "certs";

impl Paths {
    /// Resolve the output directory: explicit `--dir` flag, then the
    /// `MQCERT_DIR` environment variable, then `./certs`.
    pub fn new(dir: Option<&Path>) -> Result<Self> {
        let base = match dir {
            Some(d) => d.to_path_buf(),
            None => match std::env::var_os("MQCERT_DIR") {
                Some(custom) => PathBuf::from(custom),
                None => PathBuf::from(DEFAULT_CERT_DIR),
            },
        };

        Ok(Self {
            ca_key: base.join("ca.key"),
            ca_cert: base.join("ca.crt"),
            config: base.join("mqcert.toml"),
            base,
        })
    }

    /// Sanitize a certificate name for safe use in file paths.
    fn sanitize_name(name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "name cannot be empty".into(),
            });
        }

        if name.contains('\0') {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "name contains null byte".into(),
            });
        }

        if name.contains("..") {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "name contains path traversal sequence".into(),
            });
        }

        if name.contains('/') || name.contains('\\') {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "name contains path separator".into(),
            });
        }

        if name.starts_with('.') || name.ends_with('.') {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "name cannot start or end with a dot".into(),
            });
        }

        for c in name.chars() {
            if !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_' {
                return Err(Error::InvalidName {
                    name: name.to_string(),
                    reason: format!("name contains invalid character: '{}'", c),
                });
            }
        }

        Ok(name.to_string())
    }

    pub fn cert_path(&self, name: &str) -> Result<PathBuf> {
        let safe_name = Self::sanitize_name(name)?;
        Ok(self.base.join(format!("{}.crt", safe_name)))
    }

    pub fn key_path(&self, name: &str) -> Result<PathBuf> {
        let safe_name = Self::sanitize_name(name)?;
        Ok(self.base.join(format!("{}.key", safe_name)))
    }

    pub fn ensure_dir(&self) -> Result<()> {
        if !self.base.exists() {
            std::fs::create_dir_all(&self.base).map_err(|e| Error::CreateDir {
                path: self.base.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn ca_exists(&self) -> bool {
        self.ca_key.exists() && self.ca_cert.exists()
    }

    /// Ensure certificate exists and return the path
    pub fn ensure_cert_exists(&self, name: &str) -> Result<PathBuf> {
        let cert_path = self.cert_path(name)?;
        if !cert_path.exists() {
            return Err(Error::CertificateNotFound {
                name: name.to_string(),
            });
        }
        Ok(cert_path)
    }
}
