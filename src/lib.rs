// Copyright 2025 mqcert developers
// SPDX-License-Identifier: Apache-2.0

//! Bootstrap a small mTLS PKI for an MQTT/IoT broker deployment.
//!
//! ```rust,no_run
//! use mqcert::{Ca, Cert, Config, Paths};
//!
//! let paths = Paths::new(None)?;
//! let config = Config::load(&paths.config)?;
//!
//! let ca = Ca::generate(&config, config.ca.days)?;
//! ca.save(&paths)?;
//!
//! let result = Cert::server(&ca, &config, &config.server.sans, config.server.days)?;
//! result.cert.save(&paths, "server")?;
//!
//! let result = Cert::client(&ca, &config, "mqtt-client", config.client.days)?;
//! result.cert.save(&paths, "mqtt-client")?;
//! # Ok::<(), mqcert::Error>(())
//! ```

/// Certificate Authority management.
pub mod ca;
/// Server and client certificate issuance.
pub mod cert;
/// Configuration and file locations.
pub mod config;
/// Error types.
pub mod error;
/// Filesystem utilities.
pub mod fs;
/// X.509 certificate parsing.
pub mod x509;

pub use ca::Ca;
pub use cert::{validate_days, validate_sans, Cert, CertGenerateResult, MAX_CERT_DAYS};
pub use config::{Config, Paths, DEFAULT_CERT_DIR};
pub use error::{Error, Result};
pub use fs::{is_reserved_name, write_secret_file, RESERVED_NAMES};
pub use x509::{parse_cert_file, parse_cert_pem, CertInfo, CertType};
