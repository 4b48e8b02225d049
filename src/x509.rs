// Copyright 2025 mqcert developers
// SPDX-License-Identifier: Apache-2.0

//! Parse X.509 certificates without shelling out to openssl.

use crate::error::{Error, Result};
use std::path::Path;
use x509_parser::prelude::*;

/// Certificate type based on Extended Key Usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertType {
    /// TLS server authentication (OID 1.3.6.1.5.5.7.3.1)
    Server,
    /// TLS client authentication (OID 1.3.6.1.5.5.7.3.2)
    Client,
    /// Unknown or no EKU (the CA itself carries none)
    Unknown,
}

#[derive(Debug, Clone)]
pub struct CertInfo {
    pub not_after_timestamp: i64,
    pub not_before_timestamp: i64,
    pub common_name: Option<String>,
    pub organization: Option<String>,
    pub issuer_common_name: Option<String>,
    pub subject_alt_names: Vec<String>,
    pub serial: String,
    pub is_ca: bool,
    /// Certificate type based on Extended Key Usage
    pub cert_type: CertType,
}

impl CertInfo {
    pub fn expiry_string(&self) -> String {
        match ::time::OffsetDateTime::from_unix_timestamp(self.not_after_timestamp) {
            Ok(dt) => format!("{}-{:02}-{:02}", dt.year(), dt.month() as u8, dt.day()),
            Err(_) => "Invalid date".to_string(),
        }
    }

    pub fn days_remaining(&self) -> i64 {
        let now = ::time::OffsetDateTime::now_utc();
        match ::time::OffsetDateTime::from_unix_timestamp(self.not_after_timestamp) {
            Ok(expiry) => (expiry - now).whole_days(),
            Err(_) => -1, // Treat invalid timestamps as expired
        }
    }

    pub fn is_expired(&self) -> bool {
        self.days_remaining() < 0
    }

    /// True when subject and issuer CN match, i.e. a root certificate.
    pub fn is_self_signed(&self) -> bool {
        self.common_name.is_some() && self.common_name == self.issuer_common_name
    }
}

pub fn parse_cert_file(path: &Path) -> Result<CertInfo> {
    let pem_data = std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_cert_pem(&pem_data)
}

pub fn parse_cert_pem(pem_str: &str) -> Result<CertInfo> {
    let pem = ::pem::parse(pem_str)
        .map_err(|e| Error::CertParse(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != "CERTIFICATE" {
        return Err(Error::CertParse(format!(
            "Expected CERTIFICATE, got {}",
            pem.tag()
        )));
    }

    let (_, cert) = X509Certificate::from_der(pem.contents())
        .map_err(|e| Error::CertParse(format!("Invalid X.509: {}", e)))?;

    let not_before_timestamp = cert.validity().not_before.timestamp();
    let not_after_timestamp = cert.validity().not_after.timestamp();

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);

    let organization = cert
        .subject()
        .iter_organization()
        .next()
        .and_then(|o| o.as_str().ok())
        .map(String::from);

    let issuer_common_name = cert
        .issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);

    let serial = cert.raw_serial_as_string();

    let mut subject_alt_names = Vec::new();
    let mut is_ca = false;
    let mut cert_type = CertType::Unknown;

    for ext in cert.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                for name in &san.general_names {
                    match name {
                        GeneralName::DNSName(dns) => subject_alt_names.push(dns.to_string()),
                        GeneralName::IPAddress(ip_bytes) if ip_bytes.len() == 4 => {
                            let ip = std::net::Ipv4Addr::new(
                                ip_bytes[0],
                                ip_bytes[1],
                                ip_bytes[2],
                                ip_bytes[3],
                            );
                            subject_alt_names.push(ip.to_string());
                        }
                        GeneralName::IPAddress(ip_bytes) if ip_bytes.len() == 16 => {
                            if let Ok(bytes) = <[u8; 16]>::try_from(*ip_bytes) {
                                subject_alt_names
                                    .push(std::net::Ipv6Addr::from(bytes).to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            ParsedExtension::BasicConstraints(bc) => {
                is_ca = bc.ca;
            }
            ParsedExtension::ExtendedKeyUsage(eku) => {
                if eku.client_auth {
                    cert_type = CertType::Client;
                } else if eku.server_auth {
                    cert_type = CertType::Server;
                }
            }
            _ => {}
        }
    }

    Ok(CertInfo {
        not_after_timestamp,
        not_before_timestamp,
        common_name,
        organization,
        issuer_common_name,
        subject_alt_names,
        serial,
        is_ca,
        cert_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::Ca;
    use crate::cert::Cert;
    use crate::config::Config;

    #[test]
    fn test_parse_server_cert() {
        let config = Config::default();
        let ca = Ca::generate(&config, 3650).unwrap();
        let result = Cert::server(&ca, &config, &config.server.sans, 365).unwrap();

        let info = parse_cert_pem(&result.cert.pem).unwrap();

        assert!(info.days_remaining() >= 364);
        assert!(info.days_remaining() <= 365);
        assert!(!info.is_expired());
        assert!(!info.is_ca);
        assert!(!info.is_self_signed());
        assert_eq!(info.common_name, Some("emqx.local".to_string()));
        assert_eq!(info.organization, Some("MyIoT-Server".to_string()));
        assert_eq!(info.cert_type, CertType::Server);
        assert!(!info.serial.is_empty());
    }

    #[test]
    fn test_parse_ca_cert() {
        let config = Config::default();
        let ca = Ca::generate(&config, 3650).unwrap();

        let info = parse_cert_pem(&ca.cert_pem).unwrap();

        assert!(info.days_remaining() >= 3649);
        assert_eq!(info.common_name, Some("MyRootCA".to_string()));
        assert_eq!(info.organization, Some("MyIoT-CA".to_string()));
        assert!(info.is_ca);
        assert!(info.is_self_signed());
    }

    #[test]
    fn test_parse_client_cert() {
        let config = Config::default();
        let ca = Ca::generate(&config, 3650).unwrap();
        let result = Cert::client(&ca, &config, "mqtt-client", 365).unwrap();

        let info = parse_cert_pem(&result.cert.pem).unwrap();

        assert_eq!(info.cert_type, CertType::Client);
        assert_eq!(info.common_name, Some("mqtt-client".to_string()));
        assert_eq!(info.organization, Some("MyIoT-Client".to_string()));
        assert!(info.subject_alt_names.is_empty());
        assert!(!info.is_ca);
    }

    #[test]
    fn test_san_entries_round_trip() {
        let config = Config::default();
        let ca = Ca::generate(&config, 3650).unwrap();
        let sans = vec![
            "broker.internal".to_string(),
            "10.0.0.5".to_string(),
            "::1".to_string(),
        ];
        let result = Cert::server(&ca, &config, &sans, 365).unwrap();

        let info = parse_cert_pem(&result.cert.pem).unwrap();

        assert!(info.subject_alt_names.contains(&"broker.internal".to_string()));
        assert!(info.subject_alt_names.contains(&"10.0.0.5".to_string()));
        assert!(info.subject_alt_names.contains(&"::1".to_string()));
    }

    #[test]
    fn test_expiry_string() {
        let config = Config::default();
        let ca = Ca::generate(&config, 30).unwrap();
        let info = parse_cert_pem(&ca.cert_pem).unwrap();

        let expiry = info.expiry_string();
        // Should be in YYYY-MM-DD format
        assert!(expiry.len() == 10);
        assert!(expiry.chars().nth(4) == Some('-'));
        assert!(expiry.chars().nth(7) == Some('-'));
    }

    #[test]
    fn test_parse_rejects_non_certificate_pem() {
        let config = Config::default();
        let ca = Ca::generate(&config, 30).unwrap();
        let key_pem = ca.key_pair.serialize_pem();

        let result = parse_cert_pem(&key_pem);
        assert!(matches!(result, Err(Error::CertParse(_))));
    }
}
