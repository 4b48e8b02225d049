// Copyright 2025 mqcert developers
// SPDX-License-Identifier: Apache-2.0

use crate::ca::Ca;
use crate::config::{Config, Paths};
use crate::error::{Error, Result};
use crate::fs::{atomic_write, atomic_write_secret};
use rcgen::{
    CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SanType,
};
use std::net::IpAddr;

/// A CA-signed leaf certificate with its private key.
pub struct Cert {
    /// The certificate in PEM format.
    pub pem: String,
    /// The private key in PEM format.
    pub key_pem: String,
    /// The identities covered: SAN entries for server certs, the
    /// common name for client certs.
    pub names: Vec<String>,
}

/// Result of certificate generation, including optional warnings.
pub struct CertGenerateResult {
    /// The generated certificate.
    pub cert: Cert,
    /// Warning message if the certificate outlives the CA or SAN entries
    /// were dropped.
    pub warning: Option<String>,
}

/// Maximum certificate validity period (10 years).
pub const MAX_CERT_DAYS: u32 = 3650;

/// Validate that the validity period is within allowed bounds.
///
/// # Errors
/// Returns an error if `days` is 0 or exceeds [`MAX_CERT_DAYS`].
pub fn validate_days(days: u32) -> Result<()> {
    if days == 0 {
        return Err(Error::InvalidDays("days cannot be 0".into()));
    }
    if days > MAX_CERT_DAYS {
        return Err(Error::InvalidDays(format!(
            "days cannot exceed {} (10 years)",
            MAX_CERT_DAYS
        )));
    }
    Ok(())
}

/// Check if a certificate with the given validity will outlive the CA.
/// Returns a warning message if so, None otherwise.
fn check_ca_expiry_warning(ca: &Ca, days: u32) -> Option<String> {
    ca.days_remaining().ok().and_then(|ca_days_remaining| {
        if (days as i64) > ca_days_remaining {
            Some(format!(
                "Certificate validity ({} days) exceeds CA's remaining validity ({} days). \
                 The certificate will become invalid when the CA expires.",
                days, ca_days_remaining
            ))
        } else {
            None
        }
    })
}

/// Certificate purpose, mapped to the extended key usage
#[derive(Debug, Clone, Copy)]
enum CertPurpose {
    Server,
    Client,
}

/// Internal parameters for unified leaf generation
struct CertGenParams<'a> {
    purpose: CertPurpose,
    common_name: &'a str,
    organization: &'a str,
    sans: &'a [String],
    days: u32,
}

/// Unified leaf certificate generation
fn generate_with_params(
    ca: &Ca,
    config: &Config,
    params: CertGenParams,
) -> Result<CertGenerateResult> {
    validate_days(params.days)?;

    let mut all_warnings = Vec::new();

    let sans = match params.purpose {
        CertPurpose::Server => {
            let (sans, san_warnings) = validate_sans(params.sans)?;
            all_warnings.extend(san_warnings);
            sans
        }
        // Client certificates identify by common name only
        CertPurpose::Client => Vec::new(),
    };

    let mut warning = check_ca_expiry_warning(ca, params.days);
    if !all_warnings.is_empty() {
        let san_warning = all_warnings.join("; ");
        warning = match warning {
            Some(w) => Some(format!("{}; {}", w, san_warning)),
            None => Some(san_warning),
        };
    }

    let mut cert_params = CertificateParams::default();

    let dn = &mut cert_params.distinguished_name;
    dn.push(DnType::CountryName, &config.subject.country);
    dn.push(DnType::StateOrProvinceName, &config.subject.state);
    dn.push(DnType::LocalityName, &config.subject.locality);
    dn.push(DnType::OrganizationName, params.organization);
    dn.push(DnType::CommonName, params.common_name);

    for san in &sans {
        if let Ok(ip) = san.parse::<IpAddr>() {
            cert_params.subject_alt_names.push(SanType::IpAddress(ip));
        } else {
            cert_params.subject_alt_names.push(SanType::DnsName(
                san.clone().try_into().map_err(|_| Error::InvalidSan {
                    value: san.clone(),
                    reason: "not a valid DNS name".into(),
                })?,
            ));
        }
    }

    // Leaf markers: basicConstraints CA:FALSE plus the purpose EKU
    cert_params.is_ca = IsCa::ExplicitNoCa;
    cert_params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    cert_params.extended_key_usages = match params.purpose {
        CertPurpose::Server => vec![ExtendedKeyUsagePurpose::ServerAuth],
        CertPurpose::Client => vec![ExtendedKeyUsagePurpose::ClientAuth],
    };

    let now = time::OffsetDateTime::now_utc();
    cert_params.not_before = now;
    cert_params.not_after = now + time::Duration::days(params.days as i64);

    let key_pair = KeyPair::generate()?;
    let issuer = ca.issuer()?;
    let cert = cert_params.signed_by(&key_pair, &issuer)?;

    let names = match params.purpose {
        CertPurpose::Server => sans,
        CertPurpose::Client => vec![params.common_name.to_string()],
    };

    Ok(CertGenerateResult {
        cert: Cert {
            pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            names,
        },
        warning,
    })
}

/// Check SAN entries and drop case-insensitive duplicates.
///
/// Each entry must be an IP literal or a well-formed DNS name. Returns the
/// accepted entries plus warnings for anything skipped.
pub fn validate_sans(sans: &[String]) -> Result<(Vec<String>, Vec<String>)> {
    if sans.is_empty() {
        return Err(Error::NoSans);
    }

    let mut seen = std::collections::HashSet::new();
    let mut accepted = Vec::new();
    let mut warnings = Vec::new();

    for san in sans {
        let lower = san.to_lowercase();

        if !seen.insert(lower) {
            warnings.push(format!("Skipping duplicate SAN entry: {}", san));
            continue;
        }

        if san.parse::<IpAddr>().is_ok() {
            accepted.push(san.clone());
            continue;
        }

        // RFC 1035 length bound; rcgen validates label syntax later
        if san.is_empty() || san.len() > 253 {
            return Err(Error::InvalidSan {
                value: san.clone(),
                reason: "DNS name must be 1-253 characters".into(),
            });
        }

        accepted.push(san.clone());
    }

    Ok((accepted, warnings))
}

impl Cert {
    /// Generate the broker (server) certificate with the given SANs.
    ///
    /// The common name and organization come from the server section of the
    /// config; the SANs determine which hostnames and IPs TLS clients will
    /// accept the broker under.
    pub fn server(ca: &Ca, config: &Config, sans: &[String], days: u32) -> Result<CertGenerateResult> {
        generate_with_params(
            ca,
            config,
            CertGenParams {
                purpose: CertPurpose::Server,
                common_name: &config.server.common_name,
                organization: &config.server.organization,
                sans,
                days,
            },
        )
    }

    /// Generate a client certificate for mTLS. The broker identifies the
    /// client by the certificate's common name.
    pub fn client(ca: &Ca, config: &Config, name: &str, days: u32) -> Result<CertGenerateResult> {
        if crate::fs::is_reserved_name(name) {
            return Err(Error::ReservedName(name.to_string()));
        }

        generate_with_params(
            ca,
            config,
            CertGenParams {
                purpose: CertPurpose::Client,
                common_name: name,
                organization: &config.client.organization,
                sans: &[],
                days,
            },
        )
    }

    /// Save cert and key to disk.
    pub fn save(&self, paths: &Paths, name: &str) -> Result<()> {
        let cert_path = paths.cert_path(name)?;
        let key_path = paths.key_path(name)?;

        atomic_write(&cert_path, self.pem.as_bytes())?;
        atomic_write_secret(&key_path, self.key_pem.as_bytes())?;
        Ok(())
    }
}
