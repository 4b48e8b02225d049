// Copyright 2025 mqcert developers
// SPDX-License-Identifier: Apache-2.0

use crate::config::{Config, Paths};
use crate::error::{Error, Result};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use std::fs;

/// Self-signed root of trust for the broker deployment.
pub struct Ca {
    pub key_pair: KeyPair,
    pub cert_pem: String,
}

impl Ca {
    /// Generate a fresh key pair and self-signed root certificate.
    pub fn generate(config: &Config, days: u32) -> Result<Self> {
        crate::cert::validate_days(days)?;
        let key_pair = KeyPair::generate()?;
        let cert = Self::create_ca_cert(&key_pair, config, days)?;
        let cert_pem = cert.pem();

        Ok(Self { key_pair, cert_pem })
    }

    /// Load the CA key and certificate from disk.
    pub fn load(paths: &Paths) -> Result<Self> {
        if !paths.ca_exists() {
            return Err(Error::CaNotInitialized);
        }

        let cert_pem = fs::read_to_string(&paths.ca_cert).map_err(|e| Error::ReadFile {
            path: paths.ca_cert.clone(),
            source: e,
        })?;

        let key_pem = fs::read_to_string(&paths.ca_key).map_err(|e| Error::ReadFile {
            path: paths.ca_key.clone(),
            source: e,
        })?;

        let key_pair = KeyPair::from_pem(&key_pem)?;

        Ok(Self { key_pair, cert_pem })
    }

    /// Create an Issuer for signing leaf certificates
    ///
    /// Note: This recreates the KeyPair because Issuer takes ownership
    pub fn issuer(&self) -> Result<Issuer<'_, KeyPair>> {
        let key_pem = self.key_pair.serialize_pem();
        let key_pair = KeyPair::from_pem(&key_pem)?;
        Issuer::from_ca_cert_pem(&self.cert_pem, key_pair).map_err(Error::CertGen)
    }

    fn create_ca_cert(key_pair: &KeyPair, config: &Config, days: u32) -> Result<Certificate> {
        let mut params = CertificateParams::default();
        let dn = &mut params.distinguished_name;
        dn.push(DnType::CountryName, &config.subject.country);
        dn.push(DnType::StateOrProvinceName, &config.subject.state);
        dn.push(DnType::LocalityName, &config.subject.locality);
        dn.push(DnType::OrganizationName, &config.ca.organization);
        dn.push(DnType::CommonName, &config.ca.common_name);

        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let now = time::OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + time::Duration::days(days as i64);

        Ok(params.self_signed(key_pair)?)
    }

    /// Write `ca.key` (0600) and `ca.crt` into the certificate directory.
    pub fn save(&self, paths: &Paths) -> Result<()> {
        paths.ensure_dir()?;

        crate::fs::atomic_write_secret(&paths.ca_key, self.key_pair.serialize_pem().as_bytes())?;
        crate::fs::atomic_write(&paths.ca_cert, self.cert_pem.as_bytes())?;
        Ok(())
    }

    pub fn days_remaining(&self) -> Result<i64> {
        let info = crate::x509::parse_cert_pem(&self.cert_pem)?;
        Ok(info.days_remaining())
    }
}
