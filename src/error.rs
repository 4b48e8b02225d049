// Copyright 2025 mqcert developers
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CA not found. Run 'mqcert ca' first.")]
    CaNotInitialized,

    #[error("CA already exists at {0}. Use --force to regenerate.")]
    CaAlreadyExists(PathBuf),

    #[error("Certificate already exists: {0}\nUse --force to overwrite.")]
    CertAlreadyExists(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Certificate generation failed: {0}")]
    CertGen(#[from] rcgen::Error),

    #[error("Invalid SAN entry '{value}': {reason}")]
    InvalidSan { value: String, reason: String },

    #[error("Invalid certificate name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid validity period: {0}")]
    InvalidDays(String),

    #[error("No subject alternative names specified")]
    NoSans,

    #[error("'{0}' is a reserved name and cannot be used for client certificates")]
    ReservedName(String),

    #[error("Invalid path (non-UTF8): {0}")]
    InvalidPath(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Certificate '{name}' not found. Run 'mqcert server' or 'mqcert client {name}' first.")]
    CertificateNotFound { name: String },

    #[error("Failed to parse certificate: {0}")]
    CertParse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
