// Copyright 2025 mqcert developers
// SPDX-License-Identifier: Apache-2.0

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use mqcert::{Ca, Cert, CertType, Config, Error, Paths, Result};
use std::io;
use std::path::PathBuf;

// ============================================================================
// Helper functions
// ============================================================================

/// List all certificates (excluding the CA) in the certificate directory.
/// Returns a sorted list of (name, path) tuples.
fn list_certificates(paths: &Paths) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(&paths.base).map_err(|e| Error::ReadDir {
        path: paths.base.clone(),
        source: e,
    })?;

    let mut certs: Vec<_> = Vec::new();
    for entry_result in entries {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                eprintln!(
                    "Warning: Could not read directory entry in {}: {}",
                    paths.base.display(),
                    e
                );
                continue;
            }
        };
        let path = entry.path();
        if path.extension().map(|e| e == "crt").unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                let name = stem.to_string_lossy().to_string();
                if name != "ca" {
                    certs.push((name, path));
                }
            }
        }
    }

    certs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(certs)
}

/// Get certificate info (expiry string and days remaining)
fn get_cert_info(cert_path: &std::path::Path) -> Option<(String, i64)> {
    mqcert::parse_cert_file(cert_path)
        .ok()
        .map(|info| (info.expiry_string(), info.days_remaining()))
}

// ============================================================================
// CLI definitions
// ============================================================================

#[derive(Parser)]
#[command(name = "mqcert")]
#[command(about = "Bootstrap an mTLS PKI for MQTT/IoT brokers")]
#[command(version)]
#[command(after_help = "\
EXAMPLES:
    mqcert ca                      # Create the self-signed root CA
    mqcert server                  # Issue the broker certificate
    mqcert client sensor-01        # Issue an mTLS client certificate
    mqcert status                  # Check CA and certificates

Certificates are written to ./certs (override with --dir or MQCERT_DIR).")]
struct Cli {
    /// Certificate directory (default: ./certs, or MQCERT_DIR)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the self-signed root CA
    Ca {
        /// Regenerate the CA even if it exists
        #[arg(long)]
        force: bool,

        /// Days until the CA certificate expires (default: 3650)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
    },

    /// Issue the broker (server) certificate, signed by the CA
    Server {
        /// Days until the certificate expires (default: 365)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,

        /// SAN entry (DNS name or IP); repeatable. Defaults to the
        /// configured list: localhost, emqx.local, 127.0.0.1
        #[arg(long = "san")]
        sans: Vec<String>,

        /// Overwrite an existing server certificate
        #[arg(long, short)]
        force: bool,
    },

    /// Issue one or more mTLS client certificates, signed by the CA
    Client {
        /// Client names; each becomes the certificate's common name
        #[arg(required = true)]
        names: Vec<String>,

        /// Days until the certificates expire (default: 365)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,

        /// Overwrite existing client certificates
        #[arg(long, short)]
        force: bool,
    },

    /// Show CA state and issued certificates
    Status,

    /// List issued certificates with expiry info
    List,

    /// Show detailed information about a certificate ("ca" for the root)
    Inspect {
        /// Certificate name to inspect
        name: String,
    },

    /// Export certificate chain (leaf + CA) to a single file
    Chain {
        /// Certificate name to export (default: server)
        #[arg(default_value = "server")]
        name: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show certificate and CA paths
    Path {
        /// Certificate name to show paths for (e.g., "server", "sensor-01")
        name: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Output helper that respects --quiet and --verbose flags.
#[derive(Clone, Copy)]
struct Output {
    quiet: bool,
    verbose: bool,
}

impl Output {
    fn new(quiet: bool, verbose: bool) -> Self {
        Self { quiet, verbose }
    }

    /// Print a standard message (suppressed with --quiet)
    fn print(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a verbose message (only shown with --verbose)
    fn verbose(&self, msg: &str) {
        if self.verbose {
            println!("{}", msg);
        }
    }
}

fn main() {
    // Reset SIGPIPE to default behavior (exit) instead of panic
    // when output is piped to tools like grep/head
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = Paths::new(cli.dir.as_deref())?;
    let out = Output::new(cli.quiet, cli.verbose);

    // Warn about expiring certificates before doing anything else
    if !cli.quiet {
        check_expiring_certificates(&paths);
    }

    match cli.command {
        Commands::Ca { force, days } => cmd_ca(&paths, force, days, out),
        Commands::Server { days, sans, force } => cmd_server(&paths, days, &sans, force, out),
        Commands::Client { names, days, force } => cmd_client(&paths, &names, days, force, out),
        Commands::Status => cmd_status(&paths),
        Commands::List => cmd_list(&paths),
        Commands::Inspect { name } => cmd_inspect(&paths, &name),
        Commands::Chain { name, output } => cmd_chain(&paths, &name, output.as_deref()),
        Commands::Path { name } => cmd_path(&paths, name.as_deref()),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

fn cmd_ca(paths: &Paths, force: bool, days: Option<u32>, out: Output) -> Result<()> {
    let config = Config::load(&paths.config)?;
    let ca_days = days.unwrap_or(config.ca.days);

    if paths.ca_exists() && !force {
        return Err(Error::CaAlreadyExists(paths.ca_cert.clone()));
    }

    out.print("Generating root CA...");

    let ca = Ca::generate(&config, ca_days)?;
    ca.save(paths)?;

    // Persist the defaults so the deployment can edit them later
    if !paths.config.exists() {
        config.save(&paths.config)?;
        out.verbose(&format!("  Config written to {}", paths.config.display()));
    }

    out.print("");
    println!("CA certificate: {}", paths.ca_cert.display());
    println!("CA key:         {}", paths.ca_key.display());
    if let Some((expiry, days_left)) = get_cert_info(&paths.ca_cert) {
        out.verbose(&format!("  Expires: {} ({} days)", expiry, days_left));
    }

    Ok(())
}

fn cmd_server(
    paths: &Paths,
    days: Option<u32>,
    sans: &[String],
    force: bool,
    out: Output,
) -> Result<()> {
    let config = Config::load(&paths.config)?;
    let ca = Ca::load(paths)?;

    let cert_days = days.unwrap_or(config.server.days);
    let sans: Vec<String> = if sans.is_empty() {
        config.server.sans.clone()
    } else {
        sans.to_vec()
    };

    let cert_path = paths.cert_path("server")?;
    if cert_path.exists() && !force {
        return Err(Error::CertAlreadyExists(cert_path));
    }

    out.print(&format!(
        "Issuing server certificate for: {}",
        sans.join(", ")
    ));

    let result = Cert::server(&ca, &config, &sans, cert_days)?;
    if let Some(warning) = &result.warning {
        eprintln!("Warning: {}", warning);
    }
    result.cert.save(paths, "server")?;

    print_issued(paths, "server")?;

    Ok(())
}

fn cmd_client(
    paths: &Paths,
    names: &[String],
    days: Option<u32>,
    force: bool,
    out: Output,
) -> Result<()> {
    let config = Config::load(&paths.config)?;
    let ca = Ca::load(paths)?;

    let cert_days = days.unwrap_or(config.client.days);

    for name in names {
        let cert_path = paths.cert_path(name)?;
        if cert_path.exists() && !force {
            return Err(Error::CertAlreadyExists(cert_path));
        }

        out.print(&format!("Issuing client certificate for: {}", name));

        let result = Cert::client(&ca, &config, name, cert_days)?;
        if let Some(warning) = &result.warning {
            eprintln!("Warning: {}", warning);
        }
        result.cert.save(paths, name)?;

        print_issued(paths, name)?;
    }

    Ok(())
}

/// Print the file locations and expiry of a freshly issued certificate.
fn print_issued(paths: &Paths, name: &str) -> Result<()> {
    let cert_path = paths.cert_path(name)?;
    let key_path = paths.key_path(name)?;

    if let Some((expiry, days_remaining)) = get_cert_info(&cert_path) {
        println!(
            "Certificate: {} (expires: {}, {} days)",
            cert_path.display(),
            expiry,
            days_remaining
        );
    } else {
        println!("Certificate: {}", cert_path.display());
    }
    println!("Private key: {}", key_path.display());

    Ok(())
}

fn cmd_status(paths: &Paths) -> Result<()> {
    println!("mqcert status");
    println!("=============");
    println!();

    print!("CA: ");
    if paths.ca_exists() {
        println!("initialized");
        println!("    Path: {}", paths.ca_cert.display());

        if let Some((expiry, days)) = get_cert_info(&paths.ca_cert) {
            println!("    Expires: {} ({} days)", expiry, days);
        }
    } else {
        println!("not initialized");
        println!("    Run 'mqcert ca' to set up");
        return Ok(());
    }

    println!();

    println!("Certificates:");
    let certs = list_certificates(paths)?;

    if certs.is_empty() {
        println!("    (none)");
    } else {
        for (name, path) in certs {
            if let Some((expiry, days)) = get_cert_info(&path) {
                println!("    {}.crt (expires: {}, {} days)", name, expiry, days);
            } else {
                println!("    {}.crt", name);
            }
        }
    }

    Ok(())
}

/// Check for certificates expiring soon and print a warning.
/// Called at startup to alert users before their broker breaks.
const EXPIRY_WARNING_DAYS: i64 = 7;

fn check_expiring_certificates(paths: &Paths) {
    if !paths.ca_exists() {
        return;
    }

    let certs = match list_certificates(paths) {
        Ok(c) => c,
        Err(_) => return,
    };

    let mut expiring: Vec<(String, i64)> = Vec::new();
    let mut expired: Vec<String> = Vec::new();

    for (name, path) in certs {
        if let Ok(info) = mqcert::parse_cert_file(&path) {
            let days = info.days_remaining();
            if days < 0 {
                expired.push(name);
            } else if days <= EXPIRY_WARNING_DAYS {
                expiring.push((name, days));
            }
        }
    }

    // The CA expiring takes everything else with it
    if let Ok(ca_info) = mqcert::parse_cert_file(&paths.ca_cert) {
        let days = ca_info.days_remaining();
        if days < 0 {
            expired.push("CA".to_string());
        } else if days <= EXPIRY_WARNING_DAYS {
            expiring.push(("CA".to_string(), days));
        }
    }

    if !expired.is_empty() {
        eprintln!("Warning: EXPIRED certificates: {}", expired.join(", "));
        eprintln!("  Re-issue them with 'mqcert server' / 'mqcert client <name>' --force.\n");
    }

    if !expiring.is_empty() {
        let warnings: Vec<String> = expiring
            .iter()
            .map(|(name, days)| format!("{} ({}d)", name, days))
            .collect();
        eprintln!("Warning: certificates expiring soon: {}", warnings.join(", "));
        eprintln!("  Re-issue them with 'mqcert server' / 'mqcert client <name>' --force.\n");
    }
}

fn cmd_list(paths: &Paths) -> Result<()> {
    if !paths.ca_exists() {
        return Err(Error::CaNotInitialized);
    }

    let certs = list_certificates(paths)?;

    if certs.is_empty() {
        println!("No certificates found.");
        println!("Run 'mqcert server' or 'mqcert client <name>' to create one.");
        return Ok(());
    }

    println!("{:<20} {:<12} {:>8}  TYPE", "NAME", "EXPIRES", "DAYS");
    println!("{}", "-".repeat(55));

    for (name, path) in certs {
        let info = mqcert::parse_cert_file(&path).ok();
        let expiry = info
            .as_ref()
            .map(|i| i.expiry_string())
            .unwrap_or_else(|| "???".into());
        let days = info.as_ref().map(|i| i.days_remaining()).unwrap_or(-999);
        let cert_type = info
            .as_ref()
            .map(|i| match i.cert_type {
                CertType::Server => "server",
                CertType::Client => "client",
                CertType::Unknown => "unknown",
            })
            .unwrap_or("???");

        let days_str = if days < 0 {
            format!("{} (EXPIRED)", days)
        } else if days <= 7 {
            format!("{} (expiring)", days)
        } else {
            days.to_string()
        };

        println!("{:<20} {:<12} {:>8}  {}", name, expiry, days_str, cert_type);
    }

    Ok(())
}

fn cmd_inspect(paths: &Paths, name: &str) -> Result<()> {
    let cert_path = paths.ensure_cert_exists(name)?;

    let info = mqcert::parse_cert_file(&cert_path)?;

    println!("Certificate: {}", name);
    println!("===========");
    println!();
    println!("File:       {}", cert_path.display());
    println!("Key:        {}", paths.key_path(name)?.display());
    println!();

    let cert_type = if info.is_ca {
        "Root CA"
    } else {
        match info.cert_type {
            CertType::Server => "TLS Server (serverAuth)",
            CertType::Client => "TLS Client (clientAuth)",
            CertType::Unknown => "Unknown",
        }
    };
    println!("Type:       {}", cert_type);

    if let Some(cn) = &info.common_name {
        println!("Common Name: {}", cn);
    }
    if let Some(org) = &info.organization {
        println!("Organization: {}", org);
    }
    if let Some(issuer) = &info.issuer_common_name {
        if info.is_self_signed() {
            println!("Issuer:      {} (self-signed)", issuer);
        } else {
            println!("Issuer:      {}", issuer);
        }
    }
    println!("Serial:      {}", info.serial);

    if !info.subject_alt_names.is_empty() {
        println!("SANs:");
        for san in &info.subject_alt_names {
            println!("    - {}", san);
        }
    }

    println!();

    let days = info.days_remaining();
    let expiry = info.expiry_string();
    if days < 0 {
        println!("Status:     EXPIRED ({} days ago)", -days);
    } else if days <= 7 {
        println!("Status:     Expiring soon ({} days)", days);
    } else {
        println!("Status:     Valid ({} days remaining)", days);
    }
    println!("Expires:    {}", expiry);

    Ok(())
}

fn cmd_chain(paths: &Paths, name: &str, output: Option<&std::path::Path>) -> Result<()> {
    let cert_path = paths.ensure_cert_exists(name)?;

    let cert_pem = std::fs::read_to_string(&cert_path).map_err(|e| Error::ReadFile {
        path: cert_path.clone(),
        source: e,
    })?;

    let ca_pem = std::fs::read_to_string(&paths.ca_cert).map_err(|e| Error::ReadFile {
        path: paths.ca_cert.clone(),
        source: e,
    })?;

    // Leaf first, then CA (standard chain order)
    let chain = format!("{}\n{}\n", cert_pem.trim_end(), ca_pem.trim_end());

    if let Some(out_path) = output {
        std::fs::write(out_path, &chain).map_err(|e| Error::WriteFile {
            path: out_path.to_path_buf(),
            source: e,
        })?;
        eprintln!("Chain written to {}", out_path.display());
    } else {
        print!("{}", chain);
    }

    Ok(())
}

fn cmd_path(paths: &Paths, name: Option<&str>) -> Result<()> {
    if let Some(cert_name) = name {
        println!("Cert: {}", paths.cert_path(cert_name)?.display());
        println!("Key:  {}", paths.key_path(cert_name)?.display());
    } else {
        println!("Cert dir: {}", paths.base.display());
        println!("CA cert:  {}", paths.ca_cert.display());
        println!("CA key:   {}", paths.ca_key.display());
    }
    Ok(())
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
