use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

use certmill::error::CertMillError;
use certmill::manager::CertificateManager;
use certmill::model::CsrId;
use certmill::policy::LifetimePolicy;
use certmill::refresh;
use certmill::signer::SigningCert;
use certmill::store::{CsrStore, JsonFileStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the CSR store
    #[arg(long, env = "CERTMILL_STORE", default_value = "certmill.json")]
    store: PathBuf,

    /// CA certificate (PEM)
    #[arg(long, env = "CERTMILL_CA_CERT")]
    ca_cert: PathBuf,

    /// CA private key (PKCS#8 PEM)
    #[arg(long, env = "CERTMILL_CA_KEY")]
    ca_key: PathBuf,

    /// Short-lived certificate lifetime in hours
    #[arg(long, env = "CERTMILL_LIFE_SHORT", default_value_t = 48)]
    life_short: u64,

    /// Long-lived certificate lifetime in hours
    #[arg(long, env = "CERTMILL_LIFE_LONG", default_value_t = 168)]
    life_long: u64,

    /// Backdate long-lived certificates to tolerate verifier clock skew
    #[arg(long, env = "CERTMILL_BACKDATE")]
    backdate: bool,

    /// Width of the renewal worker pool
    #[arg(long, env = "CERTMILL_WORKERS", default_value_t = refresh::DEFAULT_WORKERS)]
    workers: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List active requests, do nothing else
    List,
    /// Sign the CSR with this id
    Sign {
        id: CsrId,
        /// Issue a long-lived certificate
        #[arg(long)]
        long: bool,
    },
    /// Reject the CSR with this id
    Reject { id: CsrId },
    /// Remove all older certificates for this CSR
    Clean { id: CsrId },
    /// Wipe all certificates for this CSR
    Wipe { id: CsrId },
    /// Renew every refreshable CSR
    Refresh,
    /// Clean older certificates for every refreshable CSR
    CleanAll,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "certmill=info".into()),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("certmill error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let store = JsonFileStore::open(&cli.store)
        .with_context(|| format!("failed to open store {}", cli.store.display()))?;
    let store: Arc<dyn CsrStore> = Arc::new(store);

    // CA material and policy are validated before any command runs.
    let ca = Arc::new(
        SigningCert::from_pem_files(&cli.ca_cert, &cli.ca_key)
            .context("failed to load CA material")?,
    );
    let policy = LifetimePolicy::from_hours(cli.life_short, cli.life_long, cli.backdate)?;

    execute(cli.command, store, ca, policy, cli.workers).await
}

async fn execute(
    command: Command,
    store: Arc<dyn CsrStore>,
    ca: Arc<SigningCert>,
    policy: LifetimePolicy,
    workers: usize,
) -> Result<()> {
    match command {
        Command::List => {
            for row in store.printable().await? {
                let not_after = match row.latest_not_after {
                    Some(when) => when.format(&Rfc3339)?,
                    None => "----------".to_string(),
                };
                println!(
                    "{} {} {} {}",
                    row.id, row.common_name, row.sha256sum, not_after
                );
            }
        }
        Command::Sign { id, long } => {
            let decision = policy.issuance(long);
            let manager = CertificateManager::new(store.as_ref());
            manager
                .sign(id, ca.as_ref(), decision.duration, decision.backdate)
                .await?;
        }
        Command::Reject { id } => {
            let manager = CertificateManager::new(store.as_ref());
            manager.reject(id).await?;
        }
        Command::Clean { .. } => return Err(CertMillError::NotImplemented("clean").into()),
        Command::Wipe { .. } => return Err(CertMillError::NotImplemented("wipe").into()),
        Command::Refresh => {
            refresh::refresh_all(store, ca, policy, workers).await?;
        }
        Command::CleanAll => {
            refresh::clean_all(store).await?;
        }
    }
    Ok(())
}
