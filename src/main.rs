mod api;
mod cart;
mod catalog;
mod checkout;
mod cli;
mod commands;
mod config;
mod error;
mod journal;
mod models;
mod orders;
mod session;
mod storage;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shelf", about = "Terminal client for the bookstore REST API")]
pub struct Args {
    #[arg(short = 'c', long, help = "Run one command and exit (e.g. \"/books dune\")")]
    pub command: Option<String>,

    #[arg(long, env = "SHELF_API_URL", help = "Backend base URL")]
    pub api_url: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Where the session token is stored")]
    pub session_file: Option<PathBuf>,

    #[arg(long, help = "Activity journal directory")]
    pub journal_dir: Option<PathBuf>,

    #[arg(long, help = "Verbose output (info logs)")]
    pub verbose: bool,

    #[arg(long, help = "Debug output (HTTP requests and state changes)")]
    pub debug: bool,
}

fn init_tracing(args: &Args) {
    let default = if args.debug {
        "shelf=debug"
    } else if args.verbose {
        "shelf=info"
    } else {
        "shelf=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args);

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    // CLI flags win over config files
    if let Some(url) = &args.api_url {
        cfg.api.base_url = Some(url.clone());
    }
    if let Some(path) = &args.session_file {
        cfg.session.storage_path = Some(path.clone());
    }
    if let Some(dir) = &args.journal_dir {
        cfg.journal.dir = Some(dir.clone());
    }

    if let Err(errors) = cfg.validate() {
        for e in &errors {
            eprintln!("Config error {}", e);
        }
        return Err(anyhow::anyhow!("Invalid configuration"));
    }
    tracing::debug!(
        base_url = cfg.base_url(),
        timeout_ms = cfg.timeout_ms(),
        "configuration loaded"
    );

    let transport = api::HttpTransport::new(cfg.base_url(), cfg.timeout_ms());
    tracing::debug!(base_url = transport.base_url(), "http transport ready");
    let api = api::ApiClient::new(Box::new(transport));

    let storage: Box<dyn storage::SessionStorage> = match cfg.session_path() {
        Some(path) => {
            let file = storage::FileStorage::new(&path);
            tracing::debug!(path = %file.path().display(), "session storage");
            Box::new(file)
        }
        None => {
            tracing::warn!("no home directory; the session will not be saved");
            Box::new(storage::MemoryStorage::new())
        }
    };
    let session = session::SessionStore::restore(storage, &api);

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut journal = if cfg.journal.enabled {
        let path = cfg.journal_dir().join(format!("{}.jsonl", session_id));
        journal::Journal::new(&path, &session_id)?
    } else {
        journal::Journal::disabled(&session_id)
    };
    journal.session_start(cfg.base_url())?;
    if let Some(user) = session.user() {
        journal.login(&user.email, true)?;
    }

    let ctx = cli::Context::new(cfg, api, session, journal);

    if let Some(command) = &args.command {
        cli::run_once(&ctx, command)
    } else {
        cli::run_repl(ctx)
    }
}
