//! Strayline server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, rebuilds the in-memory geo indexes from it, and
//! serves the dispatch API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use strayline_api::{AppState, api_router};
use strayline_core::{
  case::{CaseFilter, CaseStatus},
  geo::GeoIndex,
  store::{CaseStore, ResponderDirectory},
};
use strayline_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Strayline rescue dispatch server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// Runtime server configuration, deserialised from `config.toml` with
/// `STRAYLINE_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  host:       String,
  port:       u16,
  store_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration. Every key has a default, so the server starts
  // without a config file at all.
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8470_i64)?
    .set_default("store_path", "strayline.db")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("STRAYLINE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  // Rebuild the ranking indexes from the store.
  let geo_cases = Arc::new(GeoIndex::new());
  let geo_responders = Arc::new(GeoIndex::new());
  seed_indexes(&store, &geo_cases, &geo_responders).await?;

  let state = AppState::new(store, geo_cases, geo_responders);
  let app = api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Page through the store and index every open case and every responder
/// with known coordinates.
async fn seed_indexes(
  store: &SqliteStore,
  geo_cases: &GeoIndex,
  geo_responders: &GeoIndex,
) -> anyhow::Result<()> {
  let mut page = 1u32;
  loop {
    let batch = store
      .list_cases(&CaseFilter {
        page: Some(page),
        page_size: Some(200),
        ..Default::default()
      })
      .await
      .context("failed to list cases for index seeding")?;

    for case in &batch.cases {
      if case.status == CaseStatus::Closed {
        continue;
      }
      if let Some(coords) = case.coordinates {
        geo_cases.upsert(case.case_id, coords)?;
      }
    }

    if u64::from(page) * u64::from(batch.page_size) >= batch.total {
      break;
    }
    page += 1;
  }

  let responders = store
    .list_responders(None)
    .await
    .context("failed to list responders for index seeding")?;
  for responder in responders {
    if let Some(coords) = responder.coordinates {
      geo_responders.upsert(responder.responder_id, coords)?;
    }
  }

  tracing::info!(
    cases = geo_cases.len(),
    responders = geo_responders.len(),
    "seeded geo indexes"
  );
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
