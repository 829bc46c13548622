//! HTTP server for the clinic appointment engine.
//!
//! Wraps the [`clinic_api`] router with request tracing and owns the
//! server's runtime configuration.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use clinic_core::store::ClinicStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CLINIC_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Layer defaults, the optional file at `path`, and the environment.
pub fn load_config(path: &Path) -> Result<ServerConfig, config::ConfigError> {
  config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "clinic.db")?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("CLINIC"))
    .build()?
    .try_deserialize()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The complete application: the JSON API under `/api`, traced.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: ClinicStore + 'static,
{
  Router::new()
    .nest("/api", clinic_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use clinic_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  #[test]
  fn defaults_apply_without_a_file() {
    let missing = std::env::temp_dir()
      .join(format!("clinic-{}.toml", uuid::Uuid::new_v4()));
    let cfg = load_config(&missing).unwrap();
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.store_path, PathBuf::from("clinic.db"));
    assert_eq!(cfg.address(), "127.0.0.1:8080");
  }

  #[test]
  fn file_overrides_defaults() {
    let path = std::env::temp_dir()
      .join(format!("clinic-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "port = 9191\nstore_path = \"/var/lib/clinic.db\"\n")
      .unwrap();
    let cfg = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 9191);
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/clinic.db"));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/clinic.db")),
      PathBuf::from(home).join("clinic.db")
    );
    assert_eq!(expand_tilde(Path::new("/abs.db")), PathBuf::from("/abs.db"));
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let app = router(store);

    let resp = app
      .clone()
      .oneshot(
        Request::builder()
          .uri("/api/appointments")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["kind"], "unauthorized");

    let resp = app
      .oneshot(Request::builder().uri("/appointments").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
