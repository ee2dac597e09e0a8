use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{delete, get, head, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    auth::require_api_key,
    handlers::{
        create_secret, delete_secret, head_secret, health, list_secrets, prune_secrets,
        reveal_secret,
    },
    secrets::{Policy, Secrets, DEFAULT_MAX_SECRET_BYTES},
    store::{KdfParams, Store},
    AppState,
};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub data_dir: Option<PathBuf>,
    /// Interval of the in-process expiry sweep; `None` disables it.
    pub sweep_interval: Option<Duration>,
    pub cors_origins: Option<String>,
    pub max_secret_bytes: usize,
    pub kdf: KdfParams,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            api_key: None,
            data_dir: None,
            sweep_interval: Some(Duration::from_secs(300)),
            cors_origins: None,
            max_secret_bytes: DEFAULT_MAX_SECRET_BYTES,
            kdf: KdfParams::default(),
        }
    }
}

impl ServerConfig {
    /// Read `HUSH_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from `lookup`, falling back to defaults for unset
    /// variables. A variable that is set but malformed is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let sweep_secs: u64 = parse_var(&lookup, "HUSH_SWEEP_INTERVAL_SECS", 300)?;

        let cfg = Self {
            host: lookup("HUSH_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "HUSH_PORT", defaults.port)?,
            api_key: lookup("HUSH_API_KEY").filter(|k| !k.is_empty()),
            data_dir: lookup("HUSH_DATA_DIR").map(PathBuf::from),
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            cors_origins: lookup("HUSH_CORS_ORIGINS"),
            max_secret_bytes: parse_var(
                &lookup,
                "HUSH_MAX_SECRET_BYTES",
                defaults.max_secret_bytes,
            )?,
            kdf: KdfParams {
                memory_kib: parse_var(&lookup, "HUSH_KDF_MEMORY_KIB", defaults.kdf.memory_kib)?,
                iterations: parse_var(&lookup, "HUSH_KDF_ITERATIONS", defaults.kdf.iterations)?,
                parallelism: parse_var(
                    &lookup,
                    "HUSH_KDF_PARALLELISM",
                    defaults.kdf.parallelism,
                )?,
            },
        };

        cfg.kdf
            .validate()
            .context("invalid HUSH_KDF_* parameters")?;
        Ok(cfg)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {name}: {raw:?}")),
        None => Ok(default),
    }
}

/// Use `explicit` if given (creating it), otherwise the platform data dir.
pub fn resolve_data_dir(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(d) => {
            std::fs::create_dir_all(d).context("create data dir")?;
            Ok(d.clone())
        }
        None => crate::dirs::data_dir(),
    }
}

/// Build the HTTP router. `cors_origins` is a comma-separated allowlist; any
/// origin is allowed when it is `None`.
pub fn router(state: AppState, cors_origins: Option<&str>) -> Router {
    // Public routes: sharing and revealing need no credentials.
    let public = Router::new()
        .route("/health", get(health))
        .route("/secrets", post(create_secret))
        .route("/secrets/{token}", head(head_secret))
        .route("/secrets/{token}/reveal", post(reveal_secret));

    // Admin routes (API key required).
    let admin = Router::new()
        .route("/secrets", get(list_secrets))
        .route("/secrets/{token}", delete(delete_secret))
        .route("/prune", post(prune_secrets))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(build_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    cfg.kdf
        .validate()
        .context("invalid HUSH_KDF_* parameters")?;
    info!(
        memory_kib = cfg.kdf.memory_kib,
        iterations = cfg.kdf.iterations,
        parallelism = cfg.kdf.parallelism,
        max_secret_bytes = cfg.max_secret_bytes,
        "argon2id key derivation configured"
    );

    let db_path = data_dir.join("hush.db");
    let store = Store::open(&db_path).context("open store")?;

    if let Some(interval) = cfg.sweep_interval {
        store.clone().spawn_sweep(interval);
    }

    if cfg.api_key.is_none() {
        info!("HUSH_API_KEY not set — admin endpoints disabled");
    }

    let policy = Policy {
        max_secret_bytes: cfg.max_secret_bytes,
        kdf: cfg.kdf,
    };
    let state = AppState {
        secrets: Secrets::new(store, policy),
        api_key: cfg.api_key,
    };

    let app = router(state, cfg.cors_origins.as_deref());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "hush server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app).await.context("server error")
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::HEAD,
            http::Method::POST,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}
