use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use parking_lot::{Mutex, RwLock};
use textrec_core::config::ServeSettings;
use textrec_core::error::Error;
use textrec_search::{Manifest, SearchOptions, Searcher};
use tracing::{debug, error, info, warn};

use super::errors::ApiError;
use super::models::{HealthComponents, HealthResponse, RecommendRequest, RecommendResponse};

/// Either the loaded searcher or the reason it could not be loaded.
type Loaded = Result<Arc<Searcher>, String>;

/// Shared state handed to every handler.
///
/// The searcher is loaded once when the state is created. A load failure is
/// kept and answered with 503 until restart, or until a hot reload picks up
/// a usable build. A published build that fails to load is remembered and
/// not retried until the manifest names a different one.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<ServeSettings>,
    searcher: Arc<RwLock<Loaded>>,
    failed_build: Arc<Mutex<Option<String>>>,
}

impl AppState {
    pub fn load(settings: ServeSettings) -> Self {
        let loaded = open_searcher(&settings);
        match &loaded {
            Ok(s) => info!(build_id = %s.build_id(), items = s.len(), dims = s.dims(), "Searcher ready"),
            Err(e) => error!(error = %e, "Failed to load artifact set"),
        }
        Self { settings: Arc::new(settings), searcher: Arc::new(RwLock::new(loaded)), failed_build: Arc::default() }
    }

    /// State around an already constructed searcher.
    pub fn with_searcher(settings: ServeSettings, searcher: Searcher) -> Self {
        Self {
            settings: Arc::new(settings),
            searcher: Arc::new(RwLock::new(Ok(Arc::new(searcher)))),
            failed_build: Arc::default(),
        }
    }

    pub fn settings(&self) -> &ServeSettings { &self.settings }

    /// Current searcher, reloading first when hot reload is on.
    pub fn current(&self) -> Loaded {
        if self.settings.hot_reload {
            self.refresh();
        }
        self.searcher.read().clone()
    }

    fn refresh(&self) {
        let on_disk = match Manifest::read(&self.settings.models_dir) {
            Ok(manifest) => manifest.build_id,
            Err(e) => {
                debug!(error = %e, "Manifest unreadable, keeping current searcher");
                return;
            }
        };
        if loaded_build(&self.searcher.read()) == Some(on_disk.as_str())
            || self.failed_build.lock().as_deref() == Some(on_disk.as_str())
        {
            return;
        }

        let mut guard = self.searcher.write();
        // another request may have settled this build while we waited
        if loaded_build(&guard) == Some(on_disk.as_str())
            || self.failed_build.lock().as_deref() == Some(on_disk.as_str())
        {
            return;
        }
        match open_searcher(&self.settings) {
            Ok(searcher) => {
                info!(
                    previous = loaded_build(&guard).unwrap_or("none"),
                    build_id = %searcher.build_id(),
                    "Reloaded artifact set"
                );
                *guard = Ok(searcher);
                *self.failed_build.lock() = None;
            }
            Err(e) => {
                warn!(build_id = %on_disk, error = %e, "Reload failed, keeping current searcher until the next build");
                if guard.is_err() {
                    *guard = Err(e);
                }
                *self.failed_build.lock() = Some(on_disk);
            }
        }
    }
}

fn loaded_build(loaded: &Loaded) -> Option<&str> {
    loaded.as_ref().ok().map(|s| s.build_id())
}

fn open_searcher(settings: &ServeSettings) -> Loaded {
    let options = SearchOptions { search_k: settings.search_k };
    Searcher::open(&settings.models_dir, &settings.text_data_path, options)
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

/// Loading, reloading and querying are blocking work; run `f` on the
/// blocking pool with the current searcher.
async fn run_with_searcher<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(Loaded) -> Result<T, ApiError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.current()))
        .await
        .map_err(|e| ApiError::Internal(format!("search task failed: {e}")))?
}

/// Resolve and bound-check `top_k` for a request.
pub fn validate(req: &RecommendRequest, settings: &ServeSettings) -> Result<usize, Error> {
    if req.text.is_empty() {
        return Err(Error::config("text must not be empty"));
    }
    let top_k = req.top_k.unwrap_or(settings.default_top_k);
    if top_k == 0 || top_k > settings.max_top_k {
        return Err(Error::config(format!("top_k must be in [1, {}], got {top_k}", settings.max_top_k)));
    }
    Ok(top_k)
}

pub async fn recommend(
    State(state): State<AppState>,
    body: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let top_k = validate(&req, state.settings())?;
    let query = req.text.clone();
    let results = run_with_searcher(&state, move |loaded| {
        let searcher = loaded.map_err(ApiError::ServiceUnavailable)?;
        let hits = searcher.find_similar(&query, top_k)?;
        Ok(hits.into_iter().cloned().collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(RecommendResponse { query: req.text, results }))
}

pub async fn health(State(state): State<AppState>) -> Result<(StatusCode, Json<HealthResponse>), ApiError> {
    let (status, body) = match run_with_searcher(&state, Ok).await? {
        Ok(searcher) => (
            StatusCode::OK,
            HealthResponse {
                status: "OK".to_string(),
                build_id: Some(searcher.build_id().to_string()),
                components: HealthComponents { text_model: true, database: false },
                error: None,
            },
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: "UNAVAILABLE".to_string(),
                build_id: None,
                components: HealthComponents { text_model: false, database: false },
                error: Some(e),
            },
        ),
    };
    Ok((status, Json(body)))
}
