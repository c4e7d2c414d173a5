use crate::{errors::EngineError, query::ParsedQuery, query::QueryInterpreter};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    interpreter: Arc<QueryInterpreter>,
}

pub fn router(interpreter: Arc<QueryInterpreter>) -> Router {
    let shared_state = Arc::new(SharedState { interpreter });

    Router::new()
        .route("/api/parse", post(parse))
        .route("/api/vocabulary", get(vocabulary))
        .route("/api/vocabulary/refresh", post(refresh_vocabulary))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

pub async fn start_app(
    interpreter: Arc<QueryInterpreter>,
    listen: &str,
    refresh_interval: Option<Duration>,
) -> anyhow::Result<()> {
    async fn shutdown_signal() {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
        log::warn!("shutting down");
    }

    if let Some(every) = refresh_interval {
        tokio::spawn(refresh_loop(interpreter.clone(), every));
    }

    let app = router(interpreter);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("listening on {listen}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn refresh_loop(interpreter: Arc<QueryInterpreter>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // first tick completes immediately, the vocabulary was just loaded
    ticker.tick().await;
    loop {
        ticker.tick().await;
        // failure is logged by the store, the old snapshot stays in place
        let _ = interpreter.vocabulary().refresh().await;
    }
}

#[derive(Debug)]
struct HttpError(EngineError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            EngineError::VocabularyUnavailable(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            EngineError::MalformedFallbackResponse(_)
            | EngineError::CompletionServiceFailure(_) => axum::http::StatusCode::BAD_GATEWAY,
        };
        log::error!("{self:?}");
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<EngineError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseRequest {
    pub query: String,
}

async fn parse(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ParseRequest>,
) -> axum::Json<ParsedQuery> {
    log::debug!("payload: {payload:?}");
    Json(state.interpreter.parse(&payload.query).await)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VocabularyResponse {
    pub market_codes: usize,
    pub channels: usize,
    pub partner_names: usize,
    pub funnels: usize,
}

impl VocabularyResponse {
    fn of(vocab: &crate::vocabulary::ReferenceVocabulary) -> Self {
        Self {
            market_codes: vocab.market_codes().len(),
            channels: vocab.channels().len(),
            partner_names: vocab.partner_names().len(),
            funnels: vocab.funnels().len(),
        }
    }
}

async fn vocabulary(State(state): State<Arc<SharedState>>) -> axum::Json<VocabularyResponse> {
    let vocab = state.interpreter.vocabulary().snapshot();
    Json(VocabularyResponse::of(&vocab))
}

async fn refresh_vocabulary(
    State(state): State<Arc<SharedState>>,
) -> Result<axum::Json<VocabularyResponse>, HttpError> {
    let vocab = state.interpreter.vocabulary().refresh().await?;
    Ok(Json(VocabularyResponse::of(&vocab)))
}
