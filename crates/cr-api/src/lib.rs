use std::env;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    extract::State,
    extract::connect_info::ConnectInfo,
    http::Method,
    http::Request,
    http::header::{CONTENT_TYPE, HeaderName, HeaderValue},
    middleware,
    middleware::Next,
    response::Response,
    routing::{get, post},
};
use clap::Parser;
use cr_common::config::RecommenderConfig;
use cr_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use cr_common::predictor::{ModelKind, PredictorRegistry};
use cr_common::profile::QuestionBank;
use cr_common::{CareerCatalog, RecommendationOrchestrator};
use dotenvy::dotenv;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod error;
pub mod extract;
pub mod handlers;
pub mod llm;

use error::ApiError;
use handlers::{analysis, careers, health, models, profile, questions, recommendations};
use llm::{LlmClient, LlmConfig};

const SHUTDOWN_DRAIN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Parser)]
#[command(name = "cr-api", about = "HTTP API for STEM career recommendations")]
struct Cli {
    /// Server port
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Comma separated list of allowed CORS origins
    #[arg(long, env = "CR_CORS_ORIGINS", default_value = "http://localhost:3000")]
    cors_origins: String,

    /// Largest top_n a caller may request
    #[arg(long, env = "CR_MAX_TOP_N", default_value_t = 20)]
    max_top_n: usize,

    /// Largest synthetic sample count accepted by the train endpoint
    #[arg(long, env = "CR_MAX_TRAINING_SAMPLES", default_value_t = 50_000)]
    max_training_samples: usize,

    /// Train untrained classifiers in the background right after startup
    #[arg(long, env = "CR_WARM_MODELS", default_value = "false")]
    warm_models: bool,

    /// Directory with mbti_questions.json and mi_questions.json; built-in questions when unset
    #[arg(long, env = "CR_QUESTION_DIR")]
    question_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_top_n: usize,
    pub max_training_samples: usize,
    pub warm_models: bool,
    pub question_dir: Option<PathBuf>,
}

type IpRateLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

#[derive(Clone)]
pub struct RateLimits {
    global: Arc<IpRateLimiter>,
    train: Arc<IpRateLimiter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub global_per_sec: u64,
    pub global_burst: u32,
    pub train_per_sec: u64,
    pub train_burst: u32,
}

impl RateLimitConfig {
    fn parse_env_u64(vars: &[&str]) -> Option<u64> {
        vars.iter()
            .find_map(|name| env::var(name).ok())
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
    }

    fn parse_env_u32(vars: &[&str]) -> Option<u32> {
        vars.iter()
            .find_map(|name| env::var(name).ok())
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
    }

    fn from_env() -> Self {
        Self {
            global_per_sec: Self::parse_env_u64(&["CR_RATE_LIMIT_GLOBAL_PER_SEC"]).unwrap_or(20),
            global_burst: Self::parse_env_u32(&["CR_RATE_LIMIT_GLOBAL_BURST"]).unwrap_or(40),
            train_per_sec: Self::parse_env_u64(&["CR_RATE_LIMIT_TRAIN_PER_SEC"]).unwrap_or(1),
            train_burst: Self::parse_env_u32(&["CR_RATE_LIMIT_TRAIN_BURST"]).unwrap_or(3),
        }
    }
}

impl AppConfig {
    fn from_cli(cli: Cli) -> Result<Self, ApiError> {
        let cors_origins = cli
            .cors_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();

        if cors_origins.iter().any(|origin| origin == "*") {
            return Err(ApiError::BadRequest(
                "CR_CORS_ORIGINS must list explicit origins".into(),
            ));
        }
        if cli.max_top_n == 0 {
            return Err(ApiError::BadRequest("CR_MAX_TOP_N must be positive".into()));
        }
        if cli.max_training_samples == 0 {
            return Err(ApiError::BadRequest(
                "CR_MAX_TRAINING_SAMPLES must be positive".into(),
            ));
        }

        Ok(Self {
            port: cli.port,
            cors_origins,
            max_top_n: cli.max_top_n,
            max_training_samples: cli.max_training_samples,
            warm_models: cli.warm_models,
            question_dir: cli.question_dir,
        })
    }

    pub fn for_tests() -> Self {
        Self {
            port: 8000,
            cors_origins: vec!["http://localhost:3000".into()],
            max_top_n: 20,
            max_training_samples: 5_000,
            warm_models: false,
            question_dir: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CareerCatalog>,
    pub orchestrator: Arc<RecommendationOrchestrator>,
    pub recommender: RecommenderConfig,
    pub config: AppConfig,
    pub llm: Option<Arc<LlmClient>>,
    pub questions: Arc<QuestionBank>,
    pub(crate) rate_limits: RateLimits,
    pub readiness: Arc<AtomicBool>,
}

impl AppState {
    pub fn registry(&self) -> &Arc<PredictorRegistry> {
        self.orchestrator.registry()
    }
}

pub type SharedState = Arc<AppState>;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

fn build_ip_limiter(per_second: u64, burst_size: u32) -> Arc<IpRateLimiter> {
    let burst = NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN);
    let nanos_per_token = 1_000_000_000u64 / per_second.max(1);
    let quota = Quota::with_period(Duration::from_nanos(nanos_per_token.max(1)))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);

    Arc::new(RateLimiter::keyed(quota))
}

pub fn default_rate_limits() -> RateLimits {
    let cfg = RateLimitConfig::from_env();
    RateLimits {
        global: build_ip_limiter(cfg.global_per_sec, cfg.global_burst),
        train: build_ip_limiter(cfg.train_per_sec, cfg.train_burst),
    }
}

fn request_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

fn enforce_rate_limit(limiter: &IpRateLimiter, ip: Option<IpAddr>) -> Result<(), ApiError> {
    if let Some(client_ip) = ip {
        if limiter.check_key(&client_ip).is_err() {
            return Err(ApiError::TooManyRequests("rate limit exceeded".into()));
        }
    }

    Ok(())
}

async fn global_rate_limit(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    enforce_rate_limit(&state.rate_limits.global, request_ip(&req))?;
    Ok(next.run(req).await)
}

async fn train_rate_limit(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    enforce_rate_limit(&state.rate_limits.train, request_ip(&req))?;
    Ok(next.run(req).await)
}

async fn attach_request_id_context(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    Ok(error::with_request_id(request_id, next.run(req)).await)
}

pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let request_id_header = HeaderName::from_static("x-request-id");
    let trace_header = request_id_header.clone();

    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(&trace_header)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
            status = tracing::field::Empty,
        )
    });

    let api_routes = Router::new()
        .route("/mbti/score", post(profile::score_mbti))
        .route("/mi/score", post(profile::score_mi))
        .route("/profile", post(profile::score_profile))
        .route("/profile/describe", post(profile::describe))
        .route("/questions/mbti", get(questions::mbti))
        .route("/questions/multiple-intelligence", get(questions::multiple_intelligence))
        .route("/recommendations", post(recommendations::recommend))
        .route("/recommendations/compare", post(recommendations::compare))
        .route("/careers", get(careers::list_careers))
        .route("/careers/locations", get(careers::locations))
        .route("/careers/universities", get(careers::universities))
        .route("/careers/names", get(careers::names))
        .route("/models/status", get(models::status))
        .route(
            "/models/:kind/train",
            post(models::train).route_layer(middleware::from_fn_with_state(
                state.clone(),
                train_rate_limit,
            )),
        )
        .route("/models/:kind/reset", post(models::reset))
        .route("/analysis", post(analysis::analyze));

    Router::new()
        .route("/health", get(health::readyz))
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            global_rate_limit,
        ))
        .layer(middleware::from_fn(attach_request_id_context))
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeRequestUuid::default(),
        ))
        .layer(cors)
        .with_state(state)
}

/// Builds the engine the service routes to. Refuses an empty catalog.
pub fn build_engine(
    recommender: &RecommenderConfig,
) -> Result<(Arc<CareerCatalog>, Arc<RecommendationOrchestrator>), ApiError> {
    let catalog = match &recommender.catalog_path {
        Some(path) => CareerCatalog::load_json(path)?,
        None => CareerCatalog::with_defaults(),
    };
    catalog.ensure_not_empty()?;

    let catalog = Arc::new(catalog);
    let registry = Arc::new(PredictorRegistry::new(catalog.clone(), recommender));
    let orchestrator = Arc::new(RecommendationOrchestrator::new(catalog.clone(), registry));
    Ok((catalog, orchestrator))
}

fn load_questions(dir: Option<&std::path::Path>) -> Result<QuestionBank, ApiError> {
    let bank = match dir {
        Some(dir) => QuestionBank::load_dir(dir)?,
        None => QuestionBank::embedded()?,
    };
    Ok(bank)
}

/// Small, fast engine settings so tests can train on demand.
pub fn test_recommender_config() -> RecommenderConfig {
    let mut config = RecommenderConfig::default();
    config.training.num_samples = 200;
    config.training.seed = Some(17);
    config.training.neural.epochs = 5;
    config.training.forest.n_trees = 5;
    config
}

pub fn test_state() -> SharedState {
    test_state_with(test_recommender_config())
}

/// Test state over the default catalog with caller-chosen engine settings.
pub fn test_state_with(recommender: RecommenderConfig) -> SharedState {
    let catalog = Arc::new(CareerCatalog::with_defaults());
    let registry = Arc::new(PredictorRegistry::new(catalog.clone(), &recommender));
    let orchestrator = Arc::new(RecommendationOrchestrator::new(catalog.clone(), registry));
    let llm = LlmClient::new(LlmConfig::mock()).ok().map(Arc::new);
    let questions = Arc::new(QuestionBank::embedded().unwrap_or_default());

    Arc::new(AppState {
        catalog,
        orchestrator,
        recommender,
        config: AppConfig::for_tests(),
        llm,
        questions,
        rate_limits: default_rate_limits(),
        readiness: Arc::new(AtomicBool::new(true)),
    })
}

fn build_llm_client() -> Option<Arc<LlmClient>> {
    let config = LlmConfig::from_env();
    if !config.enabled {
        info!("llm analysis disabled");
        return None;
    }
    match LlmClient::new(config) {
        Ok(client) => {
            info!(provider = client.provider_name(), "llm analysis enabled");
            Some(Arc::new(client))
        }
        Err(err) => {
            warn!(error = %err, "llm analysis disabled");
            None
        }
    }
}

fn warm_models(state: &SharedState) {
    for kind in ModelKind::ALL {
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            let registry = state.registry();
            match registry.trainer().ensure_trained(registry.slot(kind)) {
                Ok(status) => info!(%kind, run_id = ?status.run_id, "model warm"),
                Err(err) => warn!(%kind, error = %err, "model warm-up failed"),
            }
        });
    }
}


pub async fn run() -> Result<(), ApiError> {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli)?;
    let recommender = RecommenderConfig::from_env();
    let (catalog, orchestrator) = build_engine(&recommender)?;
    let questions = Arc::new(load_questions(config.question_dir.as_deref())?);
    cr_metrics::init_metrics("CR_METRICS_PORT", 9464);

    let state = Arc::new(AppState {
        catalog: catalog.clone(),
        orchestrator,
        recommender,
        config: config.clone(),
        llm: build_llm_client(),
        questions,
        rate_limits: default_rate_limits(),
        readiness: Arc::new(AtomicBool::new(true)),
    });

    if config.warm_models {
        warm_models(&state);
    }

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let app = create_router(state.clone());

    info!(
        %addr,
        careers = catalog.len(),
        semantic = state.registry().semantic_available(),
        "cr-api listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    state.readiness.store(false, Ordering::SeqCst);

    // Give load balancers a brief window to observe /readyz as not ready
    // before axum stops accepting new connections.
    tokio::time::sleep(SHUTDOWN_DRAIN_GRACE).await;
}
