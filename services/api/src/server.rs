use crate::cli::ServeArgs;
use crate::infra::{
    default_plan_catalog, AppState, InMemoryContractRepository, InMemoryResourceInventory,
    InMemorySubscriptionStore,
};
use crate::routes::with_platform_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use immo_market::config::AppConfig;
use immo_market::contracts::{ContractService, GroqClient, TextGenerator};
use immo_market::error::AppError;
use immo_market::notifications::{OneSignalClient, PushGateway};
use immo_market::subscriptions::{ExpirySweeper, PlanCatalogImporter, SubscriptionService};
use immo_market::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let plans = match args.plans_csv.take() {
        Some(path) => {
            let plans = PlanCatalogImporter::from_path(&path)?;
            info!(path = %path.display(), count = plans.len(), "plan catalog imported");
            plans
        }
        None => default_plan_catalog(),
    };

    let store = Arc::new(InMemorySubscriptionStore::with_plans(plans));
    let inventory = Arc::new(InMemoryResourceInventory::default());
    let subscriptions = Arc::new(SubscriptionService::new(store, inventory));

    let push: Option<Arc<dyn PushGateway>> = match config.push.credentials() {
        Some((app_id, key)) => Some(Arc::new(OneSignalClient::new(app_id, key)?)),
        None => {
            warn!("OneSignal credentials missing, push notifications disabled");
            None
        }
    };

    let generator: Option<Arc<dyn TextGenerator>> = match &config.contracts.api_key {
        Some(key) => Some(Arc::new(GroqClient::new(
            key.clone(),
            config.contracts.api_url.clone(),
            config.contracts.model.clone(),
        )?)),
        None => {
            warn!("GROQ_API_KEY missing, contract generation disabled");
            None
        }
    };
    let contracts = Arc::new(ContractService::new(
        Arc::new(InMemoryContractRepository::default()),
        generator,
    ));

    let mut sweeper = ExpirySweeper::new(
        subscriptions.clone(),
        config.subscriptions.sweep_interval,
    );
    if let Some(gateway) = &push {
        sweeper = sweeper.with_notifier(gateway.clone());
    }
    info!(interval_secs = sweeper.interval().as_secs(), "subscription expiry sweep scheduled");
    let _sweep_task = sweeper.spawn();

    let app = with_platform_routes(subscriptions, contracts, push)
        .layer(Extension(app_state))
        .layer(CorsLayer::permissive())
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "marketplace backend ready");

    axum::serve(listener, app).await?;
    Ok(())
}
