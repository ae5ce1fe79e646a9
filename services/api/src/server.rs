use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryImageStorage, InMemoryMarketplace};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rentazuela::config::AppConfig;
use rentazuela::error::AppError;
use rentazuela::telemetry;
use rentazuela::workflows::messaging::MessagingService;
use rentazuela::workflows::publishing::ListingPublisher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let store = Arc::new(InMemoryMarketplace::default());
    let images = Arc::new(InMemoryImageStorage::new(&args.image_base_url));
    let messaging = Arc::new(MessagingService::new(
        store.clone(),
        store.clone(),
        config.marketplace.messaging_policy(),
    ));
    let publisher = Arc::new(ListingPublisher::new(
        store,
        images,
        config.marketplace.image_policy(),
    ));

    let app = with_marketplace_routes(messaging, publisher)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_images = config.marketplace.max_listing_images,
        "marketplace api ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
