use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_housing_routes;
use crate::shutdown::shutdown_signal;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use house_service::auth::TokenIssuer;
use house_service::config::AppConfig;
use house_service::error::AppError;
use house_service::housing::{
    HouseRepository, HouseService, InMemoryHouseRepository, PgHouseRepository, SimulatedMailer,
};
use house_service::telemetry;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
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

    let tokens = Arc::new(TokenIssuer::new(config.auth.jwt_secret.as_bytes()));

    if args.in_memory {
        warn!("serving from process memory; data is lost on exit");
        serve(&config, Arc::new(InMemoryHouseRepository::default()), tokens).await
    } else {
        let url = config.database.require_url()?;
        let repository = PgHouseRepository::connect(url, &config.database).await?;
        serve(&config, Arc::new(repository), tokens).await
    }
}

async fn serve<R>(
    config: &AppConfig,
    repository: Arc<R>,
    tokens: Arc<TokenIssuer>,
) -> Result<(), AppError>
where
    R: HouseRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(HouseService::new(
        repository,
        Arc::new(SimulatedMailer::default()),
    ));

    let app: Router = with_housing_routes(service, tokens)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "house service ready");

    let (signalled_tx, mut signalled_rx) = oneshot::channel::<()>();
    let graceful = {
        let readiness_flag = readiness_flag.clone();
        async move {
            shutdown_signal().await;
            readiness_flag.store(false, Ordering::Release);
            let _ = signalled_tx.send(());
        }
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();
    tokio::pin!(server);

    // After the signal, in-flight requests get `shutdown_grace` to finish.
    tokio::select! {
        result = &mut server => result?,
        Ok(()) = &mut signalled_rx => {
            let grace = config.server.shutdown_grace;
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(?grace, "grace period elapsed, dropping open connections"),
            }
        }
    }

    info!("house service stopped");
    Ok(())
}
