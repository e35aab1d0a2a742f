use crate::cli::ServeArgs;
use crate::infra::{build_pipeline, register_demo_documents, seed_demo_data, AppState, MemoryTables};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hireflow::config::AppConfig;
use hireflow::error::AppError;
use hireflow::telemetry;
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

    let tables = MemoryTables::default();
    if args.seed_demo {
        seed_demo_data(&tables)?;
    }
    let pipeline = build_pipeline(&config, &tables, args.seed_demo)?;
    if args.seed_demo {
        let registered = register_demo_documents(&pipeline)?;
        info!(registered, "demo documents queued for extraction");
    }

    let app = with_service_routes(pipeline)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        failed_documents = ?config.pipeline.failed_documents,
        "hireflow review service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
