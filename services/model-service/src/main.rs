use anyhow::Result;
use delay_core::{init_metrics, init_tracing, load_config};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = load_config("model-service")?;
    init_tracing(&cfg.service_name, &cfg.log_level)?;
    init_metrics()?;
    info!(service = %cfg.service_name, "starting");

    let listener = TcpListener::bind(&cfg.bind_addr).await?;
    let served = model_service::run(cfg, model_service::delay_estimators(), listener, shutdown_signal()).await;
    delay_core::mark_not_live();
    served?;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await { warn!(error=%e, "ctrl-c handler unavailable"); std::future::pending::<()>().await; }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => { warn!(error=%e, "SIGTERM handler unavailable"); std::future::pending::<()>().await; }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
