use std::net::SocketAddr;

use alpha_feed::{
    dashboard_router, init_logging, log_app_bind, log_app_start, log_backend_selected,
    logging_config_from_env, AlphaApiClient, DashboardConfig, ReqwestTransport,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let config = DashboardConfig::from_env()?;
    log_app_start(&logging_cfg, &config);
    log_backend_selected(&config);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let transport = ReqwestTransport::new(&config.api_base_url, config.http_timeout)?;
    let client = AlphaApiClient::new(transport, config.api_key.clone(), config.tokens_per_page)
        .with_settle_delay(config.analysis_settle_delay);

    let app = dashboard_router(client, config.token_list_mode);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
