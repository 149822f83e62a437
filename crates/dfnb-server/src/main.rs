//! Binary entrypoint for the dataflow notebook server.
//!
//! Configuration comes from environment variables, see
//! [`ServerConfig::from_env`](dfnb_server::config::ServerConfig::from_env).

use dfnb_server::config::ServerConfig;
use dfnb_server::router::build_router;
use dfnb_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let addr = config.addr();
    let state = AppState::new(config);

    let app = build_router(state);

    tracing::info!("dfnb server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listen address");
    axum::serve(listener, app).await.expect("server error");
}
