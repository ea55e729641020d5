#[tokio::main]
async fn main() {
    corebank_observability::init();

    let services = corebank_api::app::services::build_services()
        .await
        .expect("failed to build services");
    let app = corebank_api::app::build_app(std::sync::Arc::new(services));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
