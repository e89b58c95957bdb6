use backstock_infra::PgBackend;

#[tokio::main]
async fn main() {
    backstock_observability::init();

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let (app, _worker) = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let backend = PgBackend::connect(&url)
                .await
                .expect("failed to connect to postgres");
            backend.migrate().await.expect("failed to run migrations");
            backstock_api::app::build_pg_app(backend)
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage");
            backstock_api::app::build_app()
        }
    };

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
