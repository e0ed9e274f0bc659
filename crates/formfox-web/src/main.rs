use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

mod error;
mod handlers;
mod models;
mod state;
mod upload;

use state::AppState;

/// Lookup order for settings: environment variable, then config file, then
/// the built-in default.
fn setting(env_key: &str, file_value: Option<String>, default: &str) -> String {
    std::env::var(env_key)
        .ok()
        .filter(|v| !v.is_empty())
        .or(file_value)
        .unwrap_or_else(|| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let file = formfox_core::config_file::load_config();
    let config = formfox_core::Config::default().with_file(&file);

    let api_keys = file.api_keys.clone().unwrap_or_default();
    let services = file.services.clone().unwrap_or_default();

    let completion_key = std::env::var("COMETAPI_KEY")
        .ok()
        .filter(|v| !v.is_empty())
        .or(api_keys.completion_key);
    let pdfco_key = std::env::var("PDFCO_API_KEY")
        .ok()
        .filter(|v| !v.is_empty())
        .or(api_keys.pdfco_key);
    if completion_key.is_none() {
        eprintln!("Warning: COMETAPI_KEY not set; chat and inferred extraction will fail");
    }
    if pdfco_key.is_none() {
        eprintln!("Warning: PDFCO_API_KEY not set; document operations will fail");
    }

    let completion_url = setting(
        "LLM_BASE_URL",
        services.completion_url,
        formfox_llm::DEFAULT_BASE_URL,
    );
    let model = setting(
        "MODEL_NAME",
        services.completion_model,
        formfox_llm::DEFAULT_MODEL,
    );
    let pdfco_url = setting("PDFCO_BASE_URL", services.pdfco_url, formfox_pdfco::DEFAULT_BASE_URL);

    let llm = Arc::new(formfox_llm::CometCompletion::with_endpoint(
        completion_url,
        completion_key.clone().unwrap_or_default(),
        &model,
    ));
    let doc = Arc::new(formfox_pdfco::PdfCo::with_endpoint(
        pdfco_url,
        pdfco_key.clone().unwrap_or_default(),
    ));
    tracing::info!(model = %model, "collaborators configured");

    let upload_dir = std::env::temp_dir().join("formfox-uploads");
    std::fs::create_dir_all(&upload_dir)?;

    let max_upload_mb = file
        .limits
        .as_ref()
        .and_then(|l| l.max_upload_mb)
        .unwrap_or(10) as usize;

    let state = Arc::new(AppState {
        store: formfox_core::SessionStore::new(config.session_idle()),
        llm,
        doc,
        upload_ttl: config.session_idle(),
        config,
        upload_dir: upload_dir.clone(),
        max_upload_bytes: max_upload_mb * 1024 * 1024,
        completion_configured: completion_key.is_some(),
        pdfco_configured: pdfco_key.is_some(),
    });

    // Periodic eviction of idle sessions and their temp uploads.
    let purge_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let sessions = purge_state.store.purge_expired();
            let uploads = upload::purge_expired(&purge_state.upload_dir, purge_state.upload_ttl);
            if sessions > 0 || uploads > 0 {
                tracing::info!(sessions, uploads, "purged expired state");
            }
        }
    });

    // Headroom over the PDF limit for multipart framing
    let body_limit =
        axum::extract::DefaultBodyLimit::max(state.max_upload_bytes + 1024 * 1024);

    let app = axum::Router::new()
        .route("/api/health", axum::routing::get(handlers::health::health))
        .route("/api/upload", axum::routing::post(handlers::upload::upload))
        .route(
            "/api/extract",
            axum::routing::post(handlers::extract::extract),
        )
        .route("/api/chat", axum::routing::post(handlers::chat::chat))
        .route("/api/fill", axum::routing::post(handlers::fill::fill))
        .layer(body_limit)
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000u16);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
