use intake_api_rest::{AppState, router};
use intake_core::constants::ENV_REST_ADDR;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the patient intake server
///
/// Resolves the backend configuration once, then serves the REST API (with Swagger UI at
/// `/swagger-ui`) on `INTAKE_REST_ADDR`.
///
/// # Environment Variables
/// - `INTAKE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `INTAKE_BACKEND`: `appwrite` (default) or `memory`
/// - `APPWRITE_ENDPOINT`, `APPWRITE_PROJECT_ID`, `APPWRITE_API_KEY`, `APPWRITE_DATABASE_ID`,
///   `APPWRITE_PATIENT_COLLECTION_ID`, `APPWRITE_BUCKET_ID`: backend identifiers, required for
///   the `appwrite` backend
/// - `INTAKE_REQUEST_TIMEOUT_SECS`: bound on each backend call (default: 10)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the backend configuration is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("intake=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var(ENV_REST_ADDR).unwrap_or_else(|_| "0.0.0.0:3000".into());

    let service = intake_appwrite::provisioning_from_lookup(|key| std::env::var(key).ok())?;
    let app = router(AppState { service });

    tracing::info!("++ Starting patient intake REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
