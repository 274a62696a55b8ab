//! Storyloom Engine - main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyloom_engine::api;
use storyloom_engine::app::App;
use storyloom_engine::generation::GenerationConfig;
use storyloom_engine::infrastructure::{fake_llm::FakeLlm, openai::OpenAiClient, ports::LlmPort};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyloom_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Storyloom Engine");

    let server_host = std::env::var("STORYLOOM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let server_port: u16 = std::env::var("STORYLOOM_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .unwrap_or(3000);
    let default_model =
        std::env::var("STORYLOOM_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let fake_llm = std::env::var("STORYLOOM_FAKE_LLM")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let (llm, config): (Arc<dyn LlmPort>, Arc<GenerationConfig>) = if fake_llm {
        tracing::info!("Using scripted fake LLM (STORYLOOM_FAKE_LLM is set)");
        (Arc::new(FakeLlm::for_game()), Arc::new(GenerationConfig::fake()))
    } else {
        let client = OpenAiClient::from_env();
        let config = GenerationConfig::from_env(&default_model)?;
        tracing::info!(model = %default_model, "LLM client configured");
        (Arc::new(client), Arc::new(config))
    };

    let app = Arc::new(App::in_memory(llm, config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = axum::Router::new()
        .route("/ws/story/{story_id}", get(api::websocket::ws_handler))
        .merge(api::http::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app);

    let addr: SocketAddr = format!("{server_host}:{server_port}").parse()?;
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
