use crate::config::Config;
use crate::deepgram_adapter::{DeepgramRecognizer, DeepgramSynthesizer};
use crate::prompt_loader::Prompts;
use crate::twilio;
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use concierge_core::booking::{BookingDesk, BookingStore};
use concierge_core::{CallConfig, CallSessionController, ChatClient, TurnConfig};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Everything a call needs that outlives the call.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    prompts: Arc<Prompts>,
    desk: BookingDesk,
}

impl AppState {
    pub fn new(config: Config, prompts: Prompts) -> Self {
        Self {
            config: Arc::new(config),
            prompts: Arc::new(prompts),
            desk: BookingDesk::new(Arc::new(BookingStore::new())),
        }
    }

    pub fn call_config(&self) -> CallConfig {
        CallConfig {
            greeting: self.prompts.greeting.clone(),
            system_prompt: self.prompts.system.clone(),
            echo_back: self.config.echo_back,
            max_reconnects: self.config.tts_max_reconnects,
            turn: TurnConfig {
                max_tool_rounds: self.config.max_tool_rounds,
                ..TurnConfig::default()
            },
            ..CallConfig::default()
        }
    }

    fn listen_config(&self) -> deepgram::Config {
        deepgram::Config::listen_builder()
            .with_api_key(self.config.deepgram_api_key.expose_secret())
            .build()
    }

    fn speak_config(&self) -> deepgram::Config {
        deepgram::Config::speak_builder()
            .with_api_key(self.config.deepgram_api_key.expose_secret())
            .with_model(&self.config.voice_model)
            .build()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/twilio", get(twilio_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn twilio_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    tracing::info!("media stream upgrade requested");
    ws.on_upgrade(move |socket| handle_call(socket, state))
}

/// Run one phone call over an upgraded media-stream socket.
async fn handle_call(socket: WebSocket, state: AppState) {
    tracing::info!("media stream connected");
    let (channel, events) = twilio::attach(socket);

    let model = ChatClient::new(
        &state.config.openai_base_url,
        state.config.openai_api_key.clone(),
        &state.config.llm_model,
    );
    let controller = CallSessionController::new(
        state.call_config(),
        Arc::new(DeepgramRecognizer::new(state.listen_config())),
        Arc::new(DeepgramSynthesizer::new(state.speak_config())),
        channel.clone(),
        Arc::new(model),
        state.desk.clone(),
    );

    match controller.run(events).await {
        Ok(end) => tracing::info!(stream_sid = ?channel.stream_sid(), ?end, "call ended"),
        Err(e) => tracing::error!(stream_sid = ?channel.stream_sid(), "call failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::path::PathBuf;
    use tracing::Level;

    fn config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            deepgram_api_key: SecretString::from("dg-key".to_string()),
            openai_api_key: SecretString::from("sk-key".to_string()),
            openai_base_url: "http://localhost:1234/v1".to_string(),
            llm_model: "test-model".to_string(),
            voice_model: "aura-test".to_string(),
            echo_back: true,
            prompts_dir: PathBuf::from("prompts"),
            max_tool_rounds: 2,
            tts_max_reconnects: 7,
            log_level: Level::INFO,
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[test]
    fn call_config_follows_service_config() {
        let prompts = Prompts {
            system: "Be brief.".to_string(),
            greeting: "Seaview Hotel, hello.".to_string(),
        };
        let state = AppState::new(config(), prompts);
        let call = state.call_config();

        assert_eq!(call.greeting, "Seaview Hotel, hello.");
        assert_eq!(call.system_prompt, "Be brief.");
        assert!(call.echo_back);
        assert_eq!(call.max_reconnects, 7);
        assert_eq!(call.turn.max_tool_rounds, 2);
        assert_eq!(call.frame_size, 160);
        assert_eq!(state.speak_config().model(), "aura-test");
    }
}
