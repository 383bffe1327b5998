use crate::client::config::Config;
use crate::client::consts::AUTHORIZATION_HEADER;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

pub fn listen_url(config: &Config) -> String {
    format!(
        "{}/listen?model={}&encoding={}&sample_rate={}&channels=1&vad_events=true\
         &endpointing=100&utterance_end_ms=1000&punctuate=true&interim_results=true",
        config.base_url(),
        config.model(),
        config.encoding(),
        config.sample_rate()
    )
}

pub fn speak_url(config: &Config) -> String {
    format!(
        "{}/speak?model={}&encoding={}&sample_rate={}",
        config.base_url(),
        config.model(),
        config.encoding(),
        config.sample_rate()
    )
}

pub fn build_request(url: String, config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        AUTHORIZATION_HEADER,
        format!("Token {}", config.api_key().expose_secret())
            .as_str()
            .parse()?,
    );
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_url_carries_telephony_parameters() {
        let config = Config::listen_builder()
            .with_base_url("wss://example.test/v1")
            .with_api_key("secret")
            .build();

        let url = listen_url(&config);
        assert!(url.starts_with("wss://example.test/v1/listen?model=nova-2"));
        assert!(url.contains("encoding=mulaw"));
        assert!(url.contains("sample_rate=8000"));
        assert!(url.contains("vad_events=true"));
        assert!(url.contains("interim_results=true"));
    }

    #[test]
    fn request_uses_token_authorization() {
        let config = Config::speak_builder()
            .with_api_key("secret")
            .with_model("aura-2-thalia-en")
            .build();

        let request = build_request(speak_url(&config), &config).unwrap();
        assert_eq!(request.headers()[AUTHORIZATION_HEADER], "Token secret");
        assert!(request.uri().to_string().contains("model=aura-2-thalia-en"));
    }
}
