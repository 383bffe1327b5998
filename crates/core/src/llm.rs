use anyhow::{Context, Result};
use async_trait::async_trait;
use concierge_types::chat::{ChatCompletionRequest, ChatCompletionResponse, ChatStreamChunk};
use concierge_types::{ChatMessage, Tool};
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const STREAM_CHANNEL_CAPACITY: usize = 100;

/// An OpenAI-compatible chat-completions backend.
///
/// `complete` is used for tool rounds; once the model stops asking for tools
/// the spoken reply is requested again through `stream`, without tools.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], tools: &[Tool]) -> Result<ChatMessage>;

    async fn stream(&self, messages: &[ChatMessage]) -> Result<mpsc::Receiver<Result<String>>>;
}

pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: SecretString, model: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature: 0.2,
            max_tokens: 800,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, body: &ChatCompletionRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                model = %self.model,
                base_url = %self.base_url,
                %status,
                "chat completion rejected: {}",
                error_text
            );
            anyhow::bail!("chat completion API error ({}): {}", status, error_text);
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, messages: &[ChatMessage], tools: &[Tool]) -> Result<ChatMessage> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response = self
            .post(&body)
            .await?
            .json::<ChatCompletionResponse>()
            .await
            .context("failed to decode chat completion")?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<mpsc::Receiver<Result<String>>> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            tools: None,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        };
        let response = self.post(&body).await?;
        tracing::debug!(model = %self.model, "completion stream established");

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            use futures_util::TryStreamExt;
            let mut stream = response.bytes_stream();
            // Raw bytes, so a character split across chunks survives decoding.
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                let bytes = match stream.try_next().await {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow::Error::new(e).context("completion stream broke"))).await;
                        return;
                    }
                };
                buffer.extend_from_slice(&bytes);

                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    match parse_sse_line(&String::from_utf8_lossy(&line)) {
                        SseLine::Content(content) => {
                            if tx.send(Ok(content)).await.is_err() {
                                // Receiver dropped, the turn was abandoned.
                                return;
                            }
                        }
                        SseLine::Done => return,
                        SseLine::Skip => {}
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Content(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<ChatStreamChunk>(data) {
        Ok(chunk) => match chunk.content() {
            Some(content) if !content.is_empty() => SseLine::Content(content.to_string()),
            _ => SseLine::Skip,
        },
        Err(e) => {
            tracing::debug!("failed to parse completion chunk: {} - data: {}", e, data);
            SseLine::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_content_lines_yield_text() {
        let line = r#"data: {"choices":[{"delta":{"content":"We have"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Content("We have".to_string()));
    }

    #[test]
    fn sse_done_and_noise() {
        assert_eq!(parse_sse_line("data: [DONE]\n"), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseLine::Skip
        );
        assert_eq!(parse_sse_line("data: {not json"), SseLine::Skip);
    }

    #[test]
    fn client_trims_trailing_slash_from_base_url() {
        let client = ChatClient::new("http://localhost:8080/v1/", SecretString::from("k"), "m");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model(), "m");
    }
}
