//! [`LlmGateway`] backed by a local Ollama-compatible inference server.
//! Chat/translate stream newline-delimited JSON chunks over HTTP; vision
//! and embeddings are single-shot request/response.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use super::vision::{constrain_and_align, looks_like_image_bytes, looks_like_text_payload, VISION_UNAVAILABLE};
use super::{resolve_model, ChatStream, LlmGateway, StreamEvent};

const CHAT_TIMEOUT: Duration = Duration::from_secs(300);
const SHORT_TIMEOUT: Duration = Duration::from_secs(30);
const MEMORY_WINDOW: usize = 20;

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Resolved, ready-to-use model set. Built once at startup after probing
/// the server's `/api/tags` inventory; callers never see an unresolved
/// configured name.
#[derive(Debug, Clone)]
pub struct ResolvedModels {
    pub vision: String,
    pub embedding: String,
    pub reasoning: String,
    pub translator: String,
}

type MemoryStore = Arc<Mutex<HashMap<String, VecDeque<ChatMessage>>>>;

pub struct LocalLlmGateway {
    client: reqwest::Client,
    base_url: String,
    models: ResolvedModels,
    memory: MemoryStore,
}

impl LocalLlmGateway {
    /// Probes `/api/tags` for the server's model inventory and resolves
    /// each configured model name (exact match, else family-prefix
    /// fallback). Fails startup — per the fatal-error contract around
    /// gateway configuration — if either the reasoning or translator role
    /// has no family match at all; vision/embedding fall back to their
    /// configured name verbatim since a missing OCR or embedding model
    /// degrades gracefully at call time instead.
    pub async fn connect(config: &crate::config::OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("building reqwest client")?;

        let inventory = fetch_model_inventory(&client, &config.base_url).await?;

        let reasoning = resolve_model(&inventory, &config.reasoning_model, &config.reasoning_family)
            .ok_or_else(|| {
                anyhow!(
                    "no model in the local inventory matches reasoning model '{}' or family '{}'",
                    config.reasoning_model,
                    config.reasoning_family
                )
            })?;
        let translator = resolve_model(&inventory, &config.translator_model, &config.translator_family)
            .ok_or_else(|| {
                anyhow!(
                    "no model in the local inventory matches translator model '{}' or family '{}'",
                    config.translator_model,
                    config.translator_family
                )
            })?;

        let models = ResolvedModels {
            vision: config.vision_model.clone(),
            embedding: config.embedding_model.clone(),
            reasoning,
            translator,
        };

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            models,
            memory: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn models(&self) -> &ResolvedModels {
        &self.models
    }

    fn push_memory(&self, scope: &str, role: &'static str, content: String) {
        push_memory_into(&self.memory, scope, role, content);
    }

    fn memory_snapshot(&self, scope: &str) -> Vec<ChatMessage> {
        self.memory
            .lock()
            .expect("memory mutex poisoned")
            .get(scope)
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn stream_chat(&self, model: String, messages: Vec<ChatMessage>, memory_scope: Option<String>) -> ChatStream {
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let producer_cancel = cancel.clone();
        let client = self.client.clone();
        let url = format!("{}/api/chat", self.base_url);
        let memory = self.memory.clone();

        tokio::spawn(async move {
            match run_chat_stream(&client, &url, &model, &messages, &tx, &producer_cancel).await {
                Ok(full_text) => {
                    if let Some(scope) = memory_scope {
                        if !full_text.is_empty() {
                            push_memory_into(&memory, &scope, "assistant", full_text);
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                }
            }
        });

        ChatStream::new(rx, cancel)
    }
}

/// Shared by the instance method and the streaming task, which only holds a
/// cloned `Arc<Mutex<_>>` and not `&LocalLlmGateway`.
fn push_memory_into(memory: &MemoryStore, scope: &str, role: &'static str, content: String) {
    let mut memory = memory.lock().expect("memory mutex poisoned");
    let window = memory.entry(scope.to_string()).or_default();
    window.push_back(ChatMessage { role, content });
    while window.len() > MEMORY_WINDOW {
        window.pop_front();
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChatChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunkMessage {
    #[serde(default)]
    content: String,
}

async fn run_chat_stream(
    client: &reqwest::Client,
    url: &str,
    model: &str,
    messages: &[ChatMessage],
    tx: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
) -> Result<String> {
    let response = client
        .post(url)
        .timeout(CHAT_TIMEOUT)
        .json(&ChatRequest {
            model,
            messages,
            stream: true,
        })
        .send()
        .await
        .context("sending chat request")?
        .error_for_status()
        .context("chat request returned an error status")?;

    let mut byte_stream = response.bytes_stream();
    let mut line_buffer = String::new();
    let mut full_text = String::new();

    while let Some(chunk) = byte_stream.next().await {
        if cancel.is_cancelled() {
            return Ok(full_text);
        }
        let chunk = chunk.context("reading chat stream chunk")?;
        line_buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(newline_pos) = line_buffer.find('\n') {
            let line = line_buffer[..newline_pos].trim().to_string();
            line_buffer = line_buffer[newline_pos + 1..].to_string();
            if line.is_empty() {
                continue;
            }

            let parsed: ChatChunk = serde_json::from_str(&line).context("parsing chat chunk")?;
            if let Some(msg) = parsed.message {
                if !msg.content.is_empty() {
                    full_text.push_str(&msg.content);
                    if tx.send(StreamEvent::Token(msg.content)).await.is_err() {
                        return Ok(full_text);
                    }
                }
            }
            if parsed.done {
                let _ = tx.send(StreamEvent::Complete(full_text.clone())).await;
                return Ok(full_text);
            }
        }
    }

    let _ = tx.send(StreamEvent::Complete(full_text.clone())).await;
    Ok(full_text)
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Debug, Deserialize)]
struct TagsModel {
    name: String,
}

async fn fetch_model_inventory(client: &reqwest::Client, base_url: &str) -> Result<Vec<String>> {
    let url = format!("{base_url}/api/tags");
    let response = client
        .get(&url)
        .timeout(SHORT_TIMEOUT)
        .send()
        .await
        .context("fetching model inventory")?
        .error_for_status()
        .context("model inventory request returned an error status")?;
    let tags: TagsResponse = response.json().await.context("parsing model inventory")?;
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

#[async_trait::async_trait]
impl LlmGateway for LocalLlmGateway {
    async fn chat(&self, scope: &str, message: &str) -> Result<ChatStream> {
        let mut messages = self.memory_snapshot(scope);
        messages.push(ChatMessage {
            role: "user",
            content: message.to_string(),
        });
        self.push_memory(scope, "user", message.to_string());

        Ok(self.stream_chat(self.models.reasoning.clone(), messages, Some(scope.to_string())))
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<ChatStream> {
        let prompt = format!(
            "Translate the following text from {source_lang} to {target_lang}. \
             Reply with only the translation, no commentary.\n\n{text}"
        );
        let messages = vec![ChatMessage {
            role: "user",
            content: prompt,
        }];
        Ok(self.stream_chat(self.models.translator.clone(), messages, None))
    }

    async fn vision(&self, image_url: &str) -> String {
        match run_vision(&self.client, &self.base_url, &self.models.vision, image_url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("vision request failed for {image_url}: {e}");
                VISION_UNAVAILABLE.to_string()
            }
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(SHORT_TIMEOUT)
            .json(&EmbedRequest {
                model: &self.models.embedding,
                prompt: text,
            })
            .send()
            .await
            .context("sending embed request")?
            .error_for_status()
            .context("embed request returned an error status")?;
        let parsed: EmbedResponse = response.json().await.context("parsing embed response")?;
        Ok(parsed.embedding)
    }
}

async fn run_vision(client: &reqwest::Client, base_url: &str, model: &str, image_url: &str) -> Result<String> {
    let bytes = client
        .get(image_url)
        .timeout(SHORT_TIMEOUT)
        .send()
        .await
        .context("fetching image")?
        .error_for_status()
        .context("image fetch returned an error status")?
        .bytes()
        .await
        .context("reading image bytes")?;

    if looks_like_text_payload(&bytes) || !looks_like_image_bytes(&bytes) {
        return Err(anyhow!("payload at {image_url} does not look like image bytes"));
    }

    let decoded = image::load_from_memory(&bytes).context("decoding image")?;
    let (target_w, target_h) = constrain_and_align(decoded.width(), decoded.height());
    let resized = decoded.resize_exact(target_w, target_h, image::imageops::FilterType::Lanczos3);

    let mut jpeg_bytes = Vec::new();
    {
        let mut cursor = std::io::Cursor::new(&mut jpeg_bytes);
        resized
            .write_to(&mut cursor, image::ImageFormat::Jpeg)
            .context("re-encoding image as JPEG")?;
    }
    let b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &jpeg_bytes);

    let url = format!("{base_url}/api/generate");
    let response = client
        .post(&url)
        .timeout(SHORT_TIMEOUT)
        .json(&GenerateRequest {
            model,
            prompt: "Describe exactly what text and imagery appear in this image.",
            images: vec![b64],
            stream: false,
        })
        .send()
        .await
        .context("sending vision request")?
        .error_for_status()
        .context("vision request returned an error status")?;
    let parsed: GenerateResponse = response.json().await.context("parsing vision response")?;
    Ok(parsed.response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_window_caps_at_twenty_messages() {
        let gateway = LocalLlmGateway {
            client: reqwest::Client::new(),
            base_url: "http://127.0.0.1:11434".to_string(),
            models: ResolvedModels {
                vision: "v".to_string(),
                embedding: "e".to_string(),
                reasoning: "r".to_string(),
                translator: "t".to_string(),
            },
            memory: Arc::new(Mutex::new(HashMap::new())),
        };

        for i in 0..30 {
            gateway.push_memory("scope-a", "user", format!("message {i}"));
        }

        let snapshot = gateway.memory_snapshot("scope-a");
        assert_eq!(snapshot.len(), MEMORY_WINDOW);
        assert_eq!(snapshot.first().unwrap().content, "message 10");
        assert_eq!(snapshot.last().unwrap().content, "message 29");
    }

    #[test]
    fn memory_scopes_are_isolated() {
        let gateway = LocalLlmGateway {
            client: reqwest::Client::new(),
            base_url: "http://127.0.0.1:11434".to_string(),
            models: ResolvedModels {
                vision: "v".to_string(),
                embedding: "e".to_string(),
                reasoning: "r".to_string(),
                translator: "t".to_string(),
            },
            memory: Arc::new(Mutex::new(HashMap::new())),
        };

        gateway.push_memory("a", "user", "hello".to_string());
        gateway.push_memory("b", "user", "goodbye".to_string());

        assert_eq!(gateway.memory_snapshot("a").len(), 1);
        assert_eq!(gateway.memory_snapshot("b").len(), 1);
        assert_eq!(gateway.memory_snapshot("a")[0].content, "hello");
    }
}
