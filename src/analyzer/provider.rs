//! LLM back-ends the analyzer can talk to.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};

/// Temperature used for analysis calls; rankings should be repeatable.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String>;

    fn name(&self) -> &'static str;
}

pub struct OllamaProvider {
    client: ollama_rs::Ollama,
}

impl OllamaProvider {
    pub fn new(client: ollama_rs::Ollama) -> Self {
        Self { client }
    }

    /// Connect to an Ollama server at `base_url`, e.g. `http://localhost:11434`.
    pub fn from_base_url(base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).with_context(|| format!("Invalid Ollama URL: {}", base_url))?;
        let host = url.host_str().context("Ollama URL has no host")?;
        let port = url.port_or_known_default().unwrap_or(11434);
        let client = ollama_rs::Ollama::new(format!("{}://{}", url.scheme(), host), port);
        Ok(Self { client })
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};

        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(ChatMessage::system(sys));
        }
        messages.push(ChatMessage::user(prompt));

        let res = self
            .client
            .send_chat_messages(ChatMessageRequest::new(model.to_string(), messages))
            .await?;

        Ok(res.message.content)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Chat completion request: system message first when given.
    fn request_body(&self, model: &str, prompt: String, system: Option<String>) -> Value {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({ "role": "system", "content": sys }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }
}

/// Text of the first choice. Some servers send the content as a list of
/// typed parts; the text parts are joined.
fn completion_text(reply: &Value) -> Result<String> {
    if let Some(message) = reply["error"]["message"].as_str() {
        bail!("Completion server reported an error: {}", message);
    }
    let content = &reply["choices"][0]["message"]["content"];
    match content {
        Value::String(text) => Ok(text.clone()),
        Value::Array(parts) => Ok(parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join("")),
        _ => bail!("Failed to parse content from completion response"),
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let body = self.request_body(model, prompt, system);
        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?.error_for_status()?;
        let reply: Value = res.json().await?;
        completion_text(&reply)
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}
