use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::utils::{FolioError, FolioResult};

/// 一次文本生成请求
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 外部文本生成服务
///
/// 提示词与返回内容对调用方都是不透明的字符串。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> FolioResult<String>;

    /// 日志里显示的服务名
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
    Groq,
}

impl Provider {
    /// `auto` 模式下的探测顺序
    pub const DETECTION_ORDER: [Provider; 3] = [Provider::Anthropic, Provider::OpenAi, Provider::Groq];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Some(Provider::Anthropic),
            "openai" => Some(Provider::OpenAi),
            "groq" => Some(Provider::Groq),
            _ => None,
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com/v1/messages",
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
            Provider::Groq => "https://api.groq.com/openai/v1/chat/completions",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3-haiku-20240307",
            Provider::OpenAi => "gpt-3.5-turbo",
            Provider::Groq => "llama3-8b-8192",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic Claude",
            Provider::OpenAi => "OpenAI GPT",
            Provider::Groq => "Groq",
        }
    }
}

/// 根据配置和环境变量确定服务与密钥
///
/// `provider = "none"` 关闭外部调用；`auto` 按 Anthropic → OpenAI → Groq 的顺序
/// 取第一个有密钥的服务；指定服务时优先使用 `api_key`，否则读对应环境变量。
pub fn detect_provider<F>(config: &LlmConfig, lookup: F) -> Option<(Provider, String)>
where
    F: Fn(&str) -> Option<String>,
{
    let key_for = |provider: Provider| {
        if !config.api_key.trim().is_empty() {
            return Some(config.api_key.trim().to_string());
        }
        lookup(provider.env_var()).filter(|k| !k.trim().is_empty())
    };

    match config.provider.trim().to_lowercase().as_str() {
        "none" | "off" | "" => None,
        "auto" => Provider::DETECTION_ORDER
            .iter()
            .find_map(|p| lookup(p.env_var()).filter(|k| !k.trim().is_empty()).map(|k| (*p, k))),
        other => {
            let provider = Provider::from_name(other)?;
            key_for(provider).map(|key| (provider, key))
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI 兼容接口（OpenAI、Groq）
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Anthropic Messages 接口
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

// 退避指数上限：500ms × 2^6 = 32s
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// 第 n 次重试前的等待：500ms × 2^n，指数封顶
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.min(MAX_BACKOFF_EXPONENT));
    Duration::from_millis(500u64.saturating_mul(factor))
}

pub struct LlmClient {
    client: reqwest::Client,
    provider: Provider,
    api_key: String,
    api_url: String,
    model: String,
    max_retries: u32,
}

impl LlmClient {
    pub fn new(provider: Provider, api_key: String, config: &LlmConfig) -> FolioResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_url = if config.api_url.trim().is_empty() {
            provider.default_url().to_string()
        } else {
            config.api_url.trim().to_string()
        };
        let model = if config.model.trim().is_empty() {
            provider.default_model().to_string()
        } else {
            config.model.trim().to_string()
        };

        info!("文本生成服务: {} ({})", provider.display_name(), model);
        Ok(Self {
            client,
            provider,
            api_key,
            api_url,
            model,
            max_retries: config.max_retries.max(1),
        })
    }

    /// 按配置与环境变量创建客户端；没有可用服务时返回 `None`
    pub fn from_config(config: &LlmConfig) -> FolioResult<Option<Self>> {
        let name = config.provider.trim().to_lowercase();
        if !matches!(name.as_str(), "auto" | "none" | "off" | "") && Provider::from_name(&name).is_none() {
            return Err(FolioError::ConfigError(format!("未知的 llm.provider: {}", config.provider)));
        }
        match detect_provider(config, |var| std::env::var(var).ok()) {
            Some((provider, key)) => Ok(Some(Self::new(provider, key, config)?)),
            None => {
                warn!("没有可用的文本生成服务（provider = {}），将使用模板摘要", config.provider);
                Ok(None)
            }
        }
    }

    /// 带重试的调用，退避时间见 `backoff_delay`
    async fn call_api(&self, request: &CompletionRequest) -> FolioResult<String> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                info!("API 重试 ({}/{})，等待 {}ms...", attempt + 1, self.max_retries, delay.as_millis());
                tokio::time::sleep(delay).await;
            }

            match self.do_request(request).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!("API 调用失败 (尝试 {}/{}): {}", attempt + 1, self.max_retries, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FolioError::LlmError("API 调用失败".to_string())))
    }

    async fn do_request(&self, request: &CompletionRequest) -> FolioResult<String> {
        let builder = match self.provider {
            Provider::Anthropic => {
                let body = MessagesRequest {
                    model: &self.model,
                    max_tokens: request.max_tokens,
                    temperature: request.temperature,
                    system: request.system.as_deref(),
                    messages: vec![ChatMessage {
                        role: "user",
                        content: &request.prompt,
                    }],
                };
                self.client
                    .post(&self.api_url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
            }
            Provider::OpenAi | Provider::Groq => {
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = request.system.as_deref() {
                    messages.push(ChatMessage { role: "system", content: system });
                }
                messages.push(ChatMessage {
                    role: "user",
                    content: &request.prompt,
                });
                let body = ChatRequest {
                    model: &self.model,
                    messages,
                    max_tokens: request.max_tokens,
                    temperature: request.temperature,
                };
                self.client
                    .post(&self.api_url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&body)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FolioError::LlmError(format!("API 返回错误 {}: {}", status, body)));
        }

        let content = match self.provider {
            Provider::Anthropic => {
                let parsed: MessagesResponse = response.json().await?;
                parsed.content.into_iter().next().map(|b| b.text)
            }
            Provider::OpenAi | Provider::Groq => {
                let parsed: ChatResponse = response.json().await?;
                parsed.choices.into_iter().next().map(|c| c.message.content)
            }
        };

        match content.map(|c| c.trim().to_string()) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(FolioError::LlmError("API 响应中没有文本内容".to_string())),
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> FolioResult<String> {
        self.call_api(request).await
    }

    fn name(&self) -> &str {
        self.provider.display_name()
    }
}
