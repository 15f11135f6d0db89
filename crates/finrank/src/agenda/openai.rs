//! OpenAI-compatible chat-completions agenda service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::AgendaService;
use crate::config::Config;
use crate::error::AgendaError;
use crate::models::AuthorPaper;

const SYSTEM_PROMPT: &str = "You are a finance research expert who identifies research agendas \
from academic papers. Respond with only the research agenda in 3-5 words, nothing else.";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 20;

/// Agenda service backed by a chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiAgendaService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiAgendaService {
    /// Create a service from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgendaError::MissingApiKey`] without an API key, or an HTTP
    /// error if the client cannot be built.
    pub fn new(config: &Config) -> Result<Self, AgendaError> {
        let api_key = config
            .openai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgendaError::MissingApiKey("OPENAI_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.openai_model.clone(),
        })
    }

    /// Build the user prompt for an author.
    #[must_use]
    pub fn prompt(author: &str, papers: &[AuthorPaper]) -> String {
        let listing = papers
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "{}. Title: {}\n   Abstract: {}\n   Citations: {}",
                    i + 1,
                    p.title,
                    p.abstract_text.as_deref().unwrap_or("No abstract available"),
                    p.citation_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Based on the following research papers by {author}, identify their primary research \
             agenda in 3-5 words.\n\n\
             The agenda should name their main research focus in finance and how its fields \
             interact, for example \"Credit Markets interactions with Banking\" or \
             \"ESG and Climate Finance\".\n\n\
             Papers:\n{listing}\n\n\
             Primary Research Agenda (3-5 words):"
        )
    }
}

/// Trim whitespace and surrounding quotes from a model reply.
fn clean_reply(reply: &str) -> String {
    reply.trim().trim_matches('"').trim_matches('\'').trim().to_string()
}

#[async_trait]
impl AgendaService for OpenAiAgendaService {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn summarize(&self, author: &str, papers: &[AuthorPaper]) -> Result<String, AgendaError> {
        let prompt = Self::prompt(author, papers);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgendaError::Status { status: status.as_u16(), message });
        }

        let reply: ChatResponse = response.json().await?;
        let summary = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| clean_reply(&c))
            .unwrap_or_default();

        if summary.is_empty() { Err(AgendaError::EmptyResponse) } else { Ok(summary) }
    }
}

impl std::fmt::Debug for OpenAiAgendaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAgendaService")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}
