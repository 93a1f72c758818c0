use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tokio::task;
use tracing::{debug, warn};

use super::{
    pdf::extract_pdf_text,
    text::{extract_json_object, truncate_for_prompt},
    AnalysisError, AnalysisResult, AnalysisRunner, ClauseExtraction, DiffSummary, RiskAssessment,
};
use crate::config::AppConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_COMPLETION_TOKENS: u32 = 2000;
const PROMPT_TOKEN_BUDGET: usize = 8000;
const EMBEDDING_BATCH_SIZE: usize = 64;
const ANALYZER_PROMPT: &str = "You are a legal document analyzer. Reply with a single JSON object.";
const ASSISTANT_PROMPT: &str = "You are a helpful contract analysis assistant.";

pub struct OpenAiRunner {
    client: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiRunner {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY must be set to run analysis jobs"))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model: config.openai_chat_model.clone(),
            embedding_model: config.openai_embedding_model.clone(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> AnalysisResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| AnalysisError::Transient(format!("request to {path} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, path, "model API returned an error");
            return Err(classify_status(status, &detail));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| AnalysisError::Fatal(format!("unexpected response from {path}: {err}")))
    }

    async fn complete(
        &self,
        system: &str,
        prompt: String,
        json_reply: bool,
    ) -> AnalysisResult<String> {
        let mut body = json!({
            "model": self.chat_model,
            "temperature": 0.2,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });
        if json_reply {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let completion: ChatCompletion = self.post("/chat/completions", body).await?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AnalysisError::Fatal("model returned no content".into()))?;

        debug!(reply_len = reply.len(), "model reply received");
        Ok(reply)
    }

    async fn complete_json<T: DeserializeOwned>(&self, prompt: String) -> AnalysisResult<T> {
        let reply = self.complete(ANALYZER_PROMPT, prompt, true).await?;
        parse_model_json(&reply)
    }
}

fn classify_status(status: StatusCode, detail: &str) -> AnalysisError {
    let message = format!("model API returned {status}: {detail}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AnalysisError::Transient(message)
    } else {
        AnalysisError::Fatal(message)
    }
}

fn parse_model_json<T: DeserializeOwned>(reply: &str) -> AnalysisResult<T> {
    let object = extract_json_object(reply)
        .ok_or_else(|| AnalysisError::Fatal("model reply contained no JSON object".into()))?;
    serde_json::from_str(object)
        .map_err(|err| AnalysisError::Fatal(format!("model reply did not match schema: {err}")))
}

fn clause_prompt(text: &str) -> String {
    format!(
        "Extract the key clauses from the contract below. Return JSON of the form \
{{\"clauses\": [{{\"type\": string, \"text\": string, \"page\": integer >= 1, \
\"confidence\": number between 0 and 1}}]}}. Include at least four clauses, covering \
parties, term, payment, termination, liability, confidentiality and governing law where \
present. Quote clause text verbatim.\n\nContract:\n{}",
        truncate_for_prompt(text, PROMPT_TOKEN_BUDGET)
    )
}

fn risk_prompt(text: &str) -> String {
    format!(
        "Review the contract below for legal and commercial risks. Return JSON of the form \
{{\"risks\": [{{\"severity\": \"high\" | \"medium\" | \"low\", \"description\": string, \
\"risky_text\": string, \"page\": integer, \"recommendation\": string}}]}}. Quote the risky \
text verbatim. Return an empty list if nothing stands out.\n\nContract:\n{}",
        truncate_for_prompt(text, PROMPT_TOKEN_BUDGET)
    )
}

fn diff_prompt(previous: &str, current: &str) -> String {
    let per_side = PROMPT_TOKEN_BUDGET / 2;
    format!(
        "Compare two versions of the same contract. Return JSON of the form \
{{\"summary\": string, \"diffs\": [{{\"section\": string, \"old\": string, \"new\": string}}]}} \
listing every substantive change. Use an empty string for text that was added or \
removed.\n\nPrevious version:\n{}\n\nCurrent version:\n{}",
        truncate_for_prompt(previous, per_side),
        truncate_for_prompt(current, per_side)
    )
}

fn question_prompt(question: &str, context: &[String]) -> String {
    format!(
        "Answer the following question using ONLY the provided contract context. If you \
cannot find the answer in the context, say so.\n\nQuestion: {question}\n\nContract \
Context:\n{}\n\nAnswer concisely and accurately, referring to specific parts of the \
contract when relevant.",
        truncate_for_prompt(&context.join("\n\n"), PROMPT_TOKEN_BUDGET)
    )
}

#[async_trait]
impl AnalysisRunner for OpenAiRunner {
    async fn extract_text(&self, document: &[u8]) -> AnalysisResult<String> {
        let bytes = document.to_vec();
        let text = task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|err| AnalysisError::Transient(format!("text extraction panicked: {err}")))?
            .map_err(AnalysisError::Fatal)?;

        if text.trim().is_empty() {
            return Err(AnalysisError::Fatal("no text extracted from document".into()));
        }
        Ok(text)
    }

    async fn embed(&self, inputs: &[String]) -> AnalysisResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(inputs.len());

        for batch in inputs.chunks(EMBEDDING_BATCH_SIZE) {
            let response: EmbeddingResponse = self
                .post(
                    "/embeddings",
                    json!({ "model": self.embedding_model, "input": batch }),
                )
                .await?;

            if response.data.len() != batch.len() {
                return Err(AnalysisError::Fatal(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.data.len()
                )));
            }

            let mut data = response.data;
            data.sort_by_key(|datum| datum.index);
            vectors.extend(data.into_iter().map(|datum| datum.embedding));
        }

        Ok(vectors)
    }

    async fn extract_clauses(&self, text: &str) -> AnalysisResult<ClauseExtraction> {
        let extraction: ClauseExtraction = self.complete_json(clause_prompt(text)).await?;
        extraction.validate().map_err(AnalysisError::Fatal)?;
        Ok(extraction)
    }

    async fn assess_risks(&self, text: &str) -> AnalysisResult<RiskAssessment> {
        self.complete_json(risk_prompt(text)).await
    }

    async fn summarize_diff(&self, previous: &str, current: &str) -> AnalysisResult<DiffSummary> {
        self.complete_json(diff_prompt(previous, current)).await
    }

    async fn answer_question(&self, question: &str, context: &[String]) -> AnalysisResult<String> {
        let answer = self
            .complete(ASSISTANT_PROMPT, question_prompt(question, context), false)
            .await?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "bad key").is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "").is_transient());
    }

    #[test]
    fn fenced_model_reply_parses_into_schema() {
        let reply = "```json\n{\"summary\": \"Payment terms changed\", \"diffs\": [\
{\"section\": \"Payment\", \"old\": \"30 days\", \"new\": \"45 days\"}]}\n```";
        let summary: DiffSummary = parse_model_json(reply).unwrap();
        assert_eq!(summary.diffs.len(), 1);
        assert_eq!(summary.diffs[0].new, "45 days");
    }

    #[test]
    fn schema_mismatch_is_fatal() {
        let err = parse_model_json::<ClauseExtraction>("{\"clauses\": \"none\"}").unwrap_err();
        assert!(!err.is_transient());
        let err = parse_model_json::<ClauseExtraction>("I cannot help").unwrap_err();
        assert!(matches!(err, AnalysisError::Fatal(_)));
    }

    #[test]
    fn prompts_embed_truncated_text() {
        let long = "word ".repeat(PROMPT_TOKEN_BUDGET * 2);
        let prompt = clause_prompt(&long);
        assert!(prompt.len() < long.len());
        assert!(prompt.ends_with("..."));
    }

    #[test]
    fn question_prompt_carries_question_and_passages() {
        let context = vec![
            "Fees are due within 30 days.".to_string(),
            "Either party may terminate on notice.".to_string(),
        ];
        let prompt = question_prompt("When are fees due?", &context);
        assert!(prompt.contains("Question: When are fees due?"));
        assert!(prompt.contains("Fees are due within 30 days.\n\nEither party may terminate"));
        assert!(prompt.contains("ONLY the provided contract context"));
    }
}
