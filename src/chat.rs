use std::{cmp::Ordering, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    analysis::{AnalysisError, AnalysisRunner},
    error::{EngineError, EngineResult},
    models::Embedding,
    store::ContractStore,
};

pub const CONTEXT_PASSAGES: usize = 3;
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find relevant information in the contract to answer your question.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub text: String,
    pub page: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

impl ChatAnswer {
    fn no_context() -> Self {
        Self {
            answer: NO_CONTEXT_ANSWER.to_string(),
            citations: Vec::new(),
        }
    }
}

pub struct ContractChat {
    store: Arc<dyn ContractStore>,
    runner: Arc<dyn AnalysisRunner>,
}

impl ContractChat {
    pub fn new(store: Arc<dyn ContractStore>, runner: Arc<dyn AnalysisRunner>) -> Self {
        Self { store, runner }
    }

    pub async fn ask(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        question: &str,
    ) -> EngineResult<ChatAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::validation("question text is required"));
        }

        self.store
            .find_version(version_id)
            .await?
            .filter(|version| version.contract_id == contract_id)
            .ok_or(EngineError::NotFound("version"))?;

        let rows = self.store.list_embeddings(version_id).await?;
        if rows.is_empty() {
            debug!(%contract_id, %version_id, "no embeddings stored for version");
            return Ok(ChatAnswer::no_context());
        }

        let query = self
            .runner
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::Fatal("no embedding returned for question".into()))?;

        let citations = closest_passages(&query, rows, CONTEXT_PASSAGES);
        if citations.is_empty() {
            return Ok(ChatAnswer::no_context());
        }

        let context: Vec<String> = citations.iter().map(|c| c.text.clone()).collect();
        let answer = self.runner.answer_question(question, &context).await?;
        info!(%contract_id, %version_id, passages = citations.len(), "contract question answered");

        Ok(ChatAnswer { answer, citations })
    }
}

fn closest_passages(query: &[f32], rows: Vec<Embedding>, limit: usize) -> Vec<Citation> {
    let mut scored: Vec<(f32, Embedding)> = rows
        .into_iter()
        .filter_map(|row| {
            let vector = Vec::<f32>::deserialize(&row.embedding).ok()?;
            cosine_similarity(query, &vector).map(|score| (score, row))
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, row)| Citation {
            text: row.text,
            page: row.page_num,
        })
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}
