use async_trait::async_trait;
use thiserror::Error;

pub mod openai;
pub mod pdf;
pub mod results;
pub mod text;

pub use openai::OpenAiRunner;
pub use results::{
    Clause, ClauseExtraction, DiffEntry, DiffSummary, EmbeddingSummary, Risk, RiskAssessment,
    Severity, TaskResult,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("transient analysis failure: {0}")]
    Transient(String),
    #[error("analysis failed: {0}")]
    Fatal(String),
}

impl AnalysisError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::Transient(_))
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[async_trait]
pub trait AnalysisRunner: Send + Sync + 'static {
    async fn extract_text(&self, document: &[u8]) -> AnalysisResult<String>;

    async fn embed(&self, inputs: &[String]) -> AnalysisResult<Vec<Vec<f32>>>;

    async fn extract_clauses(&self, text: &str) -> AnalysisResult<ClauseExtraction>;

    async fn assess_risks(&self, text: &str) -> AnalysisResult<RiskAssessment>;

    async fn summarize_diff(&self, previous: &str, current: &str) -> AnalysisResult<DiffSummary>;

    async fn answer_question(&self, question: &str, context: &[String]) -> AnalysisResult<String>;
}
