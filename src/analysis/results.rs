use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::AiTaskType;

pub const NO_CHANGES_SUMMARY: &str =
    "No changes detected between this version and the previous version.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(rename = "type")]
    pub clause_type: String,
    pub text: String,
    pub page: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseExtraction {
    pub clauses: Vec<Clause>,
}

impl ClauseExtraction {
    pub const MIN_CLAUSES: usize = 4;

    pub fn validate(&self) -> Result<(), String> {
        if self.clauses.len() < Self::MIN_CLAUSES {
            return Err(format!(
                "expected at least {} clauses, got {}",
                Self::MIN_CLAUSES,
                self.clauses.len()
            ));
        }

        for (index, clause) in self.clauses.iter().enumerate() {
            if clause.page < 1 {
                return Err(format!("clause {index} has page {}", clause.page));
            }
            if !(0.0..=1.0).contains(&clause.confidence) {
                return Err(format!(
                    "clause {index} has confidence {} outside [0, 1]",
                    clause.confidence
                ));
            }
            if clause.text.trim().is_empty() {
                return Err(format!("clause {index} has empty text"));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

// Models are inconsistent about casing ("High" vs "high").
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(de::Error::unknown_variant(&raw, &["high", "medium", "low"])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub risky_text: String,
    pub page: u32,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risks: Vec<Risk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub section: String,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub summary: String,
    pub diffs: Vec<DiffEntry>,
}

impl DiffSummary {
    pub fn no_changes() -> Self {
        Self {
            summary: NO_CHANGES_SUMMARY.to_string(),
            diffs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSummary {
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskResult {
    Embedding(EmbeddingSummary),
    ClauseExtraction(ClauseExtraction),
    RiskAssessment(RiskAssessment),
    Diff(DiffSummary),
}

impl TaskResult {
    pub fn task_type(&self) -> AiTaskType {
        match self {
            TaskResult::Embedding(_) => AiTaskType::Embedding,
            TaskResult::ClauseExtraction(_) => AiTaskType::ClauseExtraction,
            TaskResult::RiskAssessment(_) => AiTaskType::RiskAssessment,
            TaskResult::Diff(_) => AiTaskType::Diff,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(task_type: AiTaskType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match task_type {
            AiTaskType::Embedding => TaskResult::Embedding(serde_json::from_value(value)?),
            AiTaskType::ClauseExtraction => {
                TaskResult::ClauseExtraction(serde_json::from_value(value)?)
            }
            AiTaskType::RiskAssessment => {
                TaskResult::RiskAssessment(serde_json::from_value(value)?)
            }
            AiTaskType::Diff => TaskResult::Diff(serde_json::from_value(value)?),
        })
    }
}
