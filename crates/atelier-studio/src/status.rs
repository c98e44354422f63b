use serde::Serialize;

/// Highest value synthesized progress may reach
pub const PROGRESS_CEILING: f64 = 95.0;

/// Lifecycle of the current generation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GenerationPhase {
    Idle,
    Processing,
    Completed,
    Error,
}

/// Qualitative stage of synthesized progress, slower as it advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProgressStage {
    Submitting,
    Generating,
    Refining,
    Finalizing,
}

impl ProgressStage {
    pub fn for_progress(progress: f64) -> Self {
        match progress {
            p if p < 25.0 => Self::Submitting,
            p if p < 60.0 => Self::Generating,
            p if p < 85.0 => Self::Refining,
            _ => Self::Finalizing,
        }
    }

    /// Percentage points added per tick
    pub fn increment(self) -> f64 {
        match self {
            Self::Submitting => 5.0,
            Self::Generating => 3.0,
            Self::Refining => 1.5,
            Self::Finalizing => 0.5,
        }
    }
}

/// Next synthesized value, never above [`PROGRESS_CEILING`]
pub fn advance(progress: f64) -> f64 {
    if progress >= PROGRESS_CEILING {
        return progress;
    }
    let stage = ProgressStage::for_progress(progress);
    (progress + stage.increment()).min(PROGRESS_CEILING)
}

/// Snapshot published to status subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub phase: GenerationPhase,
    /// Percentage in `[0, 100]`
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ProgressStage>,
    /// Error text, or advisory warnings while processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// History batch produced by the completed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

impl GenerationStatus {
    pub fn idle() -> Self {
        Self {
            phase: GenerationPhase::Idle,
            progress: 0.0,
            stage: None,
            message: None,
            batch_id: None,
        }
    }

    pub fn processing(warnings: Option<String>) -> Self {
        Self {
            phase: GenerationPhase::Processing,
            progress: 0.0,
            stage: Some(ProgressStage::Submitting),
            message: warnings,
            batch_id: None,
        }
    }

    pub fn completed(batch_id: String) -> Self {
        Self {
            phase: GenerationPhase::Completed,
            progress: 100.0,
            stage: None,
            message: None,
            batch_id: Some(batch_id),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            phase: GenerationPhase::Error,
            progress: 0.0,
            stage: None,
            message: Some(message.into()),
            batch_id: None,
        }
    }
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self::idle()
    }
}
