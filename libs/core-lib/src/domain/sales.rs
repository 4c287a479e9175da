use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::inbox::HandlerType;
use super::tenant::{TenantConfig, TenantError, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStatus {
    #[default]
    Pending,
    Active,
    Paused,
    Completed,
}

impl SequenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceStatus::Pending => "pending",
            SequenceStatus::Active => "active",
            SequenceStatus::Paused => "paused",
            SequenceStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeadGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LeadGrade {
    /// Scores are clamped to 0..=100 before grading.
    pub fn from_score(score: i64) -> Self {
        match score.clamp(0, 100) {
            80..=100 => LeadGrade::A,
            60..=79 => LeadGrade::B,
            40..=59 => LeadGrade::C,
            20..=39 => LeadGrade::D,
            _ => LeadGrade::F,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub score: i64,
    pub grade: Option<LeadGrade>,
    #[serde(default)]
    pub sequence_status: SequenceStatus,
    #[serde(default)]
    pub handler_type: HandlerType,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Stored grade, or the one implied by the score when the column is empty.
    pub fn effective_grade(&self) -> LeadGrade {
        self.grade.unwrap_or_else(|| LeadGrade::from_score(self.score))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LeadFilter {
    pub status: Option<SequenceStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceAction {
    Start,
    Pause,
}

impl SequenceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceAction::Start => "start",
            SequenceAction::Pause => "pause",
        }
    }

    pub fn resulting_status(&self) -> SequenceStatus {
        match self {
            SequenceAction::Start => SequenceStatus::Active,
            SequenceAction::Pause => SequenceStatus::Paused,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    B2b,
    B2c,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub lead_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub value: f64,
    pub stage: String,
    #[serde(default)]
    pub probability: i64,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    pub fn is_closed(&self) -> bool {
        is_closed_stage(&self.stage)
    }
}

/// "Closed Won" / "Closed Lost" and any tenant stage named like them.
pub fn is_closed_stage(stage: &str) -> bool {
    stage.trim().to_lowercase().starts_with("closed")
}

/// New deal as entered on the pipeline board.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDeal {
    pub title: String,
    #[serde(default)]
    pub value: f64,
    pub stage: Option<String>,
    #[serde(default)]
    pub probability: i64,
    pub lead_id: Option<Uuid>,
}

impl NewDeal {
    pub fn into_deal(self, config: &TenantConfig) -> Result<Deal, TenantError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TenantError::InvalidInput("Deal title is required".into()));
        }
        if self.value < 0.0 || !self.value.is_finite() {
            return Err(TenantError::InvalidInput("Deal value must be positive".into()));
        }
        if !(0..=100).contains(&self.probability) {
            return Err(TenantError::InvalidInput(
                "Probability must be between 0 and 100".into(),
            ));
        }
        let stage = match self.stage {
            Some(stage) => stage,
            None => config
                .pipeline_stages
                .first()
                .cloned()
                .ok_or_else(|| TenantError::InvalidInput("Pipeline has no stages".into()))?,
        };
        if !config.has_stage(&stage) {
            return Err(TenantError::InvalidInput(format!("Unknown stage: {}", stage)));
        }
        let now = Utc::now();
        Ok(Deal {
            id: Uuid::new_v4(),
            tenant_id: config.tenant_id.clone(),
            lead_id: self.lead_id,
            title: title.to_string(),
            value: self.value,
            stage,
            probability: self.probability,
            updated_at: now,
            created_at: now,
        })
    }
}

/// Checks a drag-and-drop move on the pipeline board.
pub fn validate_stage_move(config: &TenantConfig, deal: &Deal, target: &str) -> Result<(), TenantError> {
    if deal.stage == target {
        return Err(TenantError::InvalidInput(format!(
            "Deal is already in stage {}",
            target
        )));
    }
    if !config.has_stage(target) {
        return Err(TenantError::InvalidInput(format!("Unknown stage: {}", target)));
    }
    Ok(())
}
