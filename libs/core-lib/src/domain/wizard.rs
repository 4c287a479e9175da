//! Multi-step forms: the campaign builder and the admin "add tenant" flow.
//!
//! The forms carry the validation rules. The API only ever receives a
//! finished form and checks it with [`CampaignForm::to_submission`] or
//! [`TenantForm::validate`].
//!
//! [`CampaignWizard`] and [`TenantWizard`] hold the step state for clients
//! that drive the flow one page at a time. They gate advancement on the
//! fields of the current step, validate every step again on submit, reset
//! after a successful submission and keep the form untouched when
//! submission fails. The server keeps no wizard state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

use super::inbox::Channel;
use super::marketing::{CampaignStatus, ScheduleType};
use super::tenant::{is_hex_color, ChannelFlags, Industry, ModuleFlags, Plan};
use super::user::{validate_email, validate_password};

pub const FIRST_STEP: u8 = 1;
pub const LAST_STEP: u8 = 3;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WizardError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{0}")]
    Invalid(String),
    #[error("Already on the last step")]
    LastStep,
    #[error("Complete step {0} before submitting")]
    Incomplete(u8),
}

// --- Campaign wizard ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignForm {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_campaign_channel")]
    pub channel: Channel,
    #[serde(default)]
    pub message_content: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

fn default_campaign_channel() -> Channel {
    Channel::Email
}

impl Default for CampaignForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            channel: default_campaign_channel(),
            message_content: String::new(),
            subject: None,
            schedule_type: ScheduleType::Immediate,
            scheduled_at: None,
        }
    }
}

impl CampaignForm {
    pub fn check_step(&self, step: u8) -> Result<(), WizardError> {
        match step {
            1 if self.name.trim().is_empty() => Err(WizardError::Required("Campaign name")),
            2 if self.message_content.trim().is_empty() => {
                Err(WizardError::Required("Message content"))
            }
            3 if self.schedule_type == ScheduleType::Scheduled && self.scheduled_at.is_none() => {
                Err(WizardError::Required("Schedule date"))
            }
            _ => Ok(()),
        }
    }

    /// Validates every step and builds the record to create.
    pub fn to_submission(&self) -> Result<CampaignSubmission, WizardError> {
        for step in FIRST_STEP..=LAST_STEP {
            self.check_step(step)?;
        }
        let (status, scheduled_at) = match self.schedule_type {
            ScheduleType::Immediate => (CampaignStatus::Draft, None),
            ScheduleType::Scheduled => (CampaignStatus::Scheduled, self.scheduled_at),
        };
        Ok(CampaignSubmission {
            name: self.name.trim().to_string(),
            channel: self.channel,
            message_template: self.message_content.trim().to_string(),
            subject: self
                .subject
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            status,
            scheduled_at,
        })
    }
}

/// What a completed campaign wizard produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignSubmission {
    pub name: String,
    pub channel: Channel,
    pub message_template: String,
    pub subject: Option<String>,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Client-side step state for building a campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignWizard {
    step: u8,
    pub form: CampaignForm,
}

impl Default for CampaignWizard {
    fn default() -> Self {
        Self {
            step: FIRST_STEP,
            form: CampaignForm::default(),
        }
    }
}

impl CampaignWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn can_advance(&self) -> bool {
        self.step < LAST_STEP && self.form.check_step(self.step).is_ok()
    }

    pub fn advance(&mut self) -> Result<u8, WizardError> {
        if self.step >= LAST_STEP {
            return Err(WizardError::LastStep);
        }
        self.form.check_step(self.step)?;
        self.step += 1;
        Ok(self.step)
    }

    pub fn back(&mut self) -> u8 {
        self.step = self.step.saturating_sub(1).max(FIRST_STEP);
        self.step
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Runs `create` with the validated submission. Resets on success.
    pub async fn submit<F, Fut, T, E>(&mut self, create: F) -> Result<T, E>
    where
        F: FnOnce(CampaignSubmission) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<WizardError>,
    {
        if self.step != LAST_STEP {
            return Err(WizardError::Incomplete(self.step).into());
        }
        let submission = self.form.to_submission()?;
        let created = create(submission).await?;
        self.reset();
        Ok(created)
    }
}

// --- Tenant wizard ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TenantForm {
    #[serde(default)]
    pub company_name: String,
    pub industry: Option<Industry>,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub brand_color: Option<String>,
    #[serde(default)]
    pub channels: ChannelFlags,
    #[serde(default)]
    pub modules: ModuleFlags,
    #[serde(default)]
    pub admin_email: String,
    #[serde(default)]
    pub admin_password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub admin_name: Option<String>,
}

impl TenantForm {
    pub fn check_step(&self, step: u8) -> Result<(), WizardError> {
        match step {
            1 => {
                if self.company_name.trim().is_empty() {
                    return Err(WizardError::Required("Company name"));
                }
                if self.industry.is_none() {
                    return Err(WizardError::Required("Industry"));
                }
                Ok(())
            }
            2 => match self.brand_color.as_deref() {
                Some(color) if !is_hex_color(color) => Err(WizardError::Invalid(format!(
                    "Brand color must be a hex color: {}",
                    color
                ))),
                _ => Ok(()),
            },
            3 => {
                validate_email(&self.admin_email).map_err(|e| WizardError::Invalid(e.to_string()))?;
                validate_password(&self.admin_password)
                    .map_err(|e| WizardError::Invalid(e.to_string()))?;
                if self.admin_password != self.confirm_password {
                    return Err(WizardError::Invalid("Passwords do not match".into()));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn validate(&self) -> Result<(), WizardError> {
        (FIRST_STEP..=LAST_STEP).try_for_each(|step| self.check_step(step))
    }
}

/// Client-side step state for onboarding a tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantWizard {
    step: u8,
    pub form: TenantForm,
}

impl Default for TenantWizard {
    fn default() -> Self {
        Self {
            step: FIRST_STEP,
            form: TenantForm::default(),
        }
    }
}

impl TenantWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn can_advance(&self) -> bool {
        self.step < LAST_STEP && self.form.check_step(self.step).is_ok()
    }

    pub fn advance(&mut self) -> Result<u8, WizardError> {
        if self.step >= LAST_STEP {
            return Err(WizardError::LastStep);
        }
        self.form.check_step(self.step)?;
        self.step += 1;
        Ok(self.step)
    }

    pub fn back(&mut self) -> u8 {
        self.step = self.step.saturating_sub(1).max(FIRST_STEP);
        self.step
    }

    /// Runs `onboard` with the validated form. Returns to step 1 with a
    /// cleared form on success; keeps everything on failure.
    pub async fn submit<F, Fut, T, E>(&mut self, onboard: F) -> Result<T, E>
    where
        F: FnOnce(TenantForm) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<WizardError>,
    {
        if self.step != LAST_STEP {
            return Err(WizardError::Incomplete(self.step).into());
        }
        self.form.validate()?;
        let outcome = onboard(self.form.clone()).await?;
        *self = Self::default();
        Ok(outcome)
    }
}
