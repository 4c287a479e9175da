use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::CoreError;

/// Longest slug base before the uniqueness suffix is appended.
pub const SLUG_BASE_MAX_LEN: usize = 40;
pub const SLUG_TOKEN_LEN: usize = 6;

pub const DEFAULT_PIPELINE_STAGES: [&str; 6] = [
    "Discovery",
    "Qualification",
    "Proposal",
    "Negotiation",
    "Closed Won",
    "Closed Lost",
];

// --- Tenant identifier ---

/// Tenant slug. Every scoped query filters on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct TenantId(String);

impl TryFrom<String> for TenantId {
    type Error = TenantError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl TenantId {
    pub fn parse(raw: &str) -> Result<Self, TenantError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TenantError::InvalidInput("Tenant ID cannot be empty".into()));
        }
        // ':' separates realtime topic segments
        if trimmed.contains(':') || trimmed.chars().any(char::is_whitespace) {
            return Err(TenantError::InvalidInput(format!(
                "Tenant ID contains invalid characters: {}",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Slug derivation ---

/// Derives a tenant slug from a company name and a uniqueness token.
///
/// The name is lowercased, every run of non-alphanumeric characters becomes a
/// single hyphen, leading/trailing hyphens are dropped and the base is capped
/// at [`SLUG_BASE_MAX_LEN`] characters before `-{token}` is appended.
pub fn derive_tenant_slug(company_name: &str, token: &str) -> String {
    let mut base = String::with_capacity(company_name.len());
    let mut pending_hyphen = false;
    for c in company_name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !base.is_empty() {
                base.push('-');
            }
            pending_hyphen = false;
            base.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    if base.len() > SLUG_BASE_MAX_LEN {
        base.truncate(SLUG_BASE_MAX_LEN);
    }
    let base = base.trim_matches('-');
    let base = if base.is_empty() { "tenant" } else { base };
    format!("{}-{}", base, token)
}

/// Random lowercase alphanumeric suffix for [`derive_tenant_slug`].
pub fn slug_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SLUG_TOKEN_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

// --- Tenant configuration ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Healthcare,
    RealEstate,
    Retail,
    Hospitality,
    Education,
    ProfessionalServices,
    #[default]
    Other,
}

impl Industry {
    /// Word the UI uses for the tenant's customers.
    pub fn customer_term(&self) -> &'static str {
        match self {
            Industry::Healthcare => "Patients",
            Industry::RealEstate => "Clients",
            Industry::Retail => "Customers",
            Industry::Hospitality => "Guests",
            Industry::Education => "Students",
            Industry::ProfessionalServices => "Clients",
            Industry::Other => "Customers",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Starter,
    Professional,
    Enterprise,
}

impl Plan {
    /// (messages, calls) allowance per billing period.
    pub fn limits(&self) -> (i64, i64) {
        match self {
            Plan::Starter => (1_000, 100),
            Plan::Professional => (10_000, 1_000),
            Plan::Enterprise => (100_000, 10_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFlags {
    pub whatsapp: bool,
    pub email: bool,
    pub instagram: bool,
    pub facebook: bool,
    pub sms: bool,
    pub voice: bool,
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self {
            whatsapp: true,
            email: true,
            instagram: false,
            facebook: false,
            sms: false,
            voice: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFlags {
    pub crm: bool,
    pub inbox: bool,
    pub sales: bool,
    pub marketing: bool,
    pub hr: bool,
    pub voice_ai: bool,
}

impl Default for ModuleFlags {
    fn default() -> Self {
        Self {
            crm: true,
            inbox: true,
            sales: true,
            marketing: true,
            hr: false,
            voice_ai: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Crm,
    Inbox,
    Sales,
    Marketing,
    Hr,
    VoiceAi,
}

impl ModuleFlags {
    pub fn is_enabled(&self, module: Module) -> bool {
        match module {
            Module::Crm => self.crm,
            Module::Inbox => self.inbox,
            Module::Sales => self.sales,
            Module::Marketing => self.marketing,
            Module::Hr => self.hr,
            Module::VoiceAi => self.voice_ai,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub company_name: String,
    #[serde(default)]
    pub industry: Industry,
    pub brand_color: Option<String>,
    #[serde(default)]
    pub channels: ChannelFlags,
    #[serde(default)]
    pub modules: ModuleFlags,
    #[serde(default)]
    pub messages_used: i64,
    #[serde(default)]
    pub messages_limit: i64,
    #[serde(default)]
    pub calls_used: i64,
    #[serde(default)]
    pub calls_limit: i64,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub status: TenantStatus,
    #[serde(default = "default_pipeline_stages")]
    pub pipeline_stages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub fn default_pipeline_stages() -> Vec<String> {
    DEFAULT_PIPELINE_STAGES.iter().map(|s| s.to_string()).collect()
}

impl TenantConfig {
    /// Builds the initial configuration written by the onboarding wizard.
    pub fn new(tenant_id: TenantId, company_name: &str, industry: Industry, plan: Plan) -> Self {
        let (messages_limit, calls_limit) = plan.limits();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            company_name: company_name.trim().to_string(),
            industry,
            brand_color: None,
            channels: ChannelFlags::default(),
            modules: ModuleFlags::default(),
            messages_used: 0,
            messages_limit,
            calls_used: 0,
            calls_limit,
            plan,
            status: TenantStatus::Active,
            pipeline_stages: default_pipeline_stages(),
            created_at: Utc::now(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == TenantStatus::Suspended
    }

    pub fn ensure_active(&self) -> Result<(), TenantError> {
        if self.is_suspended() {
            return Err(TenantError::Suspended(self.tenant_id.to_string()));
        }
        Ok(())
    }

    pub fn has_stage(&self, stage: &str) -> bool {
        self.pipeline_stages.iter().any(|s| s == stage)
    }

    pub fn messages_remaining(&self) -> i64 {
        (self.messages_limit - self.messages_used).max(0)
    }

    pub fn calls_remaining(&self) -> i64 {
        (self.calls_limit - self.calls_used).max(0)
    }
}

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => (hex.len() == 6 || hex.len() == 3) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Checks a replacement list of deal pipeline stages.
pub fn validate_pipeline_stages(stages: &[String]) -> Result<(), TenantError> {
    if stages.is_empty() {
        return Err(TenantError::InvalidInput(
            "Pipeline needs at least one stage".into(),
        ));
    }
    for (i, stage) in stages.iter().enumerate() {
        if stage.trim().is_empty() {
            return Err(TenantError::InvalidInput("Stage names cannot be empty".into()));
        }
        if stages[..i].iter().any(|s| s.eq_ignore_ascii_case(stage)) {
            return Err(TenantError::InvalidInput(format!(
                "Duplicate stage: {}",
                stage
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// --- Errors ---

#[derive(thiserror::Error, Debug)]
pub enum TenantError {
    #[error("Core Error: {0}")]
    Core(#[from] CoreError),
    #[error("Tenant already exists (ID: {0})")]
    AlreadyExists(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Tenant is suspended (ID: {0})")]
    Suspended(String),
}
