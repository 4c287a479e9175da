//! Admin "add tenant" flow.
//!
//! Onboarding is four independent writes. Only the tenant configuration is
//! required; the later steps are attempted in order and reported one by one.
//! Nothing already written is rolled back.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::tenant::{derive_tenant_slug, slug_token, Organization, TenantConfig, TenantId};
use crate::domain::user::{Role, UserProfile};
use crate::domain::wizard::TenantForm;
use crate::services::Resources;
use crate::{AuthIdentity, AuthProvider, CoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    TenantConfig,
    Organization,
    AdminIdentity,
    AdminProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub step: OnboardingStep,
    #[serde(flatten)]
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnboardingReport {
    pub tenant_id: TenantId,
    pub config: TenantConfig,
    pub steps: Vec<StepOutcome>,
}

impl OnboardingReport {
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Done)
    }

    fn record<T>(&mut self, step: OnboardingStep, result: &Result<T, CoreError>) {
        let status = match result {
            Ok(_) => StepStatus::Done,
            Err(e) => {
                warn!(tenant = %self.tenant_id, ?step, "Onboarding step failed: {}", e);
                StepStatus::Failed(e.to_string())
            }
        };
        self.steps.push(StepOutcome { step, status });
    }
}

#[derive(Clone)]
pub struct TenantOnboarding {
    resources: Resources,
    auth: Arc<dyn AuthProvider>,
}

impl TenantOnboarding {
    pub fn new(resources: Resources, auth: Arc<dyn AuthProvider>) -> Self {
        Self { resources, auth }
    }

    pub async fn run(&self, form: TenantForm) -> Result<OnboardingReport, CoreError> {
        form.validate()?;
        let industry = form.industry.unwrap_or_default();
        let tenant = TenantId::parse(&derive_tenant_slug(&form.company_name, &slug_token()))?;

        let mut config = TenantConfig::new(tenant.clone(), &form.company_name, industry, form.plan);
        config.brand_color = form.brand_color.clone();
        config.channels = form.channels;
        config.modules = form.modules;
        let config = self.resources.tenants.insert(&tenant, &config).await?;
        info!(tenant = %tenant, "Tenant created");

        let mut report = OnboardingReport {
            tenant_id: tenant.clone(),
            config: config.clone(),
            steps: vec![StepOutcome {
                step: OnboardingStep::TenantConfig,
                status: StepStatus::Done,
            }],
        };

        let organization = Organization {
            id: uuid::Uuid::new_v4(),
            tenant_id: tenant.clone(),
            name: config.company_name.clone(),
            created_at: config.created_at,
        };
        let created = self.resources.organizations.insert(&tenant, &organization).await;
        report.record(OnboardingStep::Organization, &created);

        let identity: Result<AuthIdentity, CoreError> =
            self.auth.sign_up(&form.admin_email, &form.admin_password).await;
        report.record(OnboardingStep::AdminIdentity, &identity);

        match identity {
            Ok(identity) => {
                let admin_name = form
                    .admin_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string);
                let profile = UserProfile::new(identity.id, &identity.email, admin_name, Role::Admin, Some(tenant.clone()));
                let created = self.resources.users.insert(&tenant, &profile).await;
                report.record(OnboardingStep::AdminProfile, &created);
            }
            Err(_) => report.steps.push(StepOutcome {
                step: OnboardingStep::AdminProfile,
                status: StepStatus::Skipped("admin account was not created".into()),
            }),
        }

        Ok(report)
    }
}
