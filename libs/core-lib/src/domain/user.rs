use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::TenantId;
use crate::CoreError;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator; may act on any tenant.
    MasterAdmin,
    Admin,
    Manager,
    #[default]
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::MasterAdmin => "master_admin",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
        }
    }

    /// Tenant-level administration (settings, team).
    pub fn can_administer_tenant(&self) -> bool {
        matches!(self, Role::MasterAdmin | Role::Admin)
    }
}

/// Row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: Uuid, email: &str, full_name: Option<String>, role: Role, tenant_id: Option<TenantId>) -> Self {
        Self {
            id,
            tenant_id,
            email: normalize_email(email),
            full_name,
            role,
            created_at: Utc::now(),
        }
    }
}

/// Sign-up form as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: Option<String>,
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub role: Role,
}

impl SignUp {
    pub fn validate(&self) -> Result<(), UserError> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.password != self.confirm_password {
            return Err(UserError::PasswordMismatch);
        }
        if self.role != Role::MasterAdmin && self.tenant_id.is_none() {
            return Err(UserError::InvalidInput(
                "Tenant is required for non master-admin users".into(),
            ));
        }
        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), UserError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(UserError::InvalidInput("Email is required".into()));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid {
        return Err(UserError::InvalidInput(format!("Invalid email: {}", email)));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), UserError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::WeakPassword(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(UserError::WeakPassword(
            "Password must contain letters and digits".into(),
        ));
    }
    Ok(())
}

// --- Errors ---

#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Core Error: {0}")]
    Core(#[from] CoreError),
    #[error("User already exists ({0})")]
    AlreadyExists(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Weak password: {0}")]
    WeakPassword(String),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Invalid credentials")] // Keep generic for security
    InvalidCredentials,
    #[error("Not permitted: {0}")]
    NotPermitted(String),
}
