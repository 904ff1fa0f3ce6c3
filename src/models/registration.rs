use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    report::timestamp,
    user::{hash_password, SignupForm},
};
use crate::error::{AppError, AppResult};

/// Largest inline ID photo accepted, measured on the data URL itself.
pub const MAX_PHOTO_DATA_LEN: usize = 7 * 1024 * 1024;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationFilter {
    All,
    Only(RegistrationStatus),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    pub password: String,
    #[serde(default)]
    pub photo: Option<String>,
    pub status: RegistrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

/// Credential record provisioned when a registration is approved.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedAdmin {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    #[serde(default)]
    pub photo: Option<String>,
    pub approved_date: String,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    #[serde(flatten)]
    pub form: SignupForm,
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    #[serde(default)]
    pub reject_reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    pub photo: Option<String>,
    pub status: RegistrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct RegistrationCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(RegistrationFilter::All),
            "pending" => Ok(RegistrationFilter::Only(RegistrationStatus::Pending)),
            "approved" => Ok(RegistrationFilter::Only(RegistrationStatus::Approved)),
            "rejected" => Ok(RegistrationFilter::Only(RegistrationStatus::Rejected)),
            _ => Err(AppError::InvalidInput {
                field: "status",
                reason: "is not a registration status",
            }),
        }
    }
}

impl RegistrationFilter {
    pub fn matches(self, registration: &Registration) -> bool {
        match self {
            RegistrationFilter::All => true,
            RegistrationFilter::Only(status) => registration.status == status,
        }
    }
}

impl RegistrationCounts {
    pub fn tally(registrations: &[Registration]) -> Self {
        registrations
            .iter()
            .fold(RegistrationCounts::default(), |mut counts, registration| {
                match registration.status {
                    RegistrationStatus::Pending => counts.pending += 1,
                    RegistrationStatus::Approved => counts.approved += 1,
                    RegistrationStatus::Rejected => counts.rejected += 1,
                }
                counts
            })
    }
}

fn validate_photo(photo: Option<&str>) -> AppResult<String> {
    let photo = match photo.map(str::trim) {
        Some(photo) if !photo.is_empty() => photo,
        _ => return Err(AppError::Validation { field: "photo" }),
    };
    if !photo.starts_with("data:image/") {
        return Err(AppError::InvalidInput {
            field: "photo",
            reason: "must be an image",
        });
    }
    if photo.len() > MAX_PHOTO_DATA_LEN {
        return Err(AppError::InvalidInput {
            field: "photo",
            reason: "is too large",
        });
    }
    Ok(photo.to_string())
}

impl Registration {
    /// Validates a sign-up request and builds the pending record with a hashed password.
    pub fn submit(request: RegistrationRequest, id: i64, now: DateTime<Utc>) -> AppResult<Self> {
        request.form.validate()?;
        let photo = validate_photo(request.photo.as_deref())?;

        Ok(Registration {
            id,
            email: request.form.normalized_email(),
            first_name: request.form.first_name.trim().to_string(),
            last_name: request.form.last_name.trim().to_string(),
            contact_number: request.form.contact_number.trim().to_string(),
            password: hash_password(&request.form.password)?,
            photo: Some(photo),
            status: RegistrationStatus::Pending,
            submitted_date: Some(timestamp(now)),
            approved_date: None,
            rejected_date: None,
            reject_reason: None,
        })
    }
    fn ensure_pending(&self, action: &str) -> AppResult<()> {
        if self.status == RegistrationStatus::Pending {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.status.to_string(),
                action: action.to_string(),
            })
        }
    }
    pub fn approve(&mut self, now: DateTime<Utc>) -> AppResult<ApprovedAdmin> {
        self.ensure_pending("approve")?;

        let stamp = timestamp(now);
        self.status = RegistrationStatus::Approved;
        self.approved_date = Some(stamp.clone());

        Ok(ApprovedAdmin {
            id: self.id,
            email: self.email.clone(),
            password: self.password.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            contact_number: self.contact_number.clone(),
            photo: self.photo.clone(),
            approved_date: stamp,
        })
    }
    pub fn reject(&mut self, reason: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_pending("reject")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation {
                field: "rejectReason",
            });
        }

        self.status = RegistrationStatus::Rejected;
        self.reject_reason = Some(reason.to_string());
        self.rejected_date = Some(timestamp(now));
        Ok(())
    }
    /// Only decided registrations may be removed.
    pub fn ensure_removable(&self) -> AppResult<()> {
        match self.status {
            RegistrationStatus::Pending => Err(AppError::InvalidTransition {
                from: self.status.to_string(),
                action: "remove".to_string(),
            }),
            RegistrationStatus::Approved | RegistrationStatus::Rejected => Ok(()),
        }
    }
}

impl ApprovedAdmin {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<&Registration> for RegistrationResponse {
    fn from(registration: &Registration) -> Self {
        RegistrationResponse {
            id: registration.id,
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
            email: registration.email.clone(),
            contact_number: registration.contact_number.clone(),
            photo: registration.photo.clone(),
            status: registration.status,
            submitted_date: registration.submitted_date.clone(),
            approved_date: registration.approved_date.clone(),
            rejected_date: registration.rejected_date.clone(),
            reject_reason: registration.reject_reason.clone(),
        }
    }
}
