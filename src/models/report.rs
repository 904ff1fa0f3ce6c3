use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use mime_guess::from_path;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::hazard::{is_known_hazard, resolve_assignee, resolve_hazard, OTHERS},
};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportStatus {
    Submitted,
    #[serde(rename = "Under Review")]
    UnderReview,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Invalid,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportActionKind {
    Accept,
    MarkInProgress,
    MarkResolved,
    MarkInvalid,
    Reopen,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Severity {
    Minor,
    Moderate,
    Critical,
}

/// Every legal status change. Nothing outside this table may mutate `status`.
const TRANSITIONS: &[(ReportStatus, ReportActionKind, ReportStatus)] = &[
    (
        ReportStatus::Submitted,
        ReportActionKind::Accept,
        ReportStatus::UnderReview,
    ),
    (
        ReportStatus::Submitted,
        ReportActionKind::MarkInvalid,
        ReportStatus::Invalid,
    ),
    (
        ReportStatus::UnderReview,
        ReportActionKind::MarkInProgress,
        ReportStatus::InProgress,
    ),
    (
        ReportStatus::UnderReview,
        ReportActionKind::MarkInvalid,
        ReportStatus::Invalid,
    ),
    (
        ReportStatus::InProgress,
        ReportActionKind::MarkResolved,
        ReportStatus::Resolved,
    ),
    (
        ReportStatus::InProgress,
        ReportActionKind::MarkInvalid,
        ReportStatus::Invalid,
    ),
    (
        ReportStatus::Resolved,
        ReportActionKind::Reopen,
        ReportStatus::UnderReview,
    ),
    (
        ReportStatus::Invalid,
        ReportActionKind::Reopen,
        ReportStatus::UnderReview,
    ),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportAction {
    Accept,
    MarkInProgress { assignee: String },
    MarkResolved { resolution: String },
    MarkInvalid { reason: String },
    Reopen,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Photo {
    Legacy(String),
    Inline { name: String, data: String },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    pub action: String,
    pub by: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_date: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_date: Option<String>,
    #[serde(default)]
    pub action_history: Vec<ActionEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Submission time carried by older records that predate `date`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_submitted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub hazard: String,
    pub custom_hazard: Option<String>,
    pub severity: Option<Severity>,
    pub description: Option<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    pub location: Option<Location>,
}

/// Body of `POST /reports/{id}/actions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportActionRequest {
    pub action: ReportActionKind,
    pub assignee: Option<String>,
    pub custom_assignee: Option<String>,
    pub resolution: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

/// Identity of the resident submitting a report.
#[derive(Clone, Debug)]
pub struct Reporter {
    pub id: String,
    pub name: String,
    pub email: String,
}

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 5] = [
        ReportStatus::Submitted,
        ReportStatus::UnderReview,
        ReportStatus::InProgress,
        ReportStatus::Resolved,
        ReportStatus::Invalid,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ReportStatus::Submitted => "Submitted",
            ReportStatus::UnderReview => "Under Review",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Resolved => "Resolved",
            ReportStatus::Invalid => "Invalid",
        }
    }
    pub fn allowed_actions(self) -> Vec<ReportActionKind> {
        TRANSITIONS
            .iter()
            .filter(|(from, _, _)| *from == self)
            .map(|(_, kind, _)| *kind)
            .collect()
    }
    pub fn next(self, kind: ReportActionKind) -> Option<ReportStatus> {
        TRANSITIONS
            .iter()
            .find(|(from, action, _)| *from == self && *action == kind)
            .map(|(_, _, to)| *to)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReportStatus {
    type Err = AppError;

    /// Accepts display labels ("Under Review") as well as snake case ("under_review").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        ReportStatus::ALL
            .into_iter()
            .find(|status| status.label().to_lowercase() == normalized)
            .ok_or(AppError::InvalidInput {
                field: "status",
                reason: "is not a report status",
            })
    }
}

impl ReportActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportActionKind::Accept => "accept",
            ReportActionKind::MarkInProgress => "mark_in_progress",
            ReportActionKind::MarkResolved => "mark_resolved",
            ReportActionKind::MarkInvalid => "mark_invalid",
            ReportActionKind::Reopen => "reopen",
        }
    }
    pub fn history_label(self) -> &'static str {
        match self {
            ReportActionKind::Accept => "Accepted",
            ReportActionKind::MarkInProgress => "Marked as In Progress",
            ReportActionKind::MarkResolved => "Resolved",
            ReportActionKind::MarkInvalid => "Marked as Invalid",
            ReportActionKind::Reopen => "Reopened",
        }
    }
}

impl fmt::Display for ReportActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ReportAction {
    pub fn kind(&self) -> ReportActionKind {
        match self {
            ReportAction::Accept => ReportActionKind::Accept,
            ReportAction::MarkInProgress { .. } => ReportActionKind::MarkInProgress,
            ReportAction::MarkResolved { .. } => ReportActionKind::MarkResolved,
            ReportAction::MarkInvalid { .. } => ReportActionKind::MarkInvalid,
            ReportAction::Reopen => ReportActionKind::Reopen,
        }
    }
}

impl ReportActionRequest {
    /// Marking a report invalid is destructive and needs `confirm`.
    pub fn into_action(self) -> AppResult<ReportAction> {
        Ok(match self.action {
            ReportActionKind::Accept => ReportAction::Accept,
            ReportActionKind::MarkInProgress => ReportAction::MarkInProgress {
                assignee: resolve_assignee(
                    self.assignee.as_deref().unwrap_or_default(),
                    self.custom_assignee.as_deref(),
                )
                .unwrap_or_default(),
            },
            ReportActionKind::MarkResolved => ReportAction::MarkResolved {
                resolution: self.resolution.unwrap_or_default(),
            },
            ReportActionKind::MarkInvalid => {
                if !self.confirm {
                    return Err(AppError::ConfirmationRequired);
                }
                ReportAction::MarkInvalid {
                    reason: self.reason.unwrap_or_default(),
                }
            }
            ReportActionKind::Reopen => ReportAction::Reopen,
        })
    }
}

impl ActionEntry {
    fn new(kind: ReportActionKind, by: &str, date: &str) -> Self {
        Self {
            action: kind.history_label().to_string(),
            by: by.to_string(),
            date: date.to_string(),
            assigned_to: None,
            in_progress_date: None,
            resolution_details: None,
            resolved_date: None,
            invalid_reason: None,
            invalid_date: None,
        }
    }
}

impl Report {
    /// Builds a freshly submitted report. The record carries no status and no history yet.
    pub fn submit(
        request: ReportRequest,
        report_id: u32,
        reporter: Option<Reporter>,
        now: DateTime<Utc>,
    ) -> AppResult<Report> {
        let hazard = resolve_hazard(&request.hazard, request.custom_hazard.as_deref())
            .ok_or(AppError::Validation { field: "hazard" })?;
        if request.hazard.trim() != OTHERS && !is_known_hazard(&hazard) {
            return Err(AppError::InvalidInput {
                field: "hazard",
                reason: "is not a listed hazard",
            });
        }
        let severity = request
            .severity
            .ok_or(AppError::Validation { field: "severity" })?;

        for photo in request.photos.iter() {
            validate_photo(photo)?;
        }
        if let Some(location) = request.location {
            if !location.lat.is_finite()
                || !location.lng.is_finite()
                || !(-90.0..=90.0).contains(&location.lat)
                || !(-180.0..=180.0).contains(&location.lng)
            {
                return Err(AppError::InvalidInput {
                    field: "location",
                    reason: "is outside valid coordinates",
                });
            }
        }

        let (user_id, user_name, user_email) = match reporter {
            Some(reporter) => (Some(reporter.id), Some(reporter.name), Some(reporter.email)),
            None => (None, None, None),
        };

        Ok(Report {
            report_id: Some(report_id),
            hazard: Some(hazard),
            severity: Some(severity),
            description: request.description.unwrap_or_default().trim().to_string(),
            photos: request.photos,
            location: request.location,
            status: Some(ReportStatus::Submitted),
            assigned_to: None,
            in_progress_date: None,
            resolution_details: None,
            resolved_date: None,
            invalid_reason: None,
            invalid_date: None,
            action_history: Vec::new(),
            date: Some(timestamp(now)),
            date_submitted: None,
            user_id,
            user_name,
            user_email,
        })
    }
    pub fn id(&self) -> u32 {
        self.report_id.unwrap_or_default()
    }
    pub fn effective_status(&self) -> ReportStatus {
        self.status.unwrap_or(ReportStatus::Submitted)
    }
    pub fn allowed_actions(&self) -> Vec<ReportActionKind> {
        self.effective_status().allowed_actions()
    }
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.date
            .as_deref()
            .and_then(|date| DateTime::parse_from_rfc3339(date).ok())
    }
    /// Applies one lifecycle action. On error the report is left exactly as it was.
    pub fn apply(&mut self, action: &ReportAction, actor: &str, now: DateTime<Utc>) -> AppResult<()> {
        let from = self.effective_status();
        let kind = action.kind();
        let to = from.next(kind).ok_or_else(|| AppError::InvalidTransition {
            from: from.to_string(),
            action: kind.to_string(),
        })?;

        let stamp = timestamp(now);
        let mut entry = ActionEntry::new(kind, actor, &stamp);

        match action {
            ReportAction::Accept => {}
            ReportAction::MarkInProgress { assignee } => {
                let assignee = required(assignee, "assignedTo")?;
                entry.assigned_to = Some(assignee.clone());
                entry.in_progress_date = Some(stamp.clone());
                self.assigned_to = Some(assignee);
                self.in_progress_date = Some(stamp);
            }
            ReportAction::MarkResolved { resolution } => {
                let resolution = required(resolution, "resolutionDetails")?;
                entry.resolution_details = Some(resolution.clone());
                entry.resolved_date = Some(stamp.clone());
                self.resolution_details = Some(resolution);
                self.resolved_date = Some(stamp);
            }
            ReportAction::MarkInvalid { reason } => {
                let reason = required(reason, "invalidReason")?;
                entry.invalid_reason = Some(reason.clone());
                entry.invalid_date = Some(stamp.clone());
                self.invalid_reason = Some(reason);
                self.invalid_date = Some(stamp);
            }
            ReportAction::Reopen => {
                self.invalid_reason = None;
                self.invalid_date = None;
            }
        }

        self.status = Some(to);
        self.action_history.push(entry);
        Ok(())
    }
}

fn required(value: &str, field: &'static str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(AppError::Validation { field })
    } else {
        Ok(value.to_string())
    }
}

fn validate_photo(photo: &Photo) -> AppResult<()> {
    let is_image = match photo {
        Photo::Legacy(name) => from_path(name)
            .first()
            .map(|mime| mime.type_().as_str() == "image")
            .unwrap_or(false),
        Photo::Inline { data, .. } => data.starts_with("data:image/"),
    };
    if is_image {
        Ok(())
    } else {
        Err(AppError::InvalidInput {
            field: "photos",
            reason: "must be image files",
        })
    }
}
