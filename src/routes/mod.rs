use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{role::RolePermission, user::SessionRef},
    store::Saved,
};

pub mod analytics;
pub mod registration;
pub mod report;
pub mod user;

pub const PERSISTENCE_WARNING: &str = "X-Persistence-Warning";

#[derive(Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

impl ConfirmQuery {
    pub fn require(&self) -> AppResult<()> {
        if self.confirm {
            Ok(())
        } else {
            Err(AppError::ConfirmationRequired)
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(user::get_taxonomy)
        .service(user::signup)
        .service(user::login)
        .service(report::create_report)
        // Must come before /reports/{report_id}.
        .service(report::get_own_reports)
        .service(report::get_reports)
        .service(report::get_report)
        .service(report::get_report_actions)
        .service(report::apply_report_action)
        .service(report::delete_report)
        .service(analytics::get_analytics)
        .service(analytics::get_activity)
        .service(registration::create_registration)
        .service(registration::get_registrations)
        .service(registration::approve_registration)
        .service(registration::reject_registration)
        .service(registration::delete_registration);
}

pub fn session(req: &HttpRequest) -> Option<SessionRef> {
    req.extensions().get::<SessionRef>().cloned()
}

pub fn authorize(req: &HttpRequest, permit: &RolePermission) -> AppResult<SessionRef> {
    let session = session(req).ok_or(AppError::Unauthorized)?;
    if session.role.validate(permit) {
        Ok(session)
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Writes the saved value as JSON, flagging a failed write in a response header.
pub fn saved<T: Serialize>(mut builder: HttpResponseBuilder, saved: Saved<T>) -> HttpResponse {
    if !saved.persisted {
        builder.insert_header((PERSISTENCE_WARNING, "SAVE_FAILED"));
    }
    builder.json(saved.value)
}
