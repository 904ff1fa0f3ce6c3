use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use super::{authorize, saved, session, ConfirmQuery};
use crate::{
    analytics::{filter_reports, newest_first, DateBucket, ReportFilter, StatusFilter},
    error::{AppError, AppResult},
    models::{
        report::{Report, ReportActionKind, ReportActionRequest, ReportRequest, ReportStatus},
        role::RolePermission,
    },
    state::AppState,
};

#[derive(Deserialize)]
pub struct ReportQuery {
    pub status: Option<String>,
    pub bucket: Option<String>,
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct ReportActionsResponse {
    pub status: ReportStatus,
    pub actions: Vec<ReportActionKind>,
}

fn parse_report_id(report_id: &str) -> AppResult<u32> {
    report_id.parse().map_err(|_| AppError::InvalidId)
}

impl ReportQuery {
    fn into_filter(self) -> AppResult<ReportFilter> {
        let mut filter = ReportFilter::default();
        if let Some(status) = self.status.filter(|status| !status.trim().is_empty()) {
            filter.status = status.parse::<StatusFilter>()?;
        }
        if let Some(bucket) = self.bucket.filter(|bucket| !bucket.trim().is_empty()) {
            filter.bucket = bucket.parse::<DateBucket>()?;
        }
        filter.query = self.q.unwrap_or_default();
        Ok(filter)
    }
}

#[post("/reports")]
pub async fn create_report(
    state: web::Data<AppState>,
    payload: web::Json<ReportRequest>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let reporter = session(&req).map(|session| session.reporter());
    let report = state
        .reports
        .submit(payload.into_inner(), reporter, Utc::now())
        .await?;
    Ok(saved(HttpResponse::Created(), report))
}
#[get("/reports/mine")]
pub async fn get_own_reports(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let session = authorize(&req, &RolePermission::GetOwnReports)?;
    let reports = state.reports.all().await;
    let mine: Vec<&Report> = newest_first(&reports)
        .into_iter()
        .filter(|report| report.user_id.as_deref() == Some(session.subject.as_str()))
        .collect();
    Ok(HttpResponse::Ok().json(mine))
}
#[get("/reports")]
pub async fn get_reports(
    state: web::Data<AppState>,
    query: web::Query<ReportQuery>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::GetReports)?;
    let filter = query.into_inner().into_filter()?;
    let reports = state.reports.all().await;
    Ok(HttpResponse::Ok().json(filter_reports(&reports, &filter, &Local::now())))
}
#[get("/reports/{report_id}")]
pub async fn get_report(
    state: web::Data<AppState>,
    report_id: web::Path<String>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::GetReports)?;
    let report_id = parse_report_id(&report_id)?;
    match state.reports.find(report_id).await {
        Some(report) => Ok(HttpResponse::Ok().json(report)),
        None => Err(AppError::NotFound("REPORT_NOT_FOUND")),
    }
}
#[get("/reports/{report_id}/actions")]
pub async fn get_report_actions(
    state: web::Data<AppState>,
    report_id: web::Path<String>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::GetReports)?;
    let report_id = parse_report_id(&report_id)?;
    let report = state
        .reports
        .find(report_id)
        .await
        .ok_or(AppError::NotFound("REPORT_NOT_FOUND"))?;
    Ok(HttpResponse::Ok().json(ReportActionsResponse {
        status: report.effective_status(),
        actions: report.allowed_actions(),
    }))
}
#[post("/reports/{report_id}/actions")]
pub async fn apply_report_action(
    state: web::Data<AppState>,
    report_id: web::Path<String>,
    payload: web::Json<ReportActionRequest>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let session = authorize(&req, &RolePermission::UpdateReport)?;
    let report_id = parse_report_id(&report_id)?;
    let action = payload.into_inner().into_action()?;
    let report = state
        .reports
        .transition(report_id, &action, session.actor_name(), Utc::now())
        .await?;
    Ok(saved(HttpResponse::Ok(), report))
}
#[delete("/reports/{report_id}")]
pub async fn delete_report(
    state: web::Data<AppState>,
    report_id: web::Path<String>,
    query: web::Query<ConfirmQuery>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::DeleteReport)?;
    let report_id = parse_report_id(&report_id)?;
    query.require()?;
    let report = state.reports.delete(report_id).await?;
    Ok(saved(HttpResponse::Ok(), report))
}
