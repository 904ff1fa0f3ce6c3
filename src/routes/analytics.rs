use actix_web::{get, web, HttpRequest, HttpResponse};
use chrono::Local;

use super::authorize;
use crate::{
    analytics::{activity_log, summarize},
    error::AppResult,
    models::role::RolePermission,
    state::AppState,
};

#[get("/analytics")]
pub async fn get_analytics(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::GetAnalytics)?;
    let reports = state.reports.all().await;
    Ok(HttpResponse::Ok().json(summarize(&reports, &Local::now())))
}
#[get("/activity")]
pub async fn get_activity(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::GetAnalytics)?;
    let reports = state.reports.all().await;
    Ok(HttpResponse::Ok().json(activity_log(&reports)))
}
