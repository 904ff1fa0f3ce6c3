use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{authorize, saved, ConfirmQuery};
use crate::{
    error::{AppError, AppResult},
    models::{
        registration::{
            RegistrationCounts, RegistrationFilter, RegistrationRequest, RegistrationResponse,
            RejectRequest,
        },
        role::RolePermission,
    },
    state::AppState,
};

#[derive(Deserialize)]
pub struct RegistrationQuery {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct RegistrationListResponse {
    pub registrations: Vec<RegistrationResponse>,
    pub counts: RegistrationCounts,
}

fn parse_registration_id(id: &str) -> AppResult<i64> {
    id.parse().map_err(|_| AppError::InvalidId)
}

#[post("/admin-registrations")]
pub async fn create_registration(
    state: web::Data<AppState>,
    payload: web::Json<RegistrationRequest>,
) -> AppResult<HttpResponse> {
    let registration = state
        .submit_registration(payload.into_inner(), Utc::now())
        .await?;
    Ok(saved(
        HttpResponse::Created(),
        registration.map(|registration| RegistrationResponse::from(&registration)),
    ))
}
#[get("/admin-registrations")]
pub async fn get_registrations(
    state: web::Data<AppState>,
    query: web::Query<RegistrationQuery>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::ManageRegistrations)?;
    let filter = match query.status.as_deref() {
        Some(status) => status.parse::<RegistrationFilter>()?,
        None => RegistrationFilter::All,
    };

    let registrations = state.registrations.list(filter).await;
    Ok(HttpResponse::Ok().json(RegistrationListResponse {
        registrations: registrations.iter().map(RegistrationResponse::from).collect(),
        counts: state.registrations.counts().await,
    }))
}
#[post("/admin-registrations/{id}/approve")]
pub async fn approve_registration(
    state: web::Data<AppState>,
    id: web::Path<String>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::ManageRegistrations)?;
    let id = parse_registration_id(&id)?;
    let registration = state.registrations.approve(id, Utc::now()).await?;
    Ok(saved(
        HttpResponse::Ok(),
        registration.map(|registration| RegistrationResponse::from(&registration)),
    ))
}
#[post("/admin-registrations/{id}/reject")]
pub async fn reject_registration(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<RejectRequest>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::ManageRegistrations)?;
    let id = parse_registration_id(&id)?;
    let registration = state
        .registrations
        .reject(id, &payload.reject_reason, Utc::now())
        .await?;
    Ok(saved(
        HttpResponse::Ok(),
        registration.map(|registration| RegistrationResponse::from(&registration)),
    ))
}
#[delete("/admin-registrations/{id}")]
pub async fn delete_registration(
    state: web::Data<AppState>,
    id: web::Path<String>,
    query: web::Query<ConfirmQuery>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &RolePermission::ManageRegistrations)?;
    let id = parse_registration_id(&id)?;
    query.require()?;
    let registration = state.registrations.remove(id).await?;
    Ok(saved(
        HttpResponse::Ok(),
        registration.map(|registration| RegistrationResponse::from(&registration)),
    ))
}
