use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use serde::Serialize;

use super::saved;
use crate::{
    error::AppResult,
    models::{
        hazard::{HazardGroup, DEPARTMENTS, HAZARD_GROUPS, OTHERS},
        user::{ResidentResponse, SignupForm, UserCredential},
    },
    state::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyResponse {
    pub hazard_groups: &'static [HazardGroup],
    pub departments: &'static [&'static str],
    pub others: &'static str,
}

#[get("/taxonomy")]
pub async fn get_taxonomy() -> HttpResponse {
    HttpResponse::Ok().json(TaxonomyResponse {
        hazard_groups: HAZARD_GROUPS,
        departments: DEPARTMENTS,
        others: OTHERS,
    })
}
#[post("/signup")]
pub async fn signup(
    state: web::Data<AppState>,
    payload: web::Json<SignupForm>,
) -> AppResult<HttpResponse> {
    let resident = state
        .register_resident(payload.into_inner(), Utc::now())
        .await?;
    Ok(saved(
        HttpResponse::Created(),
        resident.map(|resident| ResidentResponse::from(&resident)),
    ))
}
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<UserCredential>,
) -> AppResult<HttpResponse> {
    let response = state.authenticate(&payload, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(response))
}
