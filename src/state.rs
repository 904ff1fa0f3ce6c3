use std::{sync::Arc, time::Duration};

use actix_web::{rt, web};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    config::Config,
    database::SlotStore,
    error::{AppError, AppResult},
    models::{
        registration::{Registration, RegistrationRequest},
        role::Role,
        user::{verify_password, LoginResponse, Resident, Session, SignupForm, TokenKeys, UserCredential},
    },
    store::{AccountStore, RegistrationStore, ReportStore, Saved},
};

pub struct AppState {
    pub reports: ReportStore,
    pub registrations: RegistrationStore,
    pub accounts: AccountStore,
    pub tokens: Arc<TokenKeys>,
}

impl AppState {
    pub async fn open(store: Arc<dyn SlotStore>, config: &Config) -> AppResult<Self> {
        Ok(Self {
            reports: ReportStore::open(store.clone()).await,
            registrations: RegistrationStore::open(store.clone()).await,
            accounts: AccountStore::open(
                store,
                &config.auth.superadmin_email,
                &config.auth.superadmin_password,
            )
            .await?,
            tokens: Arc::new(TokenKeys::new(
                &config.auth.jwt_secret,
                config.auth.token_ttl_secs,
            )),
        })
    }

    /// Checks the super-admin, then approved admins, then residents. Every failure looks the same.
    pub async fn authenticate(
        &self,
        credential: &UserCredential,
        now: DateTime<Utc>,
    ) -> AppResult<LoginResponse> {
        let email = credential.email.trim().to_lowercase();

        if let Some(superadmin) = self.accounts.superadmin().await {
            if superadmin.email.eq_ignore_ascii_case(&email) {
                if !verify_password(&credential.password, &superadmin.password) {
                    return Err(AppError::InvalidCredentials);
                }
                return self.login(Session::superadmin(&superadmin.email), now);
            }
        }

        if let Some(admin) = self.registrations.find_admin_by_email(&email).await {
            if !verify_password(&credential.password, &admin.password) {
                return Err(AppError::InvalidCredentials);
            }
            return self.login(
                Session {
                    subject: admin.id.to_string(),
                    name: admin.full_name(),
                    email: admin.email,
                    role: Role::Admin,
                },
                now,
            );
        }

        if let Some(resident) = self.accounts.find_resident_by_email(&email).await {
            if !verify_password(&credential.password, &resident.password) {
                return Err(AppError::InvalidCredentials);
            }
            return self.login(
                Session {
                    subject: resident.id.to_string(),
                    name: resident.full_name(),
                    email: resident.email,
                    role: resident.role,
                },
                now,
            );
        }

        Err(AppError::InvalidCredentials)
    }

    fn login(&self, session: Session, now: DateTime<Utc>) -> AppResult<LoginResponse> {
        let token = self.tokens.issue(&session, now)?;
        info!(subject = %session.subject, role = ?session.role, "signed in");

        Ok(LoginResponse {
            token,
            role: session.role,
            name: session.name,
        })
    }

    async fn email_in_use(&self, email: &str) -> bool {
        let superadmin = self
            .accounts
            .superadmin()
            .await
            .map(|credential| credential.email.eq_ignore_ascii_case(email))
            .unwrap_or(false);
        superadmin
            || self.registrations.email_taken(email).await
            || self.accounts.find_resident_by_email(email).await.is_some()
    }

    pub async fn register_resident(
        &self,
        form: SignupForm,
        now: DateTime<Utc>,
    ) -> AppResult<Saved<Resident>> {
        if self.email_in_use(&form.normalized_email()).await {
            return Err(AppError::Conflict("USER_ALREADY_EXIST"));
        }
        self.accounts.register(form, now).await
    }

    pub async fn submit_registration(
        &self,
        request: RegistrationRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Saved<Registration>> {
        if self.email_in_use(&request.form.normalized_email()).await {
            return Err(AppError::Conflict("EMAIL_ALREADY_REGISTERED"));
        }
        self.registrations.submit(request, now).await
    }

    pub async fn refresh(&self) {
        self.reports.refresh().await;
        self.registrations.refresh().await;
        self.accounts.refresh().await;
        debug!("refreshed persisted state");
    }
}

/// Re-reads every slot on a fixed interval so writes from other instances show up.
pub fn spawn_refresh(state: web::Data<AppState>, every: Duration) {
    rt::spawn(async move {
        let mut interval = rt::time::interval(every);
        // The first tick fires immediately; state was just loaded.
        interval.tick().await;
        loop {
            interval.tick().await;
            state.refresh().await;
        }
    });
}
