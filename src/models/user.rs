use std::{
    rc::Rc,
    sync::{Arc, LazyLock},
};

use actix_service::{self, Transform};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use chrono::{DateTime, Utc};
use futures::{
    future::{ready, LocalBoxFuture, Ready},
    FutureExt,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pwhash::bcrypt;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
    report::{timestamp, Reporter},
    role::Role,
};
use crate::error::{AppError, AppResult};

const ISSUER: &str = "chmrs";
const MIN_PASSWORD_LENGTH: usize = 6;
pub const SUPERADMIN_NAME: &str = "Super Admin";

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

#[derive(Debug, Serialize, Deserialize)]
struct UserClaims {
    sub: String,
    name: String,
    email: String,
    role: Role,
    exp: i64,
    iss: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    pub password: String,
    pub role: Role,
    pub registered_at: String,
}
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SuperAdminCredential {
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize)]
pub struct UserCredential {
    pub email: String,
    pub password: String,
}
/// Fields shared by resident sign-up and admin registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    pub password: String,
    pub confirm_password: String,
}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    pub role: Role,
    pub registered_at: String,
}
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub name: String,
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: i64,
}
pub struct SessionMiddleware<S> {
    service: Rc<S>,
    keys: Arc<TokenKeys>,
}
pub struct SessionMiddlewareFactory {
    keys: Arc<TokenKeys>,
}

pub type SessionRef = Rc<Session>;

pub fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password).map_err(|error| AppError::Hashing(error.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash)
}

fn is_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

fn required(value: &str, field: &'static str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(AppError::Validation { field })
    } else {
        Ok(())
    }
}

impl SignupForm {
    pub fn validate(&self) -> AppResult<()> {
        required(&self.first_name, "firstName")?;
        required(&self.last_name, "lastName")?;
        required(&self.email, "email")?;
        if !is_email(self.email.trim()) {
            return Err(AppError::InvalidInput {
                field: "email",
                reason: "is not an email address",
            });
        }
        required(&self.contact_number, "contactNumber")?;
        if self.password.is_empty() {
            return Err(AppError::Validation { field: "password" });
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::InvalidInput {
                field: "password",
                reason: "must be at least 6 characters",
            });
        }
        if self.password != self.confirm_password {
            return Err(AppError::InvalidInput {
                field: "confirmPassword",
                reason: "does not match password",
            });
        }
        Ok(())
    }
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

impl Resident {
    pub fn register(form: SignupForm, id: i64, now: DateTime<Utc>) -> AppResult<Resident> {
        form.validate()?;
        Ok(Resident {
            id,
            email: form.normalized_email(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            contact_number: form.contact_number.trim().to_string(),
            password: hash_password(&form.password)?,
            role: Role::Resident,
            registered_at: timestamp(now),
        })
    }
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<&Resident> for ResidentResponse {
    fn from(resident: &Resident) -> Self {
        ResidentResponse {
            id: resident.id,
            first_name: resident.first_name.clone(),
            last_name: resident.last_name.clone(),
            email: resident.email.clone(),
            contact_number: resident.contact_number.clone(),
            role: resident.role,
            registered_at: resident.registered_at.clone(),
        }
    }
}

impl Session {
    pub fn superadmin(email: &str) -> Self {
        Session {
            subject: "superadmin".to_string(),
            name: SUPERADMIN_NAME.to_string(),
            email: email.to_string(),
            role: Role::Superadmin,
        }
    }
    /// Name recorded in a report's action history.
    pub fn actor_name(&self) -> &str {
        &self.name
    }
    pub fn reporter(&self) -> Reporter {
        Reporter {
            id: self.subject.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl TokenKeys {
    pub fn new(secret: &str, ttl: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }
    pub fn issue(&self, session: &Session, now: DateTime<Utc>) -> AppResult<String> {
        let claims = UserClaims {
            sub: session.subject.clone(),
            name: session.name.clone(),
            email: session.email.clone(),
            role: session.role,
            exp: now.timestamp() + self.ttl,
            iss: ISSUER.to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
    pub fn verify(&self, token: &str) -> Option<Session> {
        decode::<UserClaims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| Session {
                subject: data.claims.sub,
                name: data.claims.name,
                email: data.claims.email,
                role: data.claims.role,
            })
    }
}

impl SessionMiddlewareFactory {
    pub fn new(keys: Arc<TokenKeys>) -> Self {
        Self { keys }
    }
}

impl<S, B> Service<ServiceRequest> for SessionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv: Rc<S> = self.service.clone();

        let session = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| self.keys.verify(token.trim()));
        if let Some(session) = session {
            req.extensions_mut().insert::<SessionRef>(Rc::new(session));
        }

        async move {
            let res: ServiceResponse<B> = srv.call(req).await?;
            Ok(res)
        }
        .boxed_local()
    }
}
impl<S, B> Transform<S, ServiceRequest> for SessionMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddleware {
            service: Rc::new(service),
            keys: self.keys.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SignupForm {
        SignupForm {
            first_name: "Ana".to_string(),
            last_name: "Cruz".to_string(),
            email: " Ana.Cruz@Example.com ".to_string(),
            contact_number: "09171234567".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        }
    }

    #[test]
    fn signup_form_checks_each_field() {
        assert!(form().validate().is_ok());

        let mut missing = form();
        missing.last_name = " ".to_string();
        assert!(matches!(
            missing.validate(),
            Err(AppError::Validation { field: "lastName" })
        ));

        let mut bad_email = form();
        bad_email.email = "ana.example.com".to_string();
        assert!(matches!(
            bad_email.validate(),
            Err(AppError::InvalidInput { field: "email", .. })
        ));

        let mut short = form();
        short.password = "abc".to_string();
        short.confirm_password = "abc".to_string();
        assert!(matches!(
            short.validate(),
            Err(AppError::InvalidInput {
                field: "password",
                ..
            })
        ));

        let mut mismatch = form();
        mismatch.confirm_password = "secret2".to_string();
        assert!(matches!(
            mismatch.validate(),
            Err(AppError::InvalidInput {
                field: "confirmPassword",
                ..
            })
        ));
    }

    #[test]
    fn email_pattern_is_reused_across_checks() {
        for _ in 0..3 {
            assert!(is_email("ana@example.com"));
            assert!(!is_email("ana@example"));
            assert!(!is_email("ana cruz@example.com"));
        }
    }

    #[test]
    fn registered_resident_has_hashed_password() {
        let resident = Resident::register(form(), 1760000000000, Utc::now()).unwrap();
        assert_eq!(resident.email, "ana.cruz@example.com");
        assert_ne!(resident.password, "secret1");
        assert!(verify_password("secret1", &resident.password));
        assert!(!verify_password("secret2", &resident.password));
        assert_eq!(resident.role, Role::Resident);
    }

    #[test]
    fn tokens_round_trip_and_reject_tampering() {
        let keys = TokenKeys::new("test-secret", 3600);
        let session = Session {
            subject: "1760000000000".to_string(),
            name: "Ana Cruz".to_string(),
            email: "ana.cruz@example.com".to_string(),
            role: Role::Admin,
        };

        let token = keys.issue(&session, Utc::now()).unwrap();
        assert_eq!(keys.verify(&token), Some(session.clone()));

        let other = TokenKeys::new("another-secret", 3600);
        assert_eq!(other.verify(&token), None);

        let expired = keys
            .issue(&session, Utc::now() - chrono::Duration::hours(3))
            .unwrap();
        assert_eq!(keys.verify(&expired), None);
    }
}
