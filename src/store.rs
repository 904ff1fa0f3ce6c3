use std::{collections::HashSet, marker::PhantomData, sync::Arc};

use chrono::{DateTime, Utc};
use futures::lock::Mutex;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info, warn};

use crate::{
    database::SlotStore,
    error::{AppError, AppResult, PersistenceError},
    models::{
        registration::{
            ApprovedAdmin, Registration, RegistrationCounts, RegistrationFilter,
            RegistrationRequest,
        },
        report::{Report, ReportAction, ReportRequest, Reporter},
        user::{hash_password, Resident, SignupForm, SuperAdminCredential},
    },
};

pub const REPORTS_KEY: &str = "chmrs_reports";
pub const REGISTRATIONS_KEY: &str = "pending_admin_registrations";
pub const APPROVED_ADMINS_KEY: &str = "approved_admins";
pub const RESIDENTS_KEY: &str = "registered_users";
pub const SUPERADMIN_KEY: &str = "superadmin_credentials";

const REPORT_ID_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// One JSON value held under a single slot key.
pub struct SlotRepository<T> {
    store: Arc<dyn SlotStore>,
    key: &'static str,
    marker: PhantomData<fn() -> T>,
}

/// Result of a mutation. `persisted` is false when the backend rejected the write;
/// the in-memory value is still the new one.
#[derive(Debug)]
pub struct Saved<T> {
    pub value: T,
    pub persisted: bool,
}

impl<T> Saved<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Saved<U> {
        Saved {
            value: f(self.value),
            persisted: self.persisted,
        }
    }
}

impl<T> SlotRepository<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(store: Arc<dyn SlotStore>, key: &'static str) -> Self {
        Self {
            store,
            key,
            marker: PhantomData,
        }
    }
    pub async fn load(&self) -> Result<T, PersistenceError> {
        match self.store.read(self.key).await? {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(|source| PersistenceError::Corrupt {
                    key: self.key.to_string(),
                    source,
                })
            }
            _ => Ok(T::default()),
        }
    }
    pub async fn load_or_default(&self) -> T {
        match self.load().await {
            Ok(value) => value,
            Err(error) => {
                warn!(key = self.key, %error, "falling back to an empty slot");
                T::default()
            }
        }
    }
    pub async fn save(&self, value: &T) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(value).map_err(|source| PersistenceError::Encode {
            key: self.key.to_string(),
            source,
        })?;
        self.store.write(self.key, raw).await
    }
    /// Saves and logs a failure instead of returning it.
    async fn flush(&self, value: &T) -> bool {
        match self.save(value).await {
            Ok(()) => true,
            Err(error) => {
                error!(key = self.key, %error, "failed to persist slot");
                false
            }
        }
    }
    /// Writes the cached value and marks it dirty if the backend refused it.
    async fn sync(&self, cached: &mut Cached<T>) -> bool {
        let persisted = self.flush(&cached.value).await;
        cached.dirty = !persisted;
        persisted
    }
    /// Replaces the cached value with the stored one. A dirty value is written again
    /// instead of being replaced. Returns whether the cache now holds the stored value.
    async fn reload(&self, cached: &mut Cached<T>) -> bool {
        if cached.dirty {
            if self.sync(cached).await {
                info!(key = self.key, "unsaved changes written on retry");
            }
            return false;
        }
        match self.load().await {
            Ok(value) => {
                cached.value = value;
                true
            }
            Err(error) => {
                warn!(key = self.key, %error, "keeping cached slot");
                false
            }
        }
    }
}

/// In-memory copy of one slot. `dirty` is set while the backend is missing a change.
#[derive(Default)]
struct Cached<T> {
    value: T,
    dirty: bool,
}

impl<T> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            dirty: false,
        }
    }
}

fn generate_report_id(taken: &HashSet<u32>) -> u32 {
    let mut rng = rand::thread_rng();
    loop {
        let id = rng.gen_range(REPORT_ID_RANGE);
        if !taken.contains(&id) {
            return id;
        }
    }
}

/// Gives every report without an id a fresh one. Returns whether anything changed.
fn normalize_reports(reports: &mut [Report]) -> bool {
    let mut taken: HashSet<u32> = reports.iter().filter_map(|report| report.report_id).collect();
    let mut changed = false;
    for report in reports.iter_mut().filter(|report| report.report_id.is_none()) {
        let id = generate_report_id(&taken);
        taken.insert(id);
        report.report_id = Some(id);
        changed = true;
    }
    changed
}

/// Timestamp id in milliseconds, bumped past any id already in use.
fn next_timestamp_id(now: DateTime<Utc>, taken: impl Iterator<Item = i64>) -> i64 {
    let id = now.timestamp_millis();
    match taken.max() {
        Some(max) if max >= id => max + 1,
        _ => id,
    }
}

pub struct ReportStore {
    repository: SlotRepository<Vec<Report>>,
    reports: Mutex<Cached<Vec<Report>>>,
}

impl ReportStore {
    pub async fn open(store: Arc<dyn SlotStore>) -> Self {
        let repository = SlotRepository::<Vec<Report>>::new(store, REPORTS_KEY);
        let mut reports = Cached::new(repository.load_or_default().await);
        if normalize_reports(&mut reports.value) {
            repository.sync(&mut reports).await;
        }
        info!(count = reports.value.len(), "loaded reports");

        Self {
            repository,
            reports: Mutex::new(reports),
        }
    }
    pub async fn all(&self) -> Vec<Report> {
        self.reports.lock().await.value.clone()
    }
    pub async fn find(&self, report_id: u32) -> Option<Report> {
        self.reports
            .lock()
            .await
            .value
            .iter()
            .find(|report| report.report_id == Some(report_id))
            .cloned()
    }
    pub async fn submit(
        &self,
        request: ReportRequest,
        reporter: Option<Reporter>,
        now: DateTime<Utc>,
    ) -> AppResult<Saved<Report>> {
        let mut reports = self.reports.lock().await;
        let taken: HashSet<u32> = reports
            .value
            .iter()
            .filter_map(|report| report.report_id)
            .collect();
        let report = Report::submit(request, generate_report_id(&taken), reporter, now)?;

        reports.value.push(report.clone());
        let persisted = self.repository.sync(&mut reports).await;
        info!(report_id = report.id(), "report submitted");

        Ok(Saved {
            value: report,
            persisted,
        })
    }
    /// Applies a lifecycle action and writes the collection back while still holding the lock.
    pub async fn transition(
        &self,
        report_id: u32,
        action: &ReportAction,
        actor: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Saved<Report>> {
        let mut reports = self.reports.lock().await;
        let report = reports
            .value
            .iter_mut()
            .find(|report| report.report_id == Some(report_id))
            .ok_or(AppError::NotFound("REPORT_NOT_FOUND"))?;
        report.apply(action, actor, now)?;
        let report = report.clone();

        let persisted = self.repository.sync(&mut reports).await;
        info!(
            report_id,
            action = %action.kind(),
            status = %report.effective_status(),
            "report transitioned"
        );

        Ok(Saved {
            value: report,
            persisted,
        })
    }
    pub async fn delete(&self, report_id: u32) -> AppResult<Saved<Report>> {
        let mut reports = self.reports.lock().await;
        let index = reports
            .value
            .iter()
            .position(|report| report.report_id == Some(report_id))
            .ok_or(AppError::NotFound("REPORT_NOT_FOUND"))?;
        let report = reports.value.remove(index);

        let persisted = self.repository.sync(&mut reports).await;
        info!(report_id, "report deleted");

        Ok(Saved {
            value: report,
            persisted,
        })
    }
    /// Re-reads the slot, picking up writes made by other processes. The lock is held
    /// across the read so no local mutation lands between the read and the replace.
    pub async fn refresh(&self) {
        let mut reports = self.reports.lock().await;
        if self.repository.reload(&mut reports).await && normalize_reports(&mut reports.value) {
            self.repository.sync(&mut reports).await;
        }
    }
}

#[derive(Default)]
struct RegistrationState {
    registrations: Cached<Vec<Registration>>,
    admins: Cached<Vec<ApprovedAdmin>>,
}

impl RegistrationState {
    fn email_taken(&self, email: &str) -> bool {
        self.registrations
            .value
            .iter()
            .any(|r| r.email.eq_ignore_ascii_case(email))
            || self.admins.value.iter().any(|a| a.email.eq_ignore_ascii_case(email))
    }
}

/// Pending registrations and approved admins. Both slots change under one lock.
pub struct RegistrationStore {
    registrations: SlotRepository<Vec<Registration>>,
    admins: SlotRepository<Vec<ApprovedAdmin>>,
    state: Mutex<RegistrationState>,
}

impl RegistrationStore {
    pub async fn open(store: Arc<dyn SlotStore>) -> Self {
        let registrations =
            SlotRepository::<Vec<Registration>>::new(store.clone(), REGISTRATIONS_KEY);
        let admins = SlotRepository::<Vec<ApprovedAdmin>>::new(store, APPROVED_ADMINS_KEY);
        let state = RegistrationState {
            registrations: Cached::new(registrations.load_or_default().await),
            admins: Cached::new(admins.load_or_default().await),
        };
        info!(
            registrations = state.registrations.value.len(),
            admins = state.admins.value.len(),
            "loaded admin registrations"
        );

        Self {
            registrations,
            admins,
            state: Mutex::new(state),
        }
    }
    /// Newest submissions first.
    pub async fn list(&self, filter: RegistrationFilter) -> Vec<Registration> {
        let state = self.state.lock().await;
        let mut registrations: Vec<Registration> = state
            .registrations
            .value
            .iter()
            .filter(|registration| filter.matches(registration))
            .cloned()
            .collect();
        registrations.sort_by(|a, b| b.id.cmp(&a.id));
        registrations
    }
    pub async fn counts(&self) -> RegistrationCounts {
        RegistrationCounts::tally(&self.state.lock().await.registrations.value)
    }
    pub async fn email_taken(&self, email: &str) -> bool {
        self.state.lock().await.email_taken(email)
    }
    pub async fn submit(
        &self,
        request: RegistrationRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Saved<Registration>> {
        let mut state = self.state.lock().await;
        if state.email_taken(&request.form.normalized_email()) {
            return Err(AppError::Conflict("EMAIL_ALREADY_REGISTERED"));
        }

        let id = next_timestamp_id(now, state.registrations.value.iter().map(|r| r.id));
        let registration = Registration::submit(request, id, now)?;

        state.registrations.value.push(registration.clone());
        let persisted = self.registrations.sync(&mut state.registrations).await;
        info!(registration_id = id, "admin registration submitted");

        Ok(Saved {
            value: registration,
            persisted,
        })
    }
    pub async fn approve(&self, id: i64, now: DateTime<Utc>) -> AppResult<Saved<Registration>> {
        let mut state = self.state.lock().await;
        let registration = state
            .registrations
            .value
            .iter_mut()
            .find(|registration| registration.id == id)
            .ok_or(AppError::NotFound("REGISTRATION_NOT_FOUND"))?;
        let admin = registration.approve(now)?;
        let registration = registration.clone();

        state.admins.value.retain(|existing| existing.id != id);
        state.admins.value.push(admin);
        // Credential first, so a failed registration write never hides an approval.
        let admins_persisted = self.admins.sync(&mut state.admins).await;
        let registrations_persisted = self.registrations.sync(&mut state.registrations).await;
        info!(registration_id = id, "admin registration approved");

        Ok(Saved {
            value: registration,
            persisted: admins_persisted && registrations_persisted,
        })
    }
    pub async fn reject(
        &self,
        id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Saved<Registration>> {
        let mut state = self.state.lock().await;
        let registration = state
            .registrations
            .value
            .iter_mut()
            .find(|registration| registration.id == id)
            .ok_or(AppError::NotFound("REGISTRATION_NOT_FOUND"))?;
        registration.reject(reason, now)?;
        let registration = registration.clone();

        let persisted = self.registrations.sync(&mut state.registrations).await;
        info!(registration_id = id, "admin registration rejected");

        Ok(Saved {
            value: registration,
            persisted,
        })
    }
    /// Deletes a decided registration together with its approved-admin record.
    pub async fn remove(&self, id: i64) -> AppResult<Saved<Registration>> {
        let mut state = self.state.lock().await;
        let index = state
            .registrations
            .value
            .iter()
            .position(|registration| registration.id == id)
            .ok_or(AppError::NotFound("REGISTRATION_NOT_FOUND"))?;
        state.registrations.value[index].ensure_removable()?;

        let registration = state.registrations.value.remove(index);
        state.admins.value.retain(|admin| admin.id != id);
        let admins_persisted = self.admins.sync(&mut state.admins).await;
        let registrations_persisted = self.registrations.sync(&mut state.registrations).await;
        info!(registration_id = id, "admin removed");

        Ok(Saved {
            value: registration,
            persisted: admins_persisted && registrations_persisted,
        })
    }
    pub async fn find_admin_by_email(&self, email: &str) -> Option<ApprovedAdmin> {
        self.state
            .lock()
            .await
            .admins
            .value
            .iter()
            .find(|admin| admin.email.eq_ignore_ascii_case(email))
            .cloned()
    }
    pub async fn refresh(&self) {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        self.registrations.reload(&mut state.registrations).await;
        self.admins.reload(&mut state.admins).await;
    }
}

#[derive(Default)]
struct AccountState {
    residents: Cached<Vec<Resident>>,
    superadmin: Cached<Option<SuperAdminCredential>>,
}

/// Resident accounts and the super-admin credential.
pub struct AccountStore {
    residents: SlotRepository<Vec<Resident>>,
    superadmin: SlotRepository<Option<SuperAdminCredential>>,
    state: Mutex<AccountState>,
}

impl AccountStore {
    /// Loads accounts and writes the bootstrap super-admin credential if none is stored.
    pub async fn open(store: Arc<dyn SlotStore>, email: &str, password: &str) -> AppResult<Self> {
        let residents = SlotRepository::<Vec<Resident>>::new(store.clone(), RESIDENTS_KEY);
        let superadmin = SlotRepository::<Option<SuperAdminCredential>>::new(store, SUPERADMIN_KEY);

        let mut credential: Cached<Option<SuperAdminCredential>> =
            Cached::new(superadmin.load_or_default().await);
        if credential.value.is_none() {
            credential.value = Some(SuperAdminCredential {
                email: email.trim().to_lowercase(),
                password: hash_password(password)?,
            });
            if superadmin.sync(&mut credential).await {
                info!(email = %email, "super-admin credential bootstrapped");
            }
        }

        let state = AccountState {
            residents: Cached::new(residents.load_or_default().await),
            superadmin: credential,
        };
        info!(residents = state.residents.value.len(), "loaded accounts");

        Ok(Self {
            residents,
            superadmin,
            state: Mutex::new(state),
        })
    }
    pub async fn register(
        &self,
        form: SignupForm,
        now: DateTime<Utc>,
    ) -> AppResult<Saved<Resident>> {
        let mut state = self.state.lock().await;
        let email = form.normalized_email();
        if state
            .residents
            .value
            .iter()
            .any(|r| r.email.eq_ignore_ascii_case(&email))
        {
            return Err(AppError::Conflict("USER_ALREADY_EXIST"));
        }

        let id = next_timestamp_id(now, state.residents.value.iter().map(|r| r.id));
        let resident = Resident::register(form, id, now)?;

        state.residents.value.push(resident.clone());
        let persisted = self.residents.sync(&mut state.residents).await;
        info!(resident_id = id, "resident registered");

        Ok(Saved {
            value: resident,
            persisted,
        })
    }
    pub async fn find_resident_by_email(&self, email: &str) -> Option<Resident> {
        self.state
            .lock()
            .await
            .residents
            .value
            .iter()
            .find(|resident| resident.email.eq_ignore_ascii_case(email))
            .cloned()
    }
    pub async fn superadmin(&self) -> Option<SuperAdminCredential> {
        self.state.lock().await.superadmin.value.clone()
    }
    pub async fn refresh(&self) {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        self.residents.reload(&mut state.residents).await;

        // An emptied credential slot keeps the cached credential.
        let cached = state.superadmin.value.clone();
        if self.superadmin.reload(&mut state.superadmin).await && state.superadmin.value.is_none() {
            state.superadmin.value = cached;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::MemorySlotStore,
        models::{
            registration::{tests::pending, RegistrationStatus},
            report::{ReportStatus, Severity},
            user::verify_password,
        },
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use futures::channel::oneshot;

    /// Backend whose next read, once armed, returns only after the test releases it.
    #[derive(Default)]
    struct GatedSlotStore {
        inner: MemorySlotStore,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl GatedSlotStore {
        async fn arm(&self) -> oneshot::Sender<()> {
            let (release, gate) = oneshot::channel();
            *self.gate.lock().await = Some(gate);
            release
        }
    }

    #[async_trait]
    impl SlotStore for GatedSlotStore {
        async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            let value = self.inner.read(key).await;
            let gate = self.gate.lock().await.take();
            if let Some(gate) = gate {
                gate.await.ok();
            }
            value
        }
        async fn write(&self, key: &str, value: String) -> Result<(), PersistenceError> {
            self.inner.write(key, value).await
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
    }

    fn request(hazard: &str) -> ReportRequest {
        ReportRequest {
            hazard: hazard.to_string(),
            custom_hazard: None,
            severity: Some(Severity::Moderate),
            description: Some("Seen this morning".to_string()),
            photos: Vec::new(),
            location: None,
        }
    }

    #[actix_web::test]
    async fn reports_survive_a_reload() {
        let backend = Arc::new(MemorySlotStore::new());
        let store = ReportStore::open(backend.clone()).await;

        let saved = store.submit(request("Pothole"), None, now()).await.unwrap();
        assert!(saved.persisted);
        let id = saved.value.id();
        assert!(REPORT_ID_RANGE.contains(&id));
        store
            .transition(id, &ReportAction::Accept, "Super Admin", now())
            .await
            .unwrap();

        let reopened = ReportStore::open(backend).await;
        assert_eq!(reopened.all().await, store.all().await);
        let report = reopened.find(id).await.unwrap();
        assert_eq!(report.effective_status(), ReportStatus::UnderReview);
        assert_eq!(report.action_history.len(), 1);
    }

    #[actix_web::test]
    async fn open_assigns_missing_ids_and_flushes() {
        let backend = Arc::new(MemorySlotStore::new());
        backend
            .write(
                REPORTS_KEY,
                r#"[{"hazard":"Waterlogged Area","severity":"Minor","description":"","photos":[],"location":null,"date":"2026-10-01T00:00:00.000Z"},{"reportId":123456,"hazard":"Pothole","date":"2026-10-02T00:00:00.000Z"}]"#.to_string(),
            )
            .await
            .unwrap();

        let store = ReportStore::open(backend.clone()).await;
        let reports = store.all().await;
        assert!(reports.iter().all(|report| report.report_id.is_some()));
        assert_ne!(reports[0].report_id, Some(123456));

        let raw = backend.read(REPORTS_KEY).await.unwrap().unwrap();
        let stored: Vec<Report> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored[0].report_id, reports[0].report_id);
    }

    #[actix_web::test]
    async fn corrupt_slot_loads_empty() {
        let backend = Arc::new(MemorySlotStore::new());
        backend
            .write(REPORTS_KEY, "{not json".to_string())
            .await
            .unwrap();

        let repository: SlotRepository<Vec<Report>> =
            SlotRepository::new(backend.clone(), REPORTS_KEY);
        assert!(matches!(
            repository.load().await,
            Err(PersistenceError::Corrupt { .. })
        ));

        let store = ReportStore::open(backend).await;
        assert!(store.all().await.is_empty());
    }

    #[actix_web::test]
    async fn failed_write_keeps_the_transition_in_memory() {
        let backend = Arc::new(MemorySlotStore::new());
        let store = ReportStore::open(backend.clone()).await;
        let id = store
            .submit(request("Foul Odor"), None, now())
            .await
            .unwrap()
            .value
            .id();

        backend.set_fail_writes(true);
        let saved = store
            .transition(id, &ReportAction::Accept, "Super Admin", now())
            .await
            .unwrap();

        assert!(!saved.persisted);
        assert_eq!(saved.value.effective_status(), ReportStatus::UnderReview);
        assert_eq!(
            store.find(id).await.unwrap().effective_status(),
            ReportStatus::UnderReview
        );
    }

    #[actix_web::test]
    async fn invalid_transition_leaves_store_untouched() {
        let backend = Arc::new(MemorySlotStore::new());
        let store = ReportStore::open(backend).await;
        let id = store
            .submit(request("Fallen Trees or Branches"), None, now())
            .await
            .unwrap()
            .value
            .id();
        let before = store.all().await;

        let error = store
            .transition(id, &ReportAction::Reopen, "Super Admin", now())
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::InvalidTransition { .. }));
        assert_eq!(store.all().await, before);

        assert!(matches!(
            store.transition(1, &ReportAction::Accept, "x", now()).await,
            Err(AppError::NotFound("REPORT_NOT_FOUND"))
        ));
    }

    #[actix_web::test]
    async fn delete_removes_the_report() {
        let backend = Arc::new(MemorySlotStore::new());
        let store = ReportStore::open(backend).await;
        let id = store
            .submit(request("Waterlogged Area"), None, now())
            .await
            .unwrap()
            .value
            .id();

        store.delete(id).await.unwrap();
        assert!(store.find(id).await.is_none());
        assert!(store.delete(id).await.is_err());
    }

    #[actix_web::test]
    async fn refresh_picks_up_external_writes() {
        let backend = Arc::new(MemorySlotStore::new());
        let store = ReportStore::open(backend.clone()).await;
        let other = ReportStore::open(backend).await;

        other.submit(request("Pothole"), None, now()).await.unwrap();
        assert!(store.all().await.is_empty());

        store.refresh().await;
        assert_eq!(store.all().await.len(), 1);
    }

    #[actix_web::test]
    async fn slow_refresh_does_not_overwrite_a_concurrent_transition() {
        let backend = Arc::new(GatedSlotStore::default());
        let store = ReportStore::open(backend.clone()).await;
        let id = store
            .submit(request("Cracked Sidewalks"), None, now())
            .await
            .unwrap()
            .value
            .id();

        let accept = ReportAction::Accept;
        let release = backend.arm().await;
        let (_, accepted, _) = futures::join!(
            store.refresh(),
            store.transition(id, &accept, "Super Admin", now()),
            async move {
                release.send(()).ok();
            }
        );
        assert!(accepted.unwrap().persisted);

        let report = store.find(id).await.unwrap();
        assert_eq!(report.effective_status(), ReportStatus::UnderReview);
        assert_eq!(report.action_history.len(), 1);

        store.refresh().await;
        let report = store.find(id).await.unwrap();
        assert_eq!(report.effective_status(), ReportStatus::UnderReview);
        assert_eq!(report.action_history.len(), 1);
    }

    #[actix_web::test]
    async fn refresh_retries_an_unsaved_transition() {
        let backend = Arc::new(MemorySlotStore::new());
        let store = ReportStore::open(backend.clone()).await;
        let id = store
            .submit(request("Overflowing Garbage"), None, now())
            .await
            .unwrap()
            .value
            .id();

        backend.set_fail_writes(true);
        let saved = store
            .transition(id, &ReportAction::Accept, "Super Admin", now())
            .await
            .unwrap();
        assert!(!saved.persisted);

        store.refresh().await;
        assert_eq!(
            store.find(id).await.unwrap().effective_status(),
            ReportStatus::UnderReview
        );

        backend.set_fail_writes(false);
        store.refresh().await;
        assert_eq!(
            store.find(id).await.unwrap().effective_status(),
            ReportStatus::UnderReview
        );

        let reopened = ReportStore::open(backend).await;
        let report = reopened.find(id).await.unwrap();
        assert_eq!(report.effective_status(), ReportStatus::UnderReview);
        assert_eq!(report.action_history.len(), 1);
    }

    #[actix_web::test]
    async fn refresh_keeps_an_unsaved_resident() {
        let backend = Arc::new(MemorySlotStore::new());
        let accounts = AccountStore::open(backend.clone(), "chief@example.com", "first-pass")
            .await
            .unwrap();
        backend.set_fail_writes(true);
        let saved = accounts
            .register(
                SignupForm {
                    first_name: "Lito".to_string(),
                    last_name: "Reyes".to_string(),
                    email: "lito@example.com".to_string(),
                    contact_number: "09170000000".to_string(),
                    password: "secret1".to_string(),
                    confirm_password: "secret1".to_string(),
                },
                now(),
            )
            .await
            .unwrap();
        assert!(!saved.persisted);

        accounts.refresh().await;
        assert!(accounts.find_resident_by_email("lito@example.com").await.is_some());

        backend.set_fail_writes(false);
        accounts.refresh().await;
        let reopened = AccountStore::open(backend, "chief@example.com", "first-pass")
            .await
            .unwrap();
        assert!(reopened.find_resident_by_email("lito@example.com").await.is_some());
    }

    #[actix_web::test]
    async fn remove_admin_deletes_both_records() {
        let backend = Arc::new(MemorySlotStore::new());
        backend
            .write(
                REGISTRATIONS_KEY,
                serde_json::to_string(&vec![pending(1, "a@example.com"), pending(2, "b@example.com")])
                    .unwrap(),
            )
            .await
            .unwrap();
        let store = RegistrationStore::open(backend.clone()).await;

        assert!(matches!(
            store.remove(1).await,
            Err(AppError::InvalidTransition { .. })
        ));

        store.approve(1, now()).await.unwrap();
        assert!(store.find_admin_by_email("A@example.com").await.is_some());

        store.remove(1).await.unwrap();
        assert!(store.find_admin_by_email("a@example.com").await.is_none());
        assert_eq!(store.list(RegistrationFilter::All).await.len(), 1);

        let admins: Vec<ApprovedAdmin> =
            serde_json::from_str(&backend.read(APPROVED_ADMINS_KEY).await.unwrap().unwrap())
                .unwrap();
        assert!(admins.is_empty());
    }

    #[actix_web::test]
    async fn rejection_without_reason_keeps_pending() {
        let backend = Arc::new(MemorySlotStore::new());
        backend
            .write(
                REGISTRATIONS_KEY,
                serde_json::to_string(&vec![pending(5, "c@example.com")]).unwrap(),
            )
            .await
            .unwrap();
        let store = RegistrationStore::open(backend).await;

        assert!(store.reject(5, "", now()).await.is_err());
        let registrations = store
            .list(RegistrationFilter::Only(RegistrationStatus::Pending))
            .await;
        assert_eq!(registrations.len(), 1);
        assert_eq!(store.counts().await.pending, 1);
    }

    #[test]
    fn timestamp_ids_do_not_collide() {
        let id = now().timestamp_millis();
        assert_eq!(next_timestamp_id(now(), [1, 2].into_iter()), id);
        assert_eq!(next_timestamp_id(now(), [id].into_iter()), id + 1);
    }

    #[actix_web::test]
    async fn superadmin_is_bootstrapped_once() {
        let backend = Arc::new(MemorySlotStore::new());
        let accounts = AccountStore::open(backend.clone(), "Chief@Example.com", "first-pass")
            .await
            .unwrap();
        let credential = accounts.superadmin().await.unwrap();
        assert_eq!(credential.email, "chief@example.com");
        assert!(verify_password("first-pass", &credential.password));

        let reopened = AccountStore::open(backend, "other@example.com", "second-pass")
            .await
            .unwrap();
        let credential = reopened.superadmin().await.unwrap();
        assert_eq!(credential.email, "chief@example.com");
    }

    #[actix_web::test]
    async fn duplicate_resident_email_is_rejected() {
        let backend = Arc::new(MemorySlotStore::new());
        let accounts = AccountStore::open(backend, "chief@example.com", "first-pass")
            .await
            .unwrap();
        let form = || SignupForm {
            first_name: "Ana".to_string(),
            last_name: "Cruz".to_string(),
            email: "ana@example.com".to_string(),
            contact_number: "09171234567".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        };

        accounts.register(form(), now()).await.unwrap();
        assert!(matches!(
            accounts.register(form(), now()).await,
            Err(AppError::Conflict("USER_ALREADY_EXIST"))
        ));
        assert!(accounts.find_resident_by_email("ANA@example.com").await.is_some());
    }
}
