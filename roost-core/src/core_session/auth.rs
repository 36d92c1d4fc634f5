/*
    auth.rs - The authenticated session

    AuthSession owns identity and profile for the running app. Every
    mutation goes through one write lock and is then published as a
    SessionSnapshot on a watch channel; sign-in and sign-out are also
    broadcast as SessionEvents while the lock is held, so event order
    always matches state order.

    Identity changes normally arrive from the remote's change stream.
    Transitions that keep the uid (linking an anonymous identity to an
    email credential) are not reliably reported, so those paths advance
    local state themselves.

    Work that awaits the remote before writing (profile loads, the profile
    saga) re-checks at write time that its identity is still the current
    one and drops its result otherwise.
*/

use super::activity::ActivityLog;
use super::errors::{AuthRemoteError, SessionError, SessionResult};
use super::events::{EventBroadcaster, SessionEvent};
use super::remote::{AuthRemote, ProfileRemote};
use super::saga::{SagaReport, SagaStep, SagaWarning};
use super::state::{SessionFlags, SessionPhase, SessionSnapshot};
use super::validation::{require_non_empty, validate_display_name, validate_email, validate_password};
use crate::config::{SessionConfig, ValidationConfig};
use crate::core_filter::ContentFilter;
use crate::core_loadable::TransportError;
use crate::core_model::{Identity, Profile, ProfileCandidate, Timestamp, Uid};
use crate::metrics::record_counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Remote and local collaborators a session is built from
#[derive(Clone)]
pub struct SessionCollaborators {
    pub auth: Arc<dyn AuthRemote>,
    pub profiles: Arc<dyn ProfileRemote>,
    pub filter: Arc<ContentFilter>,
    pub activity: Arc<dyn ActivityLog>,
}

/// How `sign_in_or_create` reached a signed-in identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignUpPath {
    Linked,
    SignedIn,
    Created,
}

/// The app's single authenticated session
pub struct AuthSession {
    auth: Arc<dyn AuthRemote>,
    profiles: Arc<dyn ProfileRemote>,
    filter: Arc<ContentFilter>,
    activity: Arc<dyn ActivityLog>,
    settings: SessionConfig,
    rules: ValidationConfig,
    state: RwLock<SessionSnapshot>,
    updates: watch::Sender<SessionSnapshot>,
    events: EventBroadcaster,
    /// Serializes anonymous sign-in so concurrent callers share one identity
    anonymous_guard: Mutex<()>,
    /// Bumped whenever a pending flag reset must not fire
    flag_generation: AtomicU64,
    /// Bumped when the session's uid changes or a sign-out is sent
    identity_generation: AtomicU64,
}

impl AuthSession {
    pub fn new(
        collaborators: SessionCollaborators,
        settings: SessionConfig,
        rules: ValidationConfig,
    ) -> Arc<Self> {
        let (updates, _) = watch::channel(SessionSnapshot::default());
        let events = EventBroadcaster::new(settings.event_capacity);

        Arc::new(AuthSession {
            auth: collaborators.auth,
            profiles: collaborators.profiles,
            filter: collaborators.filter,
            activity: collaborators.activity,
            settings,
            rules,
            state: RwLock::new(SessionSnapshot::default()),
            updates,
            events,
            anonymous_guard: Mutex::new(()),
            flag_generation: AtomicU64::new(0),
            identity_generation: AtomicU64::new(0),
        })
    }

    /// Latest published state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.updates.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.updates.borrow().phase
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn filter(&self) -> &Arc<ContentFilter> {
        &self.filter
    }

    pub fn rules(&self) -> &ValidationConfig {
        &self.rules
    }

    /// Bootstrap from the remote's current identity and follow its changes.
    ///
    /// Subscribes before reading the current identity so nothing in between
    /// is missed.
    pub async fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let changes = self.auth.subscribe_identity_changes();
        let current = self.auth.current_identity().await;
        self.handle_identity_change(current).await;
        self.spawn_identity_listener(changes)
    }

    /// Forward remote identity changes into `handle_identity_change`.
    ///
    /// The task ends when the stream closes or the session is dropped.
    pub fn spawn_identity_listener(
        self: &Arc<Self>,
        mut changes: broadcast::Receiver<Option<Identity>>,
    ) -> JoinHandle<()> {
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let change = changes.recv().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                match change {
                    Ok(identity) => session.handle_identity_change(identity).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Identity listener lagged; resyncing");
                        let current = session.auth.current_identity().await;
                        session.handle_identity_change(current).await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("Identity change stream closed");
                        break;
                    }
                }
            }
        })
    }

    /// React to the remote reporting a (possibly absent) identity
    pub async fn handle_identity_change(&self, identity: Option<Identity>) {
        match identity {
            Some(identity) if identity.is_anonymous => self.apply_anonymous(identity).await,
            Some(identity) => self.apply_real(identity).await,
            None => {
                if self.clear_real_identity().await {
                    self.record("signed out remotely");
                }
                if let Err(e) = self.ensure_identity().await {
                    warn!(error = %e, "Anonymous sign-in failed");
                    self.retain_error(e).await;
                }
            }
        }
    }

    /// Sign in with an existing email account. Returns its uid.
    pub async fn sign_in_existing(&self, email: &str, password: &str) -> SessionResult<Uid> {
        require_non_empty("email", email)?;
        require_non_empty("password", password)?;

        let previous = self.snapshot().identity;
        match self.auth.sign_in(email, password).await {
            Ok(identity) => {
                let uid = identity.uid.clone();
                record_counter("session.sign_in", 1);
                info!(%uid, "Signed in");
                self.record(format!("signed in {}", uid));

                if previous.is_some_and(|p| p.is_same_uid_link(&identity)) {
                    self.apply_real(identity).await;
                }
                Ok(uid)
            }
            Err(AuthRemoteError::NotFound) => self.fail(SessionError::IdentityNotFound).await,
            Err(e) => self.fail(SessionError::Remote(e)).await,
        }
    }

    /// Sign in, creating the account if needed.
    ///
    /// An anonymous session is linked to the credential first so its uid
    /// (and anything stored under it) carries over.
    pub async fn sign_in_or_create(&self, email: &str, password: &str) -> SessionResult<Uid> {
        validate_email(email)?;
        validate_password(password, &self.rules)?;

        self.update(|s| s.flags.creating_account = true).await;

        match self.sign_up_inner(email, password).await {
            Ok((uid, path)) => {
                record_counter("session.sign_in", 1);
                self.update(|s| match path {
                    SignUpPath::SignedIn => s.flags.creating_account = false,
                    SignUpPath::Linked | SignUpPath::Created => s.flags.account_incomplete = true,
                })
                .await;
                info!(%uid, ?path, "Signed in or created account");
                Ok(uid)
            }
            Err(e) => {
                self.update(|s| s.flags.creating_account = false).await;
                self.fail(e).await
            }
        }
    }

    async fn sign_up_inner(&self, email: &str, password: &str) -> SessionResult<(Uid, SignUpPath)> {
        if self.snapshot().is_anonymous() {
            match self.auth.link_anonymous(email, password).await {
                Ok(identity) => {
                    let uid = identity.uid.clone();
                    self.record(format!("linked anonymous identity {}", uid));
                    self.apply_real(identity).await;
                    return Ok((uid, SignUpPath::Linked));
                }
                Err(AuthRemoteError::AlreadyInUse) => {
                    info!("Credential belongs to another account; signing in instead");
                }
                Err(e) => return Err(SessionError::Remote(e)),
            }
        }

        match self.auth.sign_in(email, password).await {
            Ok(identity) => {
                self.record(format!("signed in {}", identity.uid));
                Ok((identity.uid, SignUpPath::SignedIn))
            }
            Err(AuthRemoteError::NotFound) => match self.auth.create_identity(email, password).await {
                Ok(identity) => {
                    self.record(format!("created identity {}", identity.uid));
                    Ok((identity.uid, SignUpPath::Created))
                }
                Err(AuthRemoteError::AlreadyInUse) => Err(SessionError::IdentityConflict),
                Err(e) => Err(SessionError::Remote(e)),
            },
            Err(e) => Err(SessionError::Remote(e)),
        }
    }

    /// Create the profile for the current identity.
    ///
    /// Steps: ensure an identity (critical), create the profile (critical),
    /// reserve and assign the display name, send the verification email.
    /// The last two only add warnings to the report.
    pub async fn create_profile_saga(self: &Arc<Self>, candidate: ProfileCandidate) -> SessionResult<SagaReport> {
        validate_display_name(&candidate.display_name, &self.rules, &self.filter)?;
        self.update(|s| s.flags.creating_account = true).await;

        let identity = match self.snapshot().identity {
            Some(identity) => identity,
            None => match self.ensure_identity().await {
                Ok(identity) => identity,
                Err(e) => {
                    self.update(|s| s.flags.creating_account = false).await;
                    return self.fail(e).await;
                }
            },
        };

        let uid = identity.uid.clone();
        if candidate.uid != uid {
            debug!(candidate = %candidate.uid, %uid, "Profile candidate rebound to current identity");
        }
        let candidate = ProfileCandidate { uid: uid.clone(), ..candidate };

        let profile = match self.profiles.create_profile(&candidate).await {
            Ok(profile) => profile,
            Err(e) => {
                let err = SessionError::ProfileIncomplete(e.to_string());
                error!(%uid, error = %e, "Profile creation failed");
                self.update(|s| {
                    s.identity = Some(identity.clone());
                    s.profile = None;
                    s.flags.creating_account = false;
                    s.flags.account_incomplete = !identity.is_anonymous;
                    s.last_error = Some(err.clone());
                    s.refresh_phase();
                })
                .await;
                self.record(format!("profile creation failed for {}", uid));
                return Err(err);
            }
        };

        let mut warnings = Vec::new();
        let name = candidate.display_name.as_str();
        if let Err(e) = self.profiles.create_display_name(&uid, name).await {
            warnings.push(SagaWarning {
                step: SagaStep::ReserveDisplayName,
                error: e.to_string(),
            });
        }
        if let Err(e) = self.profiles.set_display_name(&uid, name).await {
            warnings.push(SagaWarning {
                step: SagaStep::AssignDisplayName,
                error: e.to_string(),
            });
        }

        let mut verification_sent = false;
        if !identity.is_anonymous && identity.email.is_some() && !identity.is_email_verified {
            match self.auth.send_verification_email().await {
                Ok(()) => verification_sent = true,
                Err(e) => warnings.push(SagaWarning {
                    step: SagaStep::VerificationEmail,
                    error: e.to_string(),
                }),
            }
        }

        for warning in &warnings {
            warn!(%uid, step = %warning.step, error = %warning.error, "Profile creation step failed");
        }
        record_counter("session.saga.completed", 1);
        record_counter("session.saga.warnings", warnings.len() as u64);

        let phase = self
            .update(|s| {
                if s.uid() != Some(&uid) {
                    return None;
                }
                s.identity = Some(identity.clone());
                s.profile = Some(profile.clone());
                s.warnings = warnings.clone();
                s.last_error = None;
                s.flags = SessionFlags {
                    account_incomplete: false,
                    creating_account: false,
                    account_created: true,
                };
                s.refresh_phase();
                self.events.emit(SessionEvent::SignedIn {
                    uid: uid.clone(),
                    is_anonymous: identity.is_anonymous,
                });
                Some(s.phase)
            })
            .await;

        let Some(phase) = phase else {
            warn!(%uid, "Identity replaced during profile creation; result dropped");
            self.update(|s| s.flags.creating_account = false).await;
            return Err(SessionError::IdentityChanged);
        };

        info!(%uid, %phase, warnings = warnings.len(), "Profile created");
        self.record(format!("profile created for {}", uid));
        self.schedule_flag_reset();

        Ok(SagaReport {
            uid,
            profile,
            warnings,
            verification_sent,
        })
    }

    /// Finish a profile for a real identity stuck in `ProfileIncomplete`
    pub async fn complete_profile(self: &Arc<Self>, display_name: &str) -> SessionResult<Profile> {
        let snapshot = self.snapshot();
        let identity = match snapshot.identity {
            Some(identity) if !identity.is_anonymous => identity,
            _ => return Err(SessionError::NotSignedIn),
        };
        if let Some(profile) = snapshot.profile {
            debug!(uid = %identity.uid, "Profile already complete");
            return Ok(profile);
        }

        let report = self
            .create_profile_saga(ProfileCandidate::new(identity.uid, display_name))
            .await?;
        Ok(report.profile)
    }

    pub async fn update_display_name(&self, name: &str) -> SessionResult<Profile> {
        validate_display_name(name, &self.rules, &self.filter)?;
        let profile = self.require_profile()?;

        if let Err(e) = self.profiles.set_display_name(&profile.uid, name).await {
            return self.fail(e.into()).await;
        }

        self.record(format!("display name changed for {}", profile.uid));
        self.update(|s| {
            let profile = s.profile.as_mut()?;
            profile.display_name = name.to_string();
            Some(profile.clone())
        })
        .await
        .ok_or(SessionError::NotSignedIn)
    }

    pub async fn update_photo_url(&self, url: &str) -> SessionResult<Profile> {
        require_non_empty("photo url", url.trim())?;
        let profile = self.require_profile()?;

        if let Err(e) = self.profiles.update_photo_url(&profile.uid, url).await {
            return self.fail(e.into()).await;
        }

        self.record(format!("photo changed for {}", profile.uid));
        self.update(|s| {
            let profile = s.profile.as_mut()?;
            profile.photo_url = Some(url.to_string());
            Some(profile.clone())
        })
        .await
        .ok_or(SessionError::NotSignedIn)
    }

    pub async fn reset_password(&self, email: &str) -> SessionResult<()> {
        validate_email(email)?;
        match self.auth.send_password_reset(email).await {
            Ok(()) => {
                info!("Password reset requested");
                self.record("password reset requested");
                Ok(())
            }
            Err(AuthRemoteError::NotFound) => self.fail(SessionError::IdentityNotFound).await,
            Err(e) => self.fail(SessionError::Remote(e)).await,
        }
    }

    /// Re-authenticate with `old_password`, then set `new_password`
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> SessionResult<()> {
        require_non_empty("current password", old_password)?;
        validate_password(new_password, &self.rules)?;

        let email = match self.snapshot().identity {
            Some(Identity {
                is_anonymous: false,
                email: Some(email),
                ..
            }) => email,
            _ => return Err(SessionError::NotSignedIn),
        };

        if let Err(e) = self.auth.reauthenticate(&email, old_password).await {
            return self.fail(SessionError::ReauthenticationFailed(e.to_string())).await;
        }
        if let Err(e) = self.auth.update_password(new_password).await {
            return self.fail(SessionError::PasswordChangeFailed(e.to_string())).await;
        }

        info!("Password changed");
        self.record("password changed");
        Ok(())
    }

    /// Reload the identity and pick up a completed email verification
    pub async fn refresh_verification(&self) -> SessionResult<SessionPhase> {
        let identity = match self.auth.reload_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Err(SessionError::NotSignedIn),
            Err(e) => return self.fail(SessionError::Remote(e)).await,
        };

        let (before, after) = self
            .update(|s| {
                let before = s.phase;
                s.identity = Some(identity);
                s.refresh_phase();
                (before, s.phase)
            })
            .await;

        if before == SessionPhase::Unverified && after == SessionPhase::Verified {
            info!("Email verified");
            self.record("email verified");
        }
        Ok(after)
    }

    /// Sign out a real user and fall back to a fresh anonymous identity.
    ///
    /// No-op when neither this session nor the remote holds a real identity.
    pub async fn sign_out(&self) -> SessionResult<()> {
        let is_real = |identity: &Option<Identity>| identity.as_ref().is_some_and(|i| !i.is_anonymous);

        // A sign-in the remote has made but this session has not applied yet still counts
        if !is_real(&self.snapshot().identity) && !is_real(&self.auth.current_identity().await) {
            debug!("No real identity; nothing to sign out");
            return Ok(());
        }

        if let Err(e) = self.auth.sign_out().await {
            return self.fail(SessionError::Remote(e)).await;
        }
        // Profile loads still in flight belong to the identity just signed out
        self.identity_generation.fetch_add(1, Ordering::SeqCst);

        if self.clear_real_identity().await {
            info!("Signed out");
            self.record("signed out");
        }

        if let Err(e) = self.ensure_identity().await {
            warn!(error = %e, "Anonymous sign-in after sign-out failed");
            self.retain_error(e).await;
        }
        Ok(())
    }

    /// Existing remote identity, or a new anonymous one
    async fn ensure_identity(&self) -> SessionResult<Identity> {
        let identity = {
            let _guard = self.anonymous_guard.lock().await;
            match self.auth.current_identity().await {
                Some(existing) => existing,
                None => self.auth.sign_in_anonymously().await?,
            }
        };

        if identity.is_anonymous {
            self.apply_anonymous(identity.clone()).await;
        } else {
            self.apply_real(identity.clone()).await;
        }
        Ok(identity)
    }

    async fn apply_anonymous(&self, identity: Identity) {
        let uid = identity.uid.clone();
        let changed = self
            .update(|s| {
                if s.identity.as_ref() == Some(&identity) {
                    return false;
                }
                // Linking is one-way; a late anonymous report for a linked uid is stale
                if s.identity.as_ref().is_some_and(|cur| cur.uid == identity.uid && !cur.is_anonymous) {
                    return false;
                }
                self.adopt(s, identity);
                s.profile = None;
                s.refresh_phase();
                self.events.emit(SessionEvent::SignedIn {
                    uid: uid.clone(),
                    is_anonymous: true,
                });
                true
            })
            .await;

        if changed {
            debug!(%uid, "Anonymous session");
            self.record(format!("anonymous session {}", uid));
        }
    }

    async fn apply_real(&self, identity: Identity) {
        let generation = self.identity_generation.load(Ordering::SeqCst);
        let current = self.snapshot();
        if current.identity.as_ref() == Some(&identity) && current.profile.is_some() {
            debug!(uid = %identity.uid, "Identity unchanged");
            return;
        }

        let uid = identity.uid.clone();
        let fetched = self.profiles.fetch_profile(&uid).await;

        if !self.auth.current_identity().await.is_some_and(|c| c.uid == uid) {
            debug!(%uid, "Remote identity moved on while loading profile; dropped");
            return;
        }

        let applied: Option<Result<SessionPhase, TransportError>> = match fetched {
            Ok(profile) => self
                .update(|s| {
                    if self.identity_generation.load(Ordering::SeqCst) != generation {
                        return None;
                    }
                    self.adopt(s, identity);
                    s.profile = Some(profile);
                    s.flags.account_incomplete = false;
                    s.last_error = None;
                    s.refresh_phase();
                    self.events.emit(SessionEvent::SignedIn {
                        uid: uid.clone(),
                        is_anonymous: false,
                    });
                    Some(Ok(s.phase))
                })
                .await,
            Err(e) => {
                let err = SessionError::ProfileIncomplete(e.to_string());
                self.update(|s| {
                    if self.identity_generation.load(Ordering::SeqCst) != generation {
                        return None;
                    }
                    self.adopt(s, identity);
                    s.profile = None;
                    s.flags.account_incomplete = true;
                    s.last_error = Some(err);
                    s.refresh_phase();
                    Some(Err(e))
                })
                .await
            }
        };

        match applied {
            Some(Ok(phase)) => {
                info!(%uid, %phase, "Session loaded");
                self.record(format!("session {} for {}", phase, uid));
            }
            Some(Err(e)) => {
                warn!(%uid, error = %e, "Profile unavailable");
                self.record(format!("profile incomplete for {}", uid));
            }
            None => debug!(%uid, "Session changed while loading profile; dropped"),
        }
    }

    /// Make `identity` current, bumping the identity generation on a uid change
    fn adopt(&self, s: &mut SessionSnapshot, identity: Identity) {
        if s.uid() != Some(&identity.uid) {
            self.identity_generation.fetch_add(1, Ordering::SeqCst);
        }
        s.identity = Some(identity);
    }

    /// Drop a real identity and announce sign-out. False if there was none.
    async fn clear_real_identity(&self) -> bool {
        let cleared = self
            .update(|s| {
                let is_real = s.identity.as_ref().is_some_and(|i| !i.is_anonymous);
                if is_real {
                    *s = SessionSnapshot::default();
                    self.identity_generation.fetch_add(1, Ordering::SeqCst);
                    self.events.emit(SessionEvent::SignedOut);
                }
                is_real
            })
            .await;

        if cleared {
            // A pending reset belongs to the old user
            self.flag_generation.fetch_add(1, Ordering::SeqCst);
        }
        cleared
    }

    fn require_profile(&self) -> SessionResult<Profile> {
        let snapshot = self.snapshot();
        match (&snapshot.identity, snapshot.profile) {
            (Some(identity), Some(profile)) if !identity.is_anonymous => Ok(profile),
            (Some(identity), None) if !identity.is_anonymous => Err(SessionError::ProfileIncomplete(
                "no profile loaded".to_string(),
            )),
            _ => Err(SessionError::NotSignedIn),
        }
    }

    fn schedule_flag_reset(self: &Arc<Self>) {
        let generation = self.flag_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.settings.flag_reset_delay;
        let session = Arc::downgrade(self);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = session.upgrade() else {
                return;
            };
            if session.flag_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            session.update(|s| s.flags.account_created = false).await;
            debug!("Account-created flag reset");
        });
    }

    async fn update<R>(&self, apply: impl FnOnce(&mut SessionSnapshot) -> R) -> R {
        let mut state = self.state.write().await;
        let result = apply(&mut state);
        self.updates.send_replace(state.clone());
        result
    }

    async fn retain_error(&self, err: SessionError) {
        self.update(|s| s.last_error = Some(err)).await;
    }

    async fn fail<T>(&self, err: SessionError) -> SessionResult<T> {
        warn!(error = %err, "Session operation failed");
        self.retain_error(err.clone()).await;
        Err(err)
    }

    fn record(&self, event: impl AsRef<str>) {
        self.activity.append(event.as_ref(), Timestamp::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_backend::{MemoryBackend, Operation};
    use crate::core_session::activity::MemoryActivityLog;
    use crate::test_utils::{assert_completes_within, wait_for_state, with_timeout, DEFAULT_TEST_TIMEOUT};
    use std::time::Duration;

    struct Harness {
        backend: Arc<MemoryBackend>,
        activity: Arc<MemoryActivityLog>,
        session: Arc<AuthSession>,
    }

    fn harness() -> Harness {
        let backend = Arc::new(MemoryBackend::new());
        let activity = Arc::new(MemoryActivityLog::new());
        let filter = Arc::new(ContentFilter::default());
        filter.enable_with_bundled();

        let session = AuthSession::new(
            SessionCollaborators {
                auth: backend.clone(),
                profiles: backend.clone(),
                filter,
                activity: activity.clone(),
            },
            SessionConfig {
                flag_reset_delay: Duration::from_millis(50),
                ..SessionConfig::default()
            },
            ValidationConfig::default(),
        );
        Harness {
            backend,
            activity,
            session,
        }
    }

    #[tokio::test]
    async fn test_start_signs_in_anonymously() {
        let h = harness();
        let mut events = h.session.subscribe_events();

        h.session.start().await;

        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Anonymous);
        assert!(snapshot.is_anonymous());
        let event = with_timeout(DEFAULT_TEST_TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert!(matches!(event, SessionEvent::SignedIn { is_anonymous: true, .. }));
    }

    #[tokio::test]
    async fn test_sign_in_existing_validates_before_remote() {
        let h = harness();
        let err = h.session.sign_in_existing("", "pw").await.unwrap_err();
        assert!(matches!(err, SessionError::InputValidation(_)));
        assert_eq!(h.backend.call_count(Operation::SignIn), 0);
    }

    #[tokio::test]
    async fn test_sign_in_unknown_account() {
        let h = harness();
        let err = h.session.sign_in_existing("nobody@x.io", "secret").await.unwrap_err();
        assert_eq!(err, SessionError::IdentityNotFound);
        assert_eq!(h.session.snapshot().last_error, Some(SessionError::IdentityNotFound));
    }

    #[tokio::test]
    async fn test_link_keeps_anonymous_uid() {
        let h = harness();
        h.session.start().await;
        let anon_uid = h.session.snapshot().uid().cloned().unwrap();

        let uid = h.session.sign_in_or_create("ada@x.io", "secret1").await.unwrap();

        assert_eq!(uid, anon_uid);
        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::ProfileIncomplete);
        assert!(snapshot.flags.account_incomplete);
        assert!(snapshot.flags.creating_account);
    }

    #[tokio::test]
    async fn test_link_conflict_falls_back_to_sign_in() {
        let h = harness();
        let existing = h.backend.add_account("ada@x.io", "secret1", true);
        h.session.start().await;

        let uid = h.session.sign_in_or_create("ada@x.io", "secret1").await.unwrap();
        assert_eq!(uid, existing);
        assert!(!h.session.snapshot().flags.creating_account);
    }

    #[tokio::test]
    async fn test_create_when_no_account() {
        let h = harness();
        let uid = h.session.sign_in_or_create("new@x.io", "secret1").await.unwrap();
        assert_eq!(h.backend.call_count(Operation::CreateIdentity), 1);
        assert!(!uid.is_empty());
    }

    #[tokio::test]
    async fn test_saga_with_warnings_still_completes() {
        let h = harness();
        h.session.start().await;
        h.session.sign_in_or_create("ada@x.io", "secret1").await.unwrap();
        h.backend.fail_next(Operation::CreateDisplayName, TransportError::Rejected("taken".into()));
        h.backend.fail_next(Operation::SendVerification, TransportError::Unavailable("smtp".into()));

        let uid = h.session.snapshot().uid().cloned().unwrap();
        let report = h
            .session
            .create_profile_saga(ProfileCandidate::new(uid, "Ada"))
            .await
            .unwrap();

        assert_eq!(report.warnings.len(), 2);
        assert!(!report.verification_sent);
        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Unverified);
        assert!(snapshot.flags.account_created);
        assert!(!snapshot.flags.account_incomplete);
        assert_eq!(snapshot.warnings, report.warnings);
    }

    #[tokio::test]
    async fn test_saga_profile_failure_marks_incomplete() {
        let h = harness();
        h.session.start().await;
        h.session.sign_in_or_create("ada@x.io", "secret1").await.unwrap();
        h.backend.fail_next(Operation::CreateProfile, TransportError::Unavailable("down".into()));

        let uid = h.session.snapshot().uid().cloned().unwrap();
        let err = h
            .session
            .create_profile_saga(ProfileCandidate::new(uid.clone(), "Ada"))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::ProfileIncomplete(_)));
        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::ProfileIncomplete);
        assert_eq!(snapshot.uid(), Some(&uid));

        let profile = h.session.complete_profile("Ada").await.unwrap();
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(h.session.phase(), SessionPhase::Unverified);
    }

    #[tokio::test]
    async fn test_saga_rejects_filtered_name() {
        let h = harness();
        let err = h
            .session
            .create_profile_saga(ProfileCandidate::new(Uid::new("u"), "Bozo"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InputValidation(_)));
        assert_eq!(h.backend.call_count(Operation::CreateProfile), 0);
    }

    #[tokio::test]
    async fn test_account_created_flag_resets() {
        let h = harness();
        h.session.start().await;
        let uid = h.session.snapshot().uid().cloned().unwrap();
        h.session
            .create_profile_saga(ProfileCandidate::new(uid, "Ada"))
            .await
            .unwrap();
        assert!(h.session.snapshot().flags.account_created);

        let mut rx = h.session.watch();
        let snapshot = wait_for_state(&mut rx, |s| !s.flags.account_created).await;
        assert!(snapshot.profile.is_some());
    }

    #[tokio::test]
    async fn test_change_password_reauth_failure() {
        let h = harness();
        h.backend.add_account("ada@x.io", "secret1", true);
        h.session.start().await;
        h.session.sign_in_existing("ada@x.io", "secret1").await.unwrap();
        let mut rx = h.session.watch();
        wait_for_state(&mut rx, |s| s.phase.is_real()).await;

        let err = h.session.change_password("wrong!", "secret2").await.unwrap_err();
        assert!(matches!(err, SessionError::ReauthenticationFailed(_)));

        h.session.change_password("secret1", "secret2").await.unwrap();
        assert!(h.backend.check_password("ada@x.io", "secret2"));
    }

    #[tokio::test]
    async fn test_change_password_requires_real_user() {
        let h = harness();
        h.session.start().await;
        let err = h.session.change_password("secret1", "secret2").await.unwrap_err();
        assert_eq!(err, SessionError::NotSignedIn);
    }

    #[tokio::test]
    async fn test_sign_out_anonymous_is_noop() {
        let h = harness();
        h.session.start().await;
        let before = h.session.snapshot();

        h.session.sign_out().await.unwrap();

        assert_eq!(h.session.snapshot().identity, before.identity);
        assert_eq!(h.backend.call_count(Operation::SignOut), 0);
    }

    #[tokio::test]
    async fn test_sign_in_after_unreported_link_advances_immediately() {
        let h = harness();
        h.session.start().await;
        let anon_uid = h.session.snapshot().uid().cloned().unwrap();

        // Same uid, so the remote sends no identity change
        h.backend.link_anonymous("ada@x.io", "secret1").await.unwrap();
        assert!(h.session.snapshot().is_anonymous());

        let uid = h.session.sign_in_existing("ada@x.io", "secret1").await.unwrap();

        assert_eq!(uid, anon_uid);
        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::ProfileIncomplete);
        assert!(!snapshot.is_anonymous());
    }

    #[tokio::test]
    async fn test_sign_out_while_profile_loads_stays_signed_out() {
        let h = harness();
        let bob = h.backend.add_account("bob@x.io", "secret1", true);
        h.backend.add_profile(ProfileCandidate::new(bob.clone(), "Bob").into_profile());
        h.session.start().await;

        let gate = h.backend.hold_profile_fetches();
        h.session.sign_in_existing("bob@x.io", "secret1").await.unwrap();
        assert_completes_within(DEFAULT_TEST_TIMEOUT, async {
            while h.backend.call_count(Operation::FetchProfile) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await;

        h.session.sign_out().await.unwrap();
        assert_eq!(h.backend.call_count(Operation::SignOut), 1);

        gate.release();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Anonymous);
        assert_ne!(snapshot.uid(), Some(&bob));
        assert!(snapshot.profile.is_none());
        assert!(h.backend.current_identity().await.is_some_and(|i| i.is_anonymous));
    }

    #[tokio::test]
    async fn test_refresh_verification_promotes() {
        let h = harness();
        h.session.start().await;
        h.session.sign_in_or_create("ada@x.io", "secret1").await.unwrap();
        h.session.complete_profile("Ada").await.unwrap();
        assert_eq!(h.session.phase(), SessionPhase::Unverified);

        h.backend.verify_email("ada@x.io");
        let phase = h.session.refresh_verification().await.unwrap();

        assert_eq!(phase, SessionPhase::Verified);
        assert!(h.activity.events().iter().any(|e| e == "email verified"));
    }

    #[tokio::test]
    async fn test_update_display_name_requires_profile() {
        let h = harness();
        h.session.start().await;
        let err = h.session.update_display_name("Ada").await.unwrap_err();
        assert_eq!(err, SessionError::NotSignedIn);
    }

    #[tokio::test]
    async fn test_reset_password_unknown_email() {
        let h = harness();
        let err = h.session.reset_password("ghost@x.io").await.unwrap_err();
        assert_eq!(err, SessionError::IdentityNotFound);
    }
}
