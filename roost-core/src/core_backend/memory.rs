/*
    memory.rs - In-process backend

    Implements every remote contract (auth, profiles, posts, lexicon) over
    plain maps so the session and stores can run without a platform.

    Features:
    - Identity-change broadcast mirroring the platform, including its quirk:
      linking an anonymous identity keeps the uid and is not broadcast
    - Posts kept as raw comment and message rows, converted on fetch
    - Per-operation failure injection (one-shot or persistent) and call counts
    - Profile fetches can be held open to observe in-between session states
*/

use crate::core_filter::{LexiconSource, BUNDLED_LEXICON};
use crate::core_loadable::{FetchParams, RemoteCollection, TransportError};
use crate::core_model::{
    CommentRow, DirectedPost, Identity, MessageRow, PostCandidate, PostId, PostStatus, Profile,
    ProfileCandidate, RemotePost, StatusEntry, Timestamp, Uid,
};
use crate::core_session::{AuthRemote, AuthRemoteError, AuthRemoteResult, ProfileRemote};
use crate::test_utils::HoldGate;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Remote operations that can be counted and made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SignInAnonymously,
    SignIn,
    CreateIdentity,
    LinkAnonymous,
    SignOut,
    PasswordReset,
    Reauthenticate,
    UpdatePassword,
    SendVerification,
    ReloadIdentity,
    FetchProfile,
    CreateProfile,
    CreateDisplayName,
    SetDisplayName,
    UpdatePhotoUrl,
    FetchPosts,
    CreatePost,
    FetchLexicon,
}

#[derive(Debug, Clone)]
struct Account {
    uid: Uid,
    password: String,
    verified: bool,
}

#[derive(Default)]
struct BackendState {
    accounts: HashMap<String, Account>,
    current: Option<Identity>,
    profiles: HashMap<Uid, Profile>,
    display_names: HashMap<String, Uid>,
    rows: Vec<RemotePost>,
    lexicon: Vec<String>,
    verification_emails: usize,
    password_resets: usize,
}

#[derive(Default)]
struct Failures {
    once: HashMap<Operation, VecDeque<AuthRemoteError>>,
    always: HashMap<Operation, AuthRemoteError>,
    calls: HashMap<Operation, usize>,
}

/// In-memory stand-in for the remote platform
pub struct MemoryBackend {
    state: Mutex<BackendState>,
    failures: Mutex<Failures>,
    identity_tx: broadcast::Sender<Option<Identity>>,
    profile_fetches_open: Arc<watch::Sender<bool>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty backend serving the bundled lexicon
    pub fn new() -> Self {
        let (identity_tx, _) = broadcast::channel(32);
        let (profile_fetches_open, _) = watch::channel(true);
        let state = BackendState {
            lexicon: BUNDLED_LEXICON.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        };
        MemoryBackend {
            state: Mutex::new(state),
            failures: Mutex::new(Failures::default()),
            identity_tx,
            profile_fetches_open: Arc::new(profile_fetches_open),
        }
    }

    /// Register an email account; returns its uid
    pub fn add_account(&self, email: &str, password: &str, verified: bool) -> Uid {
        let uid = Uid::generate();
        self.state.lock().accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
                verified,
            },
        );
        uid
    }

    pub fn add_profile(&self, profile: Profile) {
        self.state.lock().profiles.insert(profile.uid.clone(), profile);
    }

    /// Mark an account's email as verified
    pub fn verify_email(&self, email: &str) {
        if let Some(account) = self.state.lock().accounts.get_mut(email) {
            account.verified = true;
        }
    }

    pub fn check_password(&self, email: &str, password: &str) -> bool {
        self.state
            .lock()
            .accounts
            .get(email)
            .is_some_and(|account| account.password == password)
    }

    pub fn profile(&self, uid: &Uid) -> Option<Profile> {
        self.state.lock().profiles.get(uid).cloned()
    }

    pub fn seed_rows(&self, rows: impl IntoIterator<Item = RemotePost>) {
        self.state.lock().rows.extend(rows);
    }

    pub fn clear_rows(&self) {
        self.state.lock().rows.clear();
    }

    pub fn set_lexicon(&self, entries: Vec<String>) {
        self.state.lock().lexicon = entries;
    }

    pub fn verification_emails_sent(&self) -> usize {
        self.state.lock().verification_emails
    }

    pub fn password_resets_sent(&self) -> usize {
        self.state.lock().password_resets
    }

    /// Fail the next call to `op` with `err`
    pub fn fail_next(&self, op: Operation, err: impl Into<AuthRemoteError>) {
        self.failures
            .lock()
            .once
            .entry(op)
            .or_default()
            .push_back(err.into());
    }

    /// Fail every call to `op` until `clear_failures`
    pub fn fail_always(&self, op: Operation, err: impl Into<AuthRemoteError>) {
        self.failures.lock().always.insert(op, err.into());
    }

    pub fn clear_failures(&self) {
        let mut failures = self.failures.lock();
        failures.once.clear();
        failures.always.clear();
    }

    /// Block profile fetches after they are counted, until the gate is released
    pub fn hold_profile_fetches(&self) -> HoldGate {
        HoldGate::close(&self.profile_fetches_open)
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.failures.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn check(&self, op: Operation) -> AuthRemoteResult<()> {
        let mut failures = self.failures.lock();
        *failures.calls.entry(op).or_default() += 1;

        if let Some(err) = failures.once.get_mut(&op).and_then(VecDeque::pop_front) {
            debug!(?op, error = %err, "Injected failure");
            return Err(err);
        }
        if let Some(err) = failures.always.get(&op) {
            return Err(err.clone());
        }
        Ok(())
    }

    fn check_transport(&self, op: Operation) -> Result<(), TransportError> {
        self.check(op).map_err(|err| match err {
            AuthRemoteError::Transport(source) => source,
            other => TransportError::Rejected(other.to_string()),
        })
    }

    /// Make `identity` current, broadcasting unless the uid is unchanged
    fn set_current(&self, identity: Option<Identity>) {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.current.as_ref().map(|i| &i.uid) != identity.as_ref().map(|i| &i.uid);
            state.current = identity.clone();
            changed
        };
        if changed {
            let _ = self.identity_tx.send(identity);
        }
    }

    fn identity_for(email: &str, account: &Account) -> Identity {
        Identity::with_email(account.uid.clone(), email, account.verified)
    }
}

#[async_trait]
impl AuthRemote for MemoryBackend {
    async fn current_identity(&self) -> Option<Identity> {
        self.state.lock().current.clone()
    }

    async fn sign_in_anonymously(&self) -> AuthRemoteResult<Identity> {
        self.check(Operation::SignInAnonymously)?;
        let identity = Identity::anonymous(Uid::generate());
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthRemoteResult<Identity> {
        self.check(Operation::SignIn)?;
        let identity = {
            let state = self.state.lock();
            let account = state.accounts.get(email).ok_or(AuthRemoteError::NotFound)?;
            if account.password != password {
                return Err(AuthRemoteError::WrongPassword);
            }
            Self::identity_for(email, account)
        };
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_identity(&self, email: &str, password: &str) -> AuthRemoteResult<Identity> {
        self.check(Operation::CreateIdentity)?;
        let identity = {
            let mut state = self.state.lock();
            if state.accounts.contains_key(email) {
                return Err(AuthRemoteError::AlreadyInUse);
            }
            let account = Account {
                uid: Uid::generate(),
                password: password.to_string(),
                verified: false,
            };
            let identity = Self::identity_for(email, &account);
            state.accounts.insert(email.to_string(), account);
            identity
        };
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn link_anonymous(&self, email: &str, password: &str) -> AuthRemoteResult<Identity> {
        self.check(Operation::LinkAnonymous)?;
        let mut state = self.state.lock();
        let uid = match &state.current {
            Some(current) if current.is_anonymous => current.uid.clone(),
            _ => {
                return Err(TransportError::Rejected("no anonymous identity to link".to_string()).into())
            }
        };
        if state.accounts.contains_key(email) {
            return Err(AuthRemoteError::AlreadyInUse);
        }

        let account = Account {
            uid,
            password: password.to_string(),
            verified: false,
        };
        let identity = Self::identity_for(email, &account);
        state.accounts.insert(email.to_string(), account);
        // Same uid: the platform does not report this transition
        state.current = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> AuthRemoteResult<()> {
        self.check(Operation::SignOut)?;
        self.set_current(None);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> AuthRemoteResult<()> {
        self.check(Operation::PasswordReset)?;
        let mut state = self.state.lock();
        if !state.accounts.contains_key(email) {
            return Err(AuthRemoteError::NotFound);
        }
        state.password_resets += 1;
        Ok(())
    }

    async fn reauthenticate(&self, email: &str, password: &str) -> AuthRemoteResult<()> {
        self.check(Operation::Reauthenticate)?;
        let state = self.state.lock();
        let account = state.accounts.get(email).ok_or(AuthRemoteError::NotFound)?;
        if account.password != password {
            return Err(AuthRemoteError::WrongPassword);
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> AuthRemoteResult<()> {
        self.check(Operation::UpdatePassword)?;
        let mut state = self.state.lock();
        let email = state
            .current
            .as_ref()
            .and_then(|identity| identity.email.clone())
            .ok_or_else(|| TransportError::Rejected("no email identity".to_string()))?;
        let account = state.accounts.get_mut(&email).ok_or(AuthRemoteError::NotFound)?;
        account.password = new_password.to_string();
        Ok(())
    }

    async fn send_verification_email(&self) -> AuthRemoteResult<()> {
        self.check(Operation::SendVerification)?;
        let mut state = self.state.lock();
        if state.current.as_ref().and_then(|i| i.email.as_ref()).is_none() {
            return Err(TransportError::Rejected("no email to verify".to_string()).into());
        }
        state.verification_emails += 1;
        Ok(())
    }

    async fn reload_identity(&self) -> AuthRemoteResult<Option<Identity>> {
        self.check(Operation::ReloadIdentity)?;
        let mut state = self.state.lock();
        let refreshed = match &state.current {
            Some(current) => match current.email.as_ref().and_then(|e| state.accounts.get(e).map(|a| (e, a))) {
                Some((email, account)) => Some(Self::identity_for(email, account)),
                None => Some(current.clone()),
            },
            None => None,
        };
        state.current = refreshed.clone();
        Ok(refreshed)
    }

    fn subscribe_identity_changes(&self) -> broadcast::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }
}

#[async_trait]
impl ProfileRemote for MemoryBackend {
    async fn fetch_profile(&self, uid: &Uid) -> Result<Profile, TransportError> {
        self.check_transport(Operation::FetchProfile)?;

        let mut open = self.profile_fetches_open.subscribe();
        let _ = open.wait_for(|open| *open).await;

        self.state
            .lock()
            .profiles
            .get(uid)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(format!("profile {}", uid)))
    }

    async fn create_profile(&self, candidate: &ProfileCandidate) -> Result<Profile, TransportError> {
        self.check_transport(Operation::CreateProfile)?;
        let mut state = self.state.lock();
        if state.profiles.contains_key(&candidate.uid) {
            return Err(TransportError::Rejected(format!("profile {} exists", candidate.uid)));
        }
        let profile = candidate.clone().into_profile();
        state.profiles.insert(profile.uid.clone(), profile.clone());
        Ok(profile)
    }

    async fn create_display_name(&self, uid: &Uid, name: &str) -> Result<(), TransportError> {
        self.check_transport(Operation::CreateDisplayName)?;
        let mut state = self.state.lock();
        let key = name.trim().to_lowercase();
        match state.display_names.get(&key) {
            Some(owner) if owner != uid => Err(TransportError::Rejected(format!("display name '{}' is taken", name))),
            _ => {
                state.display_names.insert(key, uid.clone());
                Ok(())
            }
        }
    }

    async fn set_display_name(&self, uid: &Uid, name: &str) -> Result<(), TransportError> {
        self.check_transport(Operation::SetDisplayName)?;
        let mut state = self.state.lock();
        let profile = state
            .profiles
            .get_mut(uid)
            .ok_or_else(|| TransportError::NotFound(format!("profile {}", uid)))?;
        profile.display_name = name.to_string();
        Ok(())
    }

    async fn update_photo_url(&self, uid: &Uid, url: &str) -> Result<(), TransportError> {
        self.check_transport(Operation::UpdatePhotoUrl)?;
        let mut state = self.state.lock();
        let profile = state
            .profiles
            .get_mut(uid)
            .ok_or_else(|| TransportError::NotFound(format!("profile {}", uid)))?;
        profile.photo_url = Some(url.to_string());
        Ok(())
    }
}

#[async_trait]
impl RemoteCollection<DirectedPost> for MemoryBackend {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<DirectedPost>, TransportError> {
        self.check_transport(Operation::FetchPosts)?;
        let rows = self.state.lock().rows.clone();

        let mut posts: Vec<DirectedPost> = rows
            .into_iter()
            .map(DirectedPost::from)
            .filter(|post| match &params.scope {
                Some(uid) => &post.from.uid == uid || &post.to.uid == uid,
                None => true,
            })
            .collect();
        posts.sort_by_key(|post| std::cmp::Reverse(post.timestamp()));
        if let Some(limit) = params.limit {
            posts.truncate(limit);
        }
        Ok(posts)
    }

    async fn create(&self, candidate: PostCandidate) -> Result<DirectedPost, TransportError> {
        self.check_transport(Operation::CreatePost)?;
        let id = PostId::generate().0;
        let now = Timestamp::now();

        // Threaded posts are stored as comments, direct ones as messages
        let row = if candidate.references.is_empty() {
            RemotePost::Message(MessageRow {
                id,
                sent_at: now.as_millis(),
                sender: candidate.from,
                recipient: candidate.to,
                subject: candidate.subject,
                text: candidate.content,
                reply_to: None,
                statuses: vec![StatusEntry {
                    status: PostStatus::Sent,
                    at: now,
                }],
            })
        } else {
            RemotePost::Comment(CommentRow {
                id,
                created_at: now.as_millis(),
                author: candidate.from,
                target: candidate.to,
                title: candidate.subject,
                body: candidate.content,
                thread: candidate.references.into_iter().map(|r| r.0).collect(),
            })
        };

        self.state.lock().rows.push(row.clone());
        Ok(row.into_post())
    }
}

#[async_trait]
impl LexiconSource for MemoryBackend {
    async fn fetch_entries(&self) -> Result<Vec<String>, TransportError> {
        self.check_transport(Operation::FetchLexicon)?;
        Ok(self.state.lock().lexicon.clone())
    }
}
