/*
    context.rs - Application composition root

    Builds the session, the content filter and the stores from one Config
    and a set of remote collaborators, then routes session events to the
    stores.
*/

use super::errors::{AppError, AppResult};
use super::registry::StoreRegistry;
use crate::config::{Config, FeatureManager};
use crate::core_backend::MemoryBackend;
use crate::core_filter::{Cipher, ContentFilter, FilterError, LexiconSource};
use crate::core_loadable::{FetchOutcome, LoadableStore, RemoteCollection, StoreGate, StoreOptions};
use crate::core_model::{DirectedPost, PostCandidate, UserKey};
use crate::core_session::validation::validate_post;
use crate::core_session::{
    ActivityLog, AuthRemote, AuthSession, ProfileRemote, SessionCollaborators, SessionError, SessionEvent,
};
use crate::core_views::{conversation_partners, search_posts, ConversationPartner};
use crate::metrics::MetricsCollector;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Remote collaborators the app is assembled from
#[derive(Clone)]
pub struct AppCollaborators {
    pub auth: Arc<dyn AuthRemote>,
    pub profiles: Arc<dyn ProfileRemote>,
    pub posts: Arc<dyn RemoteCollection<DirectedPost>>,
    pub lexicon: Arc<dyn LexiconSource>,
    pub activity: Arc<dyn ActivityLog>,
}

impl AppCollaborators {
    /// Every remote served by one in-memory backend
    pub fn in_memory(backend: Arc<MemoryBackend>, activity: Arc<dyn ActivityLog>) -> Self {
        AppCollaborators {
            auth: backend.clone(),
            profiles: backend.clone(),
            posts: backend.clone(),
            lexicon: backend,
            activity,
        }
    }
}

/// Background tasks started by `AppContext::start`
pub struct AppTasks {
    pub router: JoinHandle<()>,
    pub identity_listener: JoinHandle<()>,
}

impl AppTasks {
    pub fn shutdown(self) {
        self.router.abort();
        self.identity_listener.abort();
    }
}

/// Everything the UI layer talks to
pub struct AppContext {
    config: Config,
    session: Arc<AuthSession>,
    filter: Arc<ContentFilter>,
    features: Arc<FeatureManager>,
    metrics: Arc<MetricsCollector>,
    registry: Arc<StoreRegistry>,
    posts: LoadableStore<DirectedPost>,
    lexicon: Arc<dyn LexiconSource>,
}

impl AppContext {
    pub fn new(config: Config, collaborators: AppCollaborators) -> AppResult<Self> {
        config.validate()?;

        let cipher = Cipher::new(&config.filter.cipher_key).map_err(FilterError::from)?;
        let filter = Arc::new(ContentFilter::new(cipher));
        let features = Arc::new(FeatureManager::with_flags(config.features.clone()));

        let session = AuthSession::new(
            SessionCollaborators {
                auth: collaborators.auth,
                profiles: collaborators.profiles,
                filter: filter.clone(),
                activity: collaborators.activity,
            },
            config.session.clone(),
            config.validation.clone(),
        );

        let mut options = StoreOptions::new().with_gate(StoreGate::REAL_USER);
        if let Some(dir) = config.cache_dir() {
            options = options.with_cache_dir(dir);
        }
        let posts = LoadableStore::new(collaborators.posts, options);

        let registry = Arc::new(StoreRegistry::new(features.clone()));
        registry.register(Arc::new(posts.clone()));

        info!(
            cache = config.cache.enabled,
            stores = registry.len(),
            "App context created"
        );

        Ok(AppContext {
            config,
            session,
            filter,
            features,
            metrics: Arc::new(MetricsCollector::new()),
            registry,
            posts,
            lexicon: collaborators.lexicon,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn filter(&self) -> &Arc<ContentFilter> {
        &self.filter
    }

    pub fn features(&self) -> &Arc<FeatureManager> {
        &self.features
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    pub fn posts(&self) -> &LoadableStore<DirectedPost> {
        &self.posts
    }

    /// Enable the filter, start routing session events, then bootstrap the session
    pub async fn start(&self) -> AppResult<AppTasks> {
        let entries = self.enable_filter().await?;
        debug!(entries, "Content filter ready");

        let router = self.spawn_event_router();
        let identity_listener = self.session.start().await;
        Ok(AppTasks {
            router,
            identity_listener,
        })
    }

    /// Load the lexicon from the remote, or the bundled one when configured to
    pub async fn enable_filter(&self) -> AppResult<usize> {
        if !self.features.is_remote_lexicon_enabled() {
            return Ok(self.filter.enable_with_bundled());
        }

        match self.filter.enable(self.lexicon.as_ref()).await {
            Ok(count) => Ok(count),
            Err(err) if self.config.filter.bundled_fallback => {
                warn!(error = %err, "Remote lexicon unavailable; using bundled lexicon");
                Ok(self.filter.enable_with_bundled())
            }
            Err(err) => Err(AppError::Filter(err)),
        }
    }

    /// Forward session events into the store registry.
    ///
    /// Subscribe before the session starts so the first sign-in is seen.
    pub fn spawn_event_router(&self) -> JoinHandle<()> {
        let mut events = self.session.subscribe_events();
        let registry = self.registry.clone();
        let metrics = self.metrics.clone();
        let session = Arc::downgrade(&self.session);

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        warn!(skipped, "Event router lagged; replaying current state");
                        let snapshot = session.snapshot();
                        match &snapshot.identity {
                            Some(identity) => SessionEvent::SignedIn {
                                uid: identity.uid.clone(),
                                is_anonymous: identity.is_anonymous,
                            },
                            None => SessionEvent::SignedOut,
                        }
                    }
                    Err(RecvError::Closed) => break,
                };

                debug!(event = event.label(), "Routing session event");
                if matches!(event, SessionEvent::SignedIn { .. }) {
                    metrics.inc_sign_ins();
                }
                registry.route_event(&event);
            }
        })
    }

    /// Refresh posts and wait for the result
    pub async fn refresh_posts(&self) -> AppResult<FetchOutcome> {
        self.metrics.inc_fetches();
        let outcome = self.posts.fetch_and_await().await?;
        if !outcome.is_replaced() {
            self.metrics.inc_stale_keeps();
        }
        Ok(outcome)
    }

    /// Validate and send a post from the signed-in user to `to`
    pub async fn submit_post(
        &self,
        to: UserKey,
        subject: &str,
        content: &str,
    ) -> AppResult<DirectedPost> {
        let user = self.session.snapshot().user().ok_or(SessionError::NotSignedIn)?;
        let candidate = PostCandidate::new(user.key(), to, subject, content);

        validate_post(&candidate, self.session.rules(), &self.filter)?;
        Ok(self.posts.submit(candidate).await?)
    }

    /// Check free text against the filter, counting the check
    pub fn check_text(&self, text: &str) -> bool {
        let matched = self.filter.contains(text);
        self.metrics.record_filter_check(matched);
        matched
    }

    /// Conversation partners of the signed-in user
    pub fn partners(&self) -> Vec<ConversationPartner> {
        match self.session.snapshot().uid() {
            Some(uid) => conversation_partners(&self.posts.state(), uid),
            None => Vec::new(),
        }
    }

    pub fn search(&self, query: &str) -> Vec<DirectedPost> {
        search_posts(&self.posts.state(), query)
    }
}
