//! Cookie-backed in-memory session store
//!
//! Each browser gets a random session id in a signed `sid` cookie. The id
//! maps to a [`SessionEntry`] held in process memory only; nothing is ever
//! written to disk. Sessions are created lazily, the first time a handler
//! stores something, and are dropped after an idle TTL.

use crate::jira::SessionCredentials;
use axum::{
    extract::Request,
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tower::Layer;
use uuid::Uuid;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "sid";

type HmacSha256 = Hmac<Sha256>;

/// How often expired sessions are purged
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Data stored for one session
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub jira_creds: Option<SessionCredentials>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Process-wide session storage
pub struct SessionStore {
    secret: String,
    ttl: chrono::Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(8)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    // A panic while holding the lock cannot leave a HashMap half-updated in a
    // way that matters here, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        now - entry.last_seen > self.ttl
    }

    /// Create an empty session and return its id
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        self.write().insert(
            id.clone(),
            SessionEntry {
                jira_creds: None,
                created_at: now,
                last_seen: now,
            },
        );
        log::debug!("[session] Created session ({} active)", self.len());
        id
    }

    /// Refresh a session's idle timer. Returns false if it is unknown or expired.
    pub fn touch(&self, id: &str) -> bool {
        let now = Utc::now();
        let mut sessions = self.write();
        match sessions.get_mut(id) {
            Some(entry) if !self.is_expired(entry, now) => {
                entry.last_seen = now;
                true
            }
            Some(_) => {
                sessions.remove(id);
                false
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<SessionEntry> {
        let entry = self.read().get(id).cloned()?;
        if self.is_expired(&entry, Utc::now()) {
            return None;
        }
        Some(entry)
    }

    pub fn credentials(&self, id: &str) -> Option<SessionCredentials> {
        self.get(id).and_then(|entry| entry.jira_creds)
    }

    /// Store credentials, replacing any previous ones
    pub fn set_credentials(&self, id: &str, creds: SessionCredentials) {
        let now = Utc::now();
        let mut sessions = self.write();
        let entry = sessions.entry(id.to_string()).or_insert_with(|| SessionEntry {
            jira_creds: None,
            created_at: now,
            last_seen: now,
        });
        entry.jira_creds = Some(creds);
        entry.last_seen = now;
    }

    /// Drop sessions idle for longer than the TTL
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, entry| now - entry.last_seen <= self.ttl);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn mac(&self, id: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(id.as_bytes());
        Some(mac)
    }

    /// Cookie value for a session id: `<id>.<signature>`
    pub fn sign(&self, id: &str) -> String {
        let signature = self
            .mac(id)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
        format!("{}.{}", id, signature)
    }

    /// Check a cookie value and return the session id it carries
    pub fn verify(&self, cookie_value: &str) -> Option<String> {
        let (id, signature) = cookie_value.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;
        self.mac(id)?.verify_slice(&signature).ok()?;
        Some(id.to_string())
    }

    /// Start the periodic purge of expired sessions
    pub fn start_cleanup_task(store: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVAL).await;
                let purged = store.purge_expired();
                if purged > 0 {
                    log::info!("[session] Purged {} expired sessions", purged);
                }
            }
        });
    }
}

/// Per-request handle to the caller's session, available as a request extension
#[derive(Clone)]
pub struct Session {
    store: Arc<SessionStore>,
    id: Arc<Mutex<Option<String>>>,
    issued: Arc<Mutex<Option<String>>>,
}

impl Session {
    fn new(store: Arc<SessionStore>, id: Option<String>) -> Self {
        Self {
            store,
            id: Arc::new(Mutex::new(id)),
            issued: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> Option<String> {
        self.id.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether the caller has a live session
    pub fn is_active(&self) -> bool {
        self.id().is_some()
    }

    pub fn credentials(&self) -> Option<SessionCredentials> {
        self.id().and_then(|id| self.store.credentials(&id))
    }

    /// Store Jira credentials, creating the session if needed
    pub fn set_credentials(&self, creds: SessionCredentials) {
        let id = self.get_or_create_id();
        self.store.set_credentials(&id, creds);
    }

    fn get_or_create_id(&self) -> String {
        let mut id = self.id.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = id.as_ref() {
            return existing.clone();
        }
        let created = self.store.create();
        *id = Some(created.clone());
        *self.issued.lock().unwrap_or_else(|e| e.into_inner()) = Some(created.clone());
        created
    }

    /// Id created during this request, which still needs a cookie
    fn take_issued(&self) -> Option<String> {
        self.issued.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Find and verify the session id in the request cookies
fn session_id_from_headers(headers: &HeaderMap, store: &SessionStore) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE)
        .find_map(|(_, value)| store.verify(value.trim()))
        .filter(|id| store.touch(id))
}

fn session_cookie(value: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, value);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Layer that attaches a [`Session`] to every request
#[derive(Clone)]
pub struct SessionLayer {
    store: Arc<SessionStore>,
    cookie_secure: bool,
}

impl SessionLayer {
    pub fn new(store: Arc<SessionStore>, cookie_secure: bool) -> Self {
        Self {
            store,
            cookie_secure,
        }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            store: self.store.clone(),
            cookie_secure: self.cookie_secure,
        }
    }
}

/// The actual middleware service
#[derive(Clone)]
pub struct SessionMiddleware<S> {
    inner: S,
    store: Arc<SessionStore>,
    cookie_secure: bool,
}

impl<S> tower::Service<Request> for SessionMiddleware<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let store = self.store.clone();
        let cookie_secure = self.cookie_secure;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let existing = session_id_from_headers(req.headers(), &store);
            let session = Session::new(store.clone(), existing);
            req.extensions_mut().insert(session.clone());

            let mut response = inner.call(req).await?;

            if let Some(id) = session.take_issued() {
                let cookie = session_cookie(&store.sign(&id), cookie_secure);
                match HeaderValue::from_str(&cookie) {
                    Ok(value) => {
                        response.headers_mut().append(SET_COOKIE, value);
                    }
                    Err(e) => log::error!("[session] Invalid session cookie: {}", e),
                }
            }

            Ok(response)
        })
    }
}
