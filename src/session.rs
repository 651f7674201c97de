use crate::classify::{ExposureLevel, get_exposure_level};
use crate::diagnosis::DiagnosticResult;
use crate::loader::Trajectory;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Sessions idle longer than this are dropped
const SESSION_IDLE_HOURS: i64 = 24;

pub const DEFAULT_COST_PER_TRADE: f64 = 15.0;

/// Where the user is in the diagnostic flow
///
/// `LoginRequired` and `PaymentLinkShown` both mean the terms were
/// accepted; authentication decides which one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStage {
    NoFile,
    FileLoaded,
    DiagnosisReady,
    LoginRequired,
    PaymentLinkShown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Info,
    Error,
}

/// One-shot inline message shown on the next render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// Per-session context handed to every handler
#[derive(Debug, Clone)]
pub struct SessionState {
    pub upload_id: Option<String>,
    pub file_bytes: Option<Vec<u8>>,
    pub trajectory: Option<Trajectory>,
    pub file_loaded: bool,
    pub diagnosis_ready: bool,
    pub result: Option<DiagnosticResult>,
    pub run_count: u32,
    pub terms_accepted: bool,
    pub token: Option<String>,
    pub email: Option<String>,
    pub cost_per_trade: f64,
    pub flash: Option<Flash>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            upload_id: None,
            file_bytes: None,
            trajectory: None,
            file_loaded: false,
            diagnosis_ready: false,
            result: None,
            run_count: 0,
            terms_accepted: false,
            token: None,
            email: None,
            cost_per_trade: DEFAULT_COST_PER_TRADE,
            flash: None,
        }
    }
}

impl SessionState {
    pub fn new(cost_per_trade: f64) -> Self {
        Self {
            cost_per_trade,
            ..Self::default()
        }
    }

    /// Install a freshly parsed upload under a new upload id
    ///
    /// Any previous diagnosis and terms acceptance belong to the old file
    /// and are cleared. The run counter and login survive.
    pub fn load_file(&mut self, bytes: Vec<u8>, trajectory: Trajectory) -> &str {
        self.file_bytes = Some(bytes);
        self.trajectory = Some(trajectory);
        self.file_loaded = true;
        self.diagnosis_ready = false;
        self.result = None;
        self.terms_accepted = false;
        self.upload_id.insert(Uuid::new_v4().simple().to_string())
    }

    /// Store a result from a successful remote call and count the run
    pub fn record_diagnosis(&mut self, result: DiagnosticResult) {
        self.result = Some(result);
        self.diagnosis_ready = true;
        self.run_count = self.run_count.saturating_add(1);
    }

    pub fn accept_terms(&mut self, accepted: bool) {
        self.terms_accepted = accepted && self.diagnosis_ready;
    }

    /// Start over: drop the upload, result and run counter, keep the login
    pub fn reset(&mut self) {
        let token = self.token.take();
        let email = self.email.take();
        let cost = self.cost_per_trade;

        *self = Self::new(cost);
        self.token = token;
        self.email = email;
    }

    pub fn log_in(&mut self, token: String, email: String) {
        self.token = Some(token);
        self.email = Some(email);
    }

    pub fn log_out(&mut self) {
        self.token = None;
        self.email = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The result, but only once a remote call has succeeded
    pub fn visible_result(&self) -> Option<&DiagnosticResult> {
        if self.diagnosis_ready {
            self.result.as_ref()
        } else {
            None
        }
    }

    pub fn stage(&self) -> FlowStage {
        if !self.file_loaded {
            FlowStage::NoFile
        } else if !self.diagnosis_ready {
            FlowStage::FileLoaded
        } else if !self.terms_accepted {
            FlowStage::DiagnosisReady
        } else if self.is_authenticated() {
            FlowStage::PaymentLinkShown
        } else {
            FlowStage::LoginRequired
        }
    }

    pub fn exposure(&self) -> ExposureLevel {
        get_exposure_level(self.run_count)
    }

    pub fn set_flash(&mut self, kind: FlashKind, message: impl Into<String>) {
        self.flash = Some(Flash {
            kind,
            message: message.into(),
        });
    }

    pub fn take_flash(&mut self) -> Option<Flash> {
        self.flash.take()
    }
}

struct SessionEntry {
    state: SessionState,
    last_seen: DateTime<Utc>,
}

/// In-memory map of live sessions keyed by cookie id
///
/// Each handler borrows exactly one session for the duration of its action;
/// nothing is shared between sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    default_cost: f64,
}

impl SessionStore {
    pub fn new(default_cost: f64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_cost,
        }
    }

    /// Create an empty session and return its id
    pub fn create(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let entry = SessionEntry {
            state: SessionState::new(self.default_cost),
            last_seen: Utc::now(),
        };

        self.write().insert(session_id.clone(), entry);
        session_id
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.read()
            .get(session_id)
            .is_some_and(|entry| !is_expired(entry, Utc::now()))
    }

    /// Run `f` against one session, creating it if the id is unknown or expired
    pub fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let now = Utc::now();
        let mut sessions = self.write();
        sessions.retain(|_, entry| !is_expired(entry, now));

        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                state: SessionState::new(self.default_cost),
                last_seen: now,
            });
        entry.last_seen = now;
        f(&mut entry.state)
    }

    /// Copy of a session's state, for the async parts of a handler
    pub fn snapshot(&self, session_id: &str) -> SessionState {
        self.with_session(session_id, |state| state.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned lock only means another handler panicked mid-update; the
    // map itself is still usable.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn is_expired(entry: &SessionEntry, now: DateTime<Utc>) -> bool {
    now - entry.last_seen > Duration::hours(SESSION_IDLE_HOURS)
}
