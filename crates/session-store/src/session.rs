//! Current-user session cache
//!
//! Holds the signed-in user in memory and mirrors it to durable storage:
//!
//! - `currentUser`: the JSON session record
//! - `app:role`, `app:username`: plain-string copies kept for older pages
//!
//! The three keys are always written and cleared together. Corrupt or
//! missing data leaves the store signed out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ParseError, ProviderError, SessionError, StorageError};
use crate::storage::KeyValueStore;

/// Primary session record key
pub const STORAGE_KEY: &str = "currentUser";

/// Mirrored role key
pub const ROLE_KEY: &str = "app:role";

/// Mirrored username key
pub const NAME_KEY: &str = "app:username";

/// Role granting admin views
pub const ADMIN_ROLE: &str = "admin";

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, username: impl Into<String>, role: Option<&str>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role: role.map(str::to_string),
        }
    }

    /// Keep only `id`, `username` and `role` from an arbitrary JSON value
    pub fn project(value: &Value) -> Self {
        Self {
            id: value.get("id").map(scalar_to_string).unwrap_or_default(),
            username: value
                .get("username")
                .map(scalar_to_string)
                .unwrap_or_default(),
            role: value
                .get("role")
                .filter(|v| !v.is_null())
                .map(scalar_to_string),
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JavaScript-style truthiness of a JSON value
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Read-only views derived from the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionView<'a> {
    current: Option<&'a SessionRecord>,
}

impl<'a> SessionView<'a> {
    pub fn new(current: Option<&'a SessionRecord>) -> Self {
        Self { current }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    pub fn username(&self) -> &'a str {
        self.current.map(|s| s.username.as_str()).unwrap_or("")
    }

    pub fn role(&self) -> &'a str {
        self.current.and_then(|s| s.role.as_deref()).unwrap_or("")
    }

    pub fn is_admin(&self) -> bool {
        self.role() == ADMIN_ROLE
    }
}

/// Ends the session on the identity provider's side
#[async_trait(?Send)]
pub trait SessionTerminator {
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// What to do with local state when the provider sign-out fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignOutPolicy {
    /// Leave local state untouched and return the error
    #[default]
    KeepOnProviderError,
    /// Clear local state anyway, then return the error
    ForceClear,
}

/// Parse the stored session record.
///
/// `Ok(None)` means nothing is stored (or a falsy JSON value is); `Err` means
/// the stored data is unusable. Callers that only care about "is someone
/// signed in" treat both as no session.
pub fn read_session<S: KeyValueStore>(storage: &S) -> Result<Option<SessionRecord>, ParseError> {
    let raw = storage.get_item(STORAGE_KEY).map_err(|e| ParseError {
        key: STORAGE_KEY,
        reason: e.to_string(),
    })?;

    let Some(raw) = raw else {
        return Ok(None);
    };

    let value: Value = serde_json::from_str(&raw).map_err(|e| ParseError {
        key: STORAGE_KEY,
        reason: e.to_string(),
    })?;

    match value {
        Value::Object(_) => Ok(Some(SessionRecord::project(&value))),
        other if !is_truthy(&other) => Ok(None),
        other => Err(ParseError {
            key: STORAGE_KEY,
            reason: format!("expected an object, found {other}"),
        }),
    }
}

fn read_or_none<S: KeyValueStore>(storage: &S) -> Option<SessionRecord> {
    read_session(storage).unwrap_or_else(|e| {
        debug!(error = %e, "Discarding unreadable session");
        None
    })
}

/// Session cache over injected storage and identity provider
pub struct SessionStore<S, P> {
    storage: S,
    provider: P,
    policy: SignOutPolicy,
    current: Option<SessionRecord>,
}

impl<S, P> SessionStore<S, P>
where
    S: KeyValueStore,
    P: SessionTerminator,
{
    /// Create the store, loading any persisted session
    pub fn new(storage: S, provider: P) -> Self {
        let current = read_or_none(&storage);
        Self {
            storage,
            provider,
            policy: SignOutPolicy::default(),
            current,
        }
    }

    pub fn with_policy(mut self, policy: SignOutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SignOutPolicy {
        self.policy
    }

    pub fn current(&self) -> Option<&SessionRecord> {
        self.current.as_ref()
    }

    /// Derived views, computed from the current value on every call
    pub fn view(&self) -> SessionView<'_> {
        SessionView::new(self.current.as_ref())
    }

    pub fn is_authenticated(&self) -> bool {
        self.view().is_authenticated()
    }

    pub fn username(&self) -> &str {
        self.view().username()
    }

    pub fn role(&self) -> &str {
        self.view().role()
    }

    pub fn is_admin(&self) -> bool {
        self.view().is_admin()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Store `session`, or clear when `None`.
    ///
    /// If any of the three writes fails the store is cleared, so the keys
    /// never describe different users.
    pub fn set(&mut self, session: Option<SessionRecord>) -> Result<(), StorageError> {
        let Some(session) = session else {
            return self.clear();
        };

        match self.write_session(&session) {
            Ok(()) => {
                self.current = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session write failed, clearing stored session");
                if let Err(clear_err) = self.clear() {
                    warn!(error = %clear_err, "Local session clear failed");
                }
                Err(e)
            }
        }
    }

    fn write_session(&mut self, session: &SessionRecord) -> Result<(), StorageError> {
        let payload = serde_json::to_string(session).map_err(|e| StorageError::Write {
            key: STORAGE_KEY.to_string(),
            reason: e.to_string(),
        })?;

        self.storage.set_item(STORAGE_KEY, &payload)?;

        match session.role.as_deref().filter(|r| !r.is_empty()) {
            Some(role) => self.storage.set_item(ROLE_KEY, role)?,
            None => self.storage.remove_item(ROLE_KEY)?,
        }
        if session.username.is_empty() {
            self.storage.remove_item(NAME_KEY)
        } else {
            self.storage.set_item(NAME_KEY, &session.username)
        }
    }

    /// Store a session from loosely shaped JSON. Falsy values clear.
    pub fn set_from_json(&mut self, session: &Value) -> Result<(), StorageError> {
        if is_truthy(session) {
            self.set(Some(SessionRecord::project(session)))
        } else {
            self.clear()
        }
    }

    /// Reload from storage, dropping the in-memory value
    pub fn refresh(&mut self) {
        self.current = read_or_none(&self.storage);
    }

    /// Forget the session. Safe to call repeatedly.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.current = None;

        // Attempt every key even if one fails
        let results = [
            self.storage.remove_item(STORAGE_KEY),
            self.storage.remove_item(ROLE_KEY),
            self.storage.remove_item(NAME_KEY),
        ];
        results.into_iter().collect()
    }

    /// End the provider session, then clear local state.
    ///
    /// Whether local state survives a provider failure depends on the
    /// configured [`SignOutPolicy`].
    pub async fn sign_out(&mut self) -> Result<(), SessionError> {
        match self.provider.sign_out().await {
            Ok(()) => {
                self.clear()?;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, policy = ?self.policy, "Provider sign-out failed");
                if self.policy == SignOutPolicy::ForceClear {
                    if let Err(clear_err) = self.clear() {
                        warn!(error = %clear_err, "Local session clear failed");
                    }
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeProvider {
        fail: bool,
        calls: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl SessionTerminator for FakeProvider {
        async fn sign_out(&self) -> Result<(), ProviderError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(ProviderError("network-request-failed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn failing() -> FakeProvider {
        FakeProvider {
            fail: true,
            ..Default::default()
        }
    }

    fn signed_in_storage() -> MemoryStorage {
        [
            (STORAGE_KEY, r#"{"id":"7","username":"ann","role":"admin"}"#),
            (ROLE_KEY, "admin"),
            (NAME_KEY, "ann"),
        ]
        .into_iter()
        .collect()
    }

    /// Memory storage that refuses writes to one key
    struct RejectingStorage {
        inner: MemoryStorage,
        reject: &'static str,
    }

    impl KeyValueStore for RejectingStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.reject {
                return Err(StorageError::Write {
                    key: key.to_string(),
                    reason: "QuotaExceededError".to_string(),
                });
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
    }

    fn assert_all_keys_absent(storage: &MemoryStorage) {
        for key in [STORAGE_KEY, ROLE_KEY, NAME_KEY] {
            assert!(!storage.contains_key(key), "{key} should be removed");
        }
    }

    #[test]
    fn test_reads_existing_session_on_init() {
        let store = SessionStore::new(signed_in_storage(), FakeProvider::default());
        assert_eq!(
            store.current(),
            Some(&SessionRecord::new("7", "ann", Some("admin")))
        );
        assert!(store.is_authenticated());
        assert!(store.is_admin());
        assert_eq!(store.username(), "ann");
    }

    #[test]
    fn test_corrupt_storage_reads_as_no_session() {
        for raw in ["{not json", "\"just a string\"", "42", "[1,2]"] {
            let storage: MemoryStorage = [(STORAGE_KEY, raw)].into_iter().collect();
            assert!(read_session(&storage).is_err(), "{raw} should not parse");

            let store = SessionStore::new(storage, FakeProvider::default());
            assert_eq!(store.current(), None);
            assert!(!store.is_authenticated());
        }
    }

    #[test]
    fn test_falsy_json_is_absence_not_error() {
        for raw in ["null", "false", "0", "\"\""] {
            let storage: MemoryStorage = [(STORAGE_KEY, raw)].into_iter().collect();
            assert_eq!(read_session(&storage), Ok(None));
        }
        assert_eq!(read_session(&MemoryStorage::new()), Ok(None));
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let storage: MemoryStorage = [(STORAGE_KEY, r#"{"id":12,"username":"bo"}"#)]
            .into_iter()
            .collect();
        let session = read_session(&storage).unwrap().unwrap();
        assert_eq!(session.id, "12");
        assert_eq!(session.role, None);
    }

    #[test]
    fn test_set_writes_all_keys() {
        let mut store = SessionStore::new(MemoryStorage::new(), FakeProvider::default());
        store
            .set(Some(SessionRecord::new("1", "ann", Some("admin"))))
            .unwrap();

        let storage = store.storage();
        assert_eq!(
            storage.get_item(STORAGE_KEY).unwrap().as_deref(),
            Some(r#"{"id":"1","username":"ann","role":"admin"}"#)
        );
        assert_eq!(storage.get_item(ROLE_KEY).unwrap().as_deref(), Some("admin"));
        assert_eq!(storage.get_item(NAME_KEY).unwrap().as_deref(), Some("ann"));
    }

    #[test]
    fn test_empty_role_removes_role_key() {
        let mut store = SessionStore::new(signed_in_storage(), FakeProvider::default());
        store
            .set(Some(SessionRecord::new("1", "ann", Some(""))))
            .unwrap();

        assert!(!store.storage().contains_key(ROLE_KEY));
        assert_eq!(
            store.storage().get_item(NAME_KEY).unwrap().as_deref(),
            Some("ann")
        );
        assert_eq!(store.role(), "");
        assert!(!store.is_admin());
    }

    #[test]
    fn test_empty_username_removes_name_key() {
        let mut store = SessionStore::new(signed_in_storage(), FakeProvider::default());
        store
            .set(Some(SessionRecord::new("1", "", Some("member"))))
            .unwrap();
        assert!(!store.storage().contains_key(NAME_KEY));
        assert_eq!(store.role(), "member");
    }

    #[test]
    fn test_failed_write_never_leaves_mixed_users() {
        for reject in [STORAGE_KEY, ROLE_KEY, NAME_KEY] {
            let storage = RejectingStorage {
                inner: signed_in_storage(),
                reject,
            };
            let mut store = SessionStore::new(storage, FakeProvider::default());
            assert!(store.is_admin());

            let err = store
                .set(Some(SessionRecord::new("8", "bob", Some("member"))))
                .unwrap_err();
            assert_eq!(
                err,
                StorageError::Write {
                    key: reject.to_string(),
                    reason: "QuotaExceededError".to_string(),
                }
            );

            assert_eq!(store.current(), None);
            assert!(!store.is_admin());
            assert_all_keys_absent(&store.storage().inner);
        }
    }

    #[test]
    fn test_set_none_equals_clear() {
        let mut a = SessionStore::new(signed_in_storage(), FakeProvider::default());
        let mut b = SessionStore::new(signed_in_storage(), FakeProvider::default());

        a.set(None).unwrap();
        b.clear().unwrap();

        assert_eq!(a.current(), b.current());
        assert_eq!(a.storage(), b.storage());
        assert_all_keys_absent(a.storage());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut store = SessionStore::new(signed_in_storage(), FakeProvider::default());
        store.clear().unwrap();
        let once = store.storage().clone();
        store.clear().unwrap();
        assert_eq!(store.storage(), &once);
        assert_eq!(store.current(), None);
    }

    #[test]
    fn test_set_from_json_projects_fields() {
        let mut store = SessionStore::new(MemoryStorage::new(), FakeProvider::default());
        store
            .set_from_json(&json!({
                "id": "9",
                "username": "cy",
                "role": "admin",
                "email": "cy@example.com",
                "token": "secret"
            }))
            .unwrap();

        let raw = store.storage().get_item(STORAGE_KEY).unwrap().unwrap();
        let stored: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, json!({ "id": "9", "username": "cy", "role": "admin" }));

        store.set_from_json(&Value::Null).unwrap();
        assert_all_keys_absent(store.storage());
    }

    #[test]
    fn test_refresh_discards_memory() {
        let mut store = SessionStore::new(MemoryStorage::new(), FakeProvider::default());
        store.set(Some(SessionRecord::new("1", "ann", None))).unwrap();

        // Another tab changed storage underneath us
        store.storage.set_item(STORAGE_KEY, "{broken").unwrap();
        store.refresh();
        assert_eq!(store.current(), None);

        store
            .storage
            .set_item(STORAGE_KEY, r#"{"id":"2","username":"bo"}"#)
            .unwrap();
        store.refresh();
        assert_eq!(store.username(), "bo");
    }

    #[test]
    fn test_view_defaults() {
        let view = SessionView::new(None);
        assert!(!view.is_authenticated());
        assert_eq!(view.username(), "");
        assert_eq!(view.role(), "");
        assert!(!view.is_admin());

        let record = SessionRecord::new("1", "ann", Some("Admin"));
        assert!(!SessionView::new(Some(&record)).is_admin());
    }

    #[tokio::test]
    async fn test_sign_out_clears_local_state() {
        let mut store = SessionStore::new(signed_in_storage(), FakeProvider::default());
        store.sign_out().await.unwrap();

        assert_eq!(store.provider.calls.get(), 1);
        assert_eq!(store.current(), None);
        assert_all_keys_absent(store.storage());
    }

    #[tokio::test]
    async fn test_sign_out_failure_keeps_local_state_by_default() {
        let mut store = SessionStore::new(signed_in_storage(), failing());
        assert_eq!(store.policy(), SignOutPolicy::KeepOnProviderError);

        let err = store.sign_out().await.unwrap_err();
        assert!(matches!(err, SessionError::SignOut(_)));
        assert!(store.is_authenticated());
        assert_eq!(store.storage(), &signed_in_storage());
    }

    #[tokio::test]
    async fn test_sign_out_failure_force_clear() {
        let mut store =
            SessionStore::new(signed_in_storage(), failing()).with_policy(SignOutPolicy::ForceClear);

        let err = store.sign_out().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::SignOut(ProviderError("network-request-failed".to_string()))
        );
        assert!(!store.is_authenticated());
        assert_all_keys_absent(store.storage());
    }
}
