//! Credential lifecycle: acquisition through the authorization redirect,
//! persistence, and sign-out.

use super::store::CredentialStore;
use crate::error::AuthCallbackError;

/// Where the operator is sent to authorize, and where the redirect comes back.
pub trait Location {
    /// Leave the application for `url`. Control does not come back to the caller's flow.
    fn navigate(&mut self, url: &str);
    /// Fragment of the current address (without the leading `#`), if any.
    fn fragment(&self) -> Option<String>;
    /// Remove the fragment from the visible address.
    fn clear_fragment(&mut self);
}

/// Location held entirely in memory. The CLI feeds it the pasted callback address.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    pub fragment: Option<String>,
    pub visited: Vec<String>,
}

impl MemoryLocation {
    pub fn with_fragment(fragment: &str) -> Self {
        Self {
            fragment: Some(fragment.to_string()),
            visited: Vec::new(),
        }
    }
}

impl Location for MemoryLocation {
    fn navigate(&mut self, url: &str) {
        self.visited.push(url.to_string());
    }

    fn fragment(&self) -> Option<String> {
        self.fragment.clone()
    }

    fn clear_fragment(&mut self) {
        self.fragment = None;
    }
}

/// Result of parsing an authorization callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A token was received and persisted.
    Stored,
    /// The provider reported an error.
    Rejected(AuthCallbackError),
    /// Neither `token` nor `error` was present.
    Ignored,
}

/// Owns the single process-wide credential.
pub struct CredentialManager<S: CredentialStore> {
    store: S,
    login_url: String,
    credential: Option<String>,
    acquisition_error: Option<AuthCallbackError>,
}

impl<S: CredentialStore> CredentialManager<S> {
    pub fn new(store: S, login_url: impl Into<String>) -> Self {
        Self {
            store,
            login_url: login_url.into(),
            credential: None,
            acquisition_error: None,
        }
    }

    /// Load a previously persisted credential. Storage failures leave the manager unauthenticated.
    pub fn initialize(&mut self) {
        self.credential = match self.store.read() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(store = self.store.label(), error = %format!("{e:#}"), "credential read failed");
                None
            }
        };
        tracing::debug!(authenticated = self.credential.is_some(), "credential store initialized");
    }

    /// Send the operator to the authorization endpoint.
    pub fn begin_acquisition(&self, location: &mut impl Location) {
        tracing::info!(url = %self.login_url, "starting authorization");
        location.navigate(&self.login_url);
    }

    /// Parse a `key=value&...` callback fragment (a leading `#` or full URL is accepted).
    pub fn complete_acquisition(&mut self, fragment: &str) -> CallbackOutcome {
        let params = parse_fragment(fragment);
        let lookup = |key: &str| {
            params
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.clone())
        };

        if let Some(token) = lookup("token") {
            self.set_credential(&token);
            return CallbackOutcome::Stored;
        }
        if let Some(raw) = lookup("error") {
            let err = AuthCallbackError(percent_decode(&raw));
            tracing::warn!(error = %err, "authorization callback rejected");
            self.acquisition_error = Some(err.clone());
            return CallbackOutcome::Rejected(err);
        }
        CallbackOutcome::Ignored
    }

    /// Consume the fragment from `location`, if any, and strip it so it is parsed only once.
    pub fn complete_from_location(
        &mut self,
        location: &mut impl Location,
    ) -> Option<CallbackOutcome> {
        let fragment = location.fragment().filter(|f| !f.trim().is_empty())?;
        let outcome = self.complete_acquisition(&fragment);
        location.clear_fragment();
        Some(outcome)
    }

    /// Adopt a caller-supplied credential, persisting it and clearing any acquisition error.
    pub fn set_credential(&mut self, credential: &str) {
        if let Err(e) = self.store.write(credential) {
            tracing::warn!(store = self.store.label(), error = %format!("{e:#}"), "credential write failed");
        }
        self.credential = Some(credential.to_string());
        self.acquisition_error = None;
    }

    /// Forget the credential everywhere. Safe to call repeatedly.
    pub fn sign_out(&mut self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(store = self.store.label(), error = %format!("{e:#}"), "credential clear failed");
        }
        self.credential = None;
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn acquisition_error(&self) -> Option<&AuthCallbackError> {
        self.acquisition_error.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

/// Split a callback fragment into raw `(key, value)` pairs.
pub fn parse_fragment(fragment: &str) -> Vec<(String, String)> {
    let fragment = match fragment.split_once('#') {
        Some((_, after)) => after,
        None => fragment,
    };
    fragment
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

fn percent_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(s) => s.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryStore;
    use std::sync::Arc;

    const LOGIN: &str = "http://localhost:8000/auth/login";

    #[test]
    fn initialize_reads_persisted_credential() {
        let mut mgr = CredentialManager::new(MemoryStore::with_credential("gho_old"), LOGIN);
        assert!(!mgr.is_authenticated());
        mgr.initialize();
        assert_eq!(mgr.credential(), Some("gho_old"));
    }

    #[test]
    fn storage_failure_degrades_to_unauthenticated() {
        let mut mgr = CredentialManager::new(MemoryStore::unavailable(), LOGIN);
        mgr.initialize();
        assert!(!mgr.is_authenticated());

        // Writes that fail still update the in-memory credential.
        mgr.set_credential("gho_x");
        assert_eq!(mgr.credential(), Some("gho_x"));
        mgr.sign_out();
        assert!(!mgr.is_authenticated());
    }

    #[test]
    fn token_callback_stores_credential_and_clears_error() {
        let store = Arc::new(MemoryStore::new());
        let mut mgr = CredentialManager::new(store.clone(), LOGIN);
        mgr.complete_acquisition("error=access_denied");
        assert!(mgr.acquisition_error().is_some());

        let mut location = MemoryLocation::with_fragment("token=abc123");
        let outcome = mgr.complete_from_location(&mut location);
        assert_eq!(outcome, Some(CallbackOutcome::Stored));
        assert_eq!(mgr.credential(), Some("abc123"));
        assert_eq!(store.read().unwrap().as_deref(), Some("abc123"));
        assert!(mgr.acquisition_error().is_none());
        assert_eq!(location.fragment, None);

        // A reload sees no fragment and changes nothing.
        assert_eq!(mgr.complete_from_location(&mut location), None);
    }

    #[test]
    fn error_callback_sets_message_and_stores_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut mgr = CredentialManager::new(store.clone(), LOGIN);
        let mut location = MemoryLocation::with_fragment("error=access_denied");
        let outcome = mgr.complete_from_location(&mut location);
        assert_eq!(
            outcome,
            Some(CallbackOutcome::Rejected(AuthCallbackError("access_denied".into())))
        );
        assert_eq!(mgr.acquisition_error().map(|e| e.0.as_str()), Some("access_denied"));
        assert!(!mgr.is_authenticated());
        assert_eq!(store.read().unwrap(), None);
        assert_eq!(location.fragment, None);
    }

    #[test]
    fn token_wins_over_error_in_the_same_fragment() {
        let store = Arc::new(MemoryStore::new());
        let mut mgr = CredentialManager::new(store.clone(), LOGIN);
        assert_eq!(mgr.complete_acquisition("error=a&token=t"), CallbackOutcome::Stored);
        assert_eq!(mgr.credential(), Some("t"));
        assert_eq!(store.read().unwrap().as_deref(), Some("t"));
        assert!(mgr.acquisition_error().is_none());
    }

    #[test]
    fn error_value_is_percent_decoded() {
        let mut mgr = CredentialManager::new(MemoryStore::new(), LOGIN);
        mgr.complete_acquisition("#error=OAuth+not+configured");
        assert_eq!(mgr.acquisition_error().unwrap().0, "OAuth not configured");
        mgr.complete_acquisition("error=bad%20verification%20code");
        assert_eq!(mgr.acquisition_error().unwrap().0, "bad verification code");
    }

    #[test]
    fn fragment_without_known_keys_is_ignored() {
        let mut mgr = CredentialManager::new(MemoryStore::new(), LOGIN);
        assert_eq!(mgr.complete_acquisition("state=xyz&foo"), CallbackOutcome::Ignored);
        assert!(!mgr.is_authenticated());
        assert!(mgr.acquisition_error().is_none());
    }

    #[test]
    fn full_callback_url_is_accepted() {
        let mut mgr = CredentialManager::new(MemoryStore::new(), LOGIN);
        let outcome = mgr.complete_acquisition("http://localhost:5173/#token=gho_9&x=1");
        assert_eq!(outcome, CallbackOutcome::Stored);
        assert_eq!(mgr.credential(), Some("gho_9"));
    }

    #[test]
    fn begin_acquisition_navigates_to_login() {
        let mgr = CredentialManager::new(MemoryStore::new(), LOGIN);
        let mut location = MemoryLocation::default();
        mgr.begin_acquisition(&mut location);
        assert_eq!(location.visited, vec![LOGIN.to_string()]);
    }

    #[test]
    fn sign_out_is_idempotent() {
        let store = Arc::new(MemoryStore::with_credential("gho_a"));
        let mut mgr = CredentialManager::new(store.clone(), LOGIN);
        mgr.initialize();
        mgr.sign_out();
        mgr.sign_out();
        assert!(!mgr.is_authenticated());
        assert_eq!(store.read().unwrap(), None);
    }
}
