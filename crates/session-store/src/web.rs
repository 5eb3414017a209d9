//! JavaScript bindings for the browser build
//!
//! Exposes the session store backed by `localStorage`, with sign-out
//! delegated to a JS callback that returns a Promise (e.g. the auth SDK's
//! `signOut(auth)`).

use async_trait::async_trait;
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::comments::stats_for;
use crate::error::ProviderError;
use crate::session::{SessionStore, SessionTerminator, SignOutPolicy};
use crate::storage::LocalStorage;

/// Calls a JS sign-out function and awaits its Promise
pub struct JsSignOut {
    callback: Function,
}

#[async_trait(?Send)]
impl SessionTerminator for JsSignOut {
    async fn sign_out(&self) -> Result<(), ProviderError> {
        let returned = self
            .callback
            .call0(&JsValue::NULL)
            .map_err(|e| ProviderError(describe(&e)))?;
        let promise = Promise::resolve(&returned);
        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| ProviderError(describe(&e)))
    }
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Browser session store
#[wasm_bindgen]
pub struct WebSessionStore {
    inner: SessionStore<LocalStorage, JsSignOut>,
}

#[wasm_bindgen]
impl WebSessionStore {
    /// Open over `window.localStorage`; `force_clear` selects the sign-out policy
    #[wasm_bindgen(constructor)]
    pub fn new(sign_out: Function, force_clear: bool) -> Result<WebSessionStore, JsValue> {
        let storage = LocalStorage::open().map_err(to_js)?;
        let policy = if force_clear {
            SignOutPolicy::ForceClear
        } else {
            SignOutPolicy::KeepOnProviderError
        };
        Ok(Self {
            inner: SessionStore::new(storage, JsSignOut { callback: sign_out }).with_policy(policy),
        })
    }

    /// Current session as JSON, or `None`
    #[wasm_bindgen]
    pub fn current_json(&self) -> Option<String> {
        self.inner
            .current()
            .and_then(|s| serde_json::to_string(s).ok())
    }

    /// Store a session given as JSON; falsy JSON clears
    #[wasm_bindgen]
    pub fn set_json(&mut self, session_json: &str) -> Result<(), JsValue> {
        let value: serde_json::Value = serde_json::from_str(session_json).map_err(to_js)?;
        self.inner.set_from_json(&value).map_err(to_js)
    }

    #[wasm_bindgen]
    pub fn refresh(&mut self) {
        self.inner.refresh();
    }

    #[wasm_bindgen]
    pub fn clear(&mut self) -> Result<(), JsValue> {
        self.inner.clear().map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn sign_out(&mut self) -> Result<(), JsValue> {
        self.inner.sign_out().await.map_err(to_js)
    }

    #[wasm_bindgen(getter)]
    pub fn is_authenticated(&self) -> bool {
        self.inner.is_authenticated()
    }

    #[wasm_bindgen(getter)]
    pub fn is_admin(&self) -> bool {
        self.inner.is_admin()
    }

    #[wasm_bindgen(getter)]
    pub fn username(&self) -> String {
        self.inner.username().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn role(&self) -> String {
        self.inner.role().to_string()
    }
}

/// Rating stats for a recipe as `{"average":..,"count":..}` JSON
#[wasm_bindgen]
pub fn recipe_stats_json(recipe_id: &str) -> Result<String, JsValue> {
    let storage = LocalStorage::open().map_err(to_js)?;
    serde_json::to_string(&stats_for(&storage, recipe_id)).map_err(to_js)
}
