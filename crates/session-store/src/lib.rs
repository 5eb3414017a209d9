//! Client-side session cache and recipe rating stats
//!
//! Everything here runs against a [`KeyValueStore`]: `localStorage` in the
//! browser (`web` feature on wasm32), [`MemoryStorage`] elsewhere.
//!
//! ## Modules
//! - [`session`]: the signed-in user, mirrored to `currentUser`,
//!   `app:role` and `app:username`, with provider sign-out
//! - [`comments`]: read-only rating aggregation over `comments`
//! - [`storage`]: the storage seam and its implementations

pub mod comments;
pub mod error;
pub mod session;
pub mod storage;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub mod web;

pub use comments::{
    load_comments, recipe_stats, stats_for, try_load_comments, CommentRecord, RecipeStats,
    COMMENTS_KEY,
};
pub use error::{ParseError, ProviderError, SessionError, StorageError};
pub use session::{
    read_session, SessionRecord, SessionStore, SessionTerminator, SessionView, SignOutPolicy,
    ADMIN_ROLE, NAME_KEY, ROLE_KEY, STORAGE_KEY,
};
pub use storage::{KeyValueStore, MemoryStorage};

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use storage::LocalStorage;
