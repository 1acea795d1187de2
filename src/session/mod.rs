// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle: token storage, profile query, auth facade, registry.

pub mod facade;
pub mod query;
pub mod registry;
pub mod token_store;

pub use facade::{AuthSession, LoginError, SessionView};
pub use query::{Fetch, QueryPolicy, QuerySnapshot, QueryStatus, SessionQuery};
pub use registry::{SessionRegistry, TokenStorage, SESSION_COOKIE};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
