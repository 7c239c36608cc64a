use std::sync::Arc;

use codeweb_mongodb::Store;

use crate::auth::TokenIssuer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(store: Store, tokens: TokenIssuer) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
        }
    }
}
