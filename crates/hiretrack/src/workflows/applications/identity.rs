use std::collections::HashMap;

use serde::Serialize;

use super::domain::{Actor, Role, UserId};

/// Authenticated caller as asserted by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    /// Actor recorded in the audit trail for work this caller triggers.
    pub fn actor(&self) -> Actor {
        Actor {
            role: self.role,
            user_id: Some(self.user_id),
        }
    }
}

/// Boundary to the identity and session service. Claims are trusted as returned.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Caller, AuthError>;
    fn user_exists(&self, user_id: UserId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
}

/// Fixed token table, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    tokens: HashMap<String, Caller>,
}

impl StaticTokenIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, caller: Caller) -> Self {
        self.tokens.insert(token.into(), caller);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromIterator<(String, Caller)> for StaticTokenIdentity {
    fn from_iter<T: IntoIterator<Item = (String, Caller)>>(iter: T) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl IdentityProvider for StaticTokenIdentity {
    fn authenticate(&self, token: &str) -> Result<Caller, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.tokens.get(token).copied().ok_or(AuthError::InvalidToken)
    }

    fn user_exists(&self, user_id: UserId) -> bool {
        self.tokens.values().any(|caller| caller.user_id == user_id)
    }
}
