//! Session token storage and the route guard that reads it.

use std::sync::RwLock;

/// Where the login token lives. Presence of a token is the only sign of being
/// signed in; clearing it signs out.
pub trait SessionProvider: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: String);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemorySession {
    token: RwLock<Option<String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        MemorySession {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl SessionProvider for MemorySession {
    fn get(&self) -> Option<String> {
        match self.token.read() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set(&self, token: String) {
        match self.token.write() {
            Ok(mut slot) => *slot = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
    }

    fn clear(&self) {
        match self.token.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

pub struct RouteGuard;

impl RouteGuard {
    /// Dashboard routes are reachable only with a non-empty token.
    pub fn allows(session: &dyn SessionProvider) -> bool {
        session.get().is_some_and(|token| !token.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_follows_token_presence() {
        let session = MemorySession::new();
        assert!(!RouteGuard::allows(&session));

        session.set("abc.def".into());
        assert!(RouteGuard::allows(&session));

        session.clear();
        assert!(!RouteGuard::allows(&session));

        assert!(!RouteGuard::allows(&MemorySession::with_token("  ")));
    }
}
