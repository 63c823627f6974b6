/// Session collaborator for caller identity
///
/// The workflow engine never infers who is calling from ambient context; an
/// explicit `SessionProvider` supplies the identity (or its absence). The
/// HTTP layer builds one per request from headers; embedders and the agent
/// tool host can hand in a fixed identity.

use axum::http::HeaderMap;

/// Identity of the current caller, as supplied by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    /// Display name, denormalized onto workflows the user creates
    pub name: Option<String>,
    /// Avatar URL, denormalized onto workflows the user creates
    pub avatar: Option<String>,
}

/// Source of the current caller's identity
///
/// `None` means unauthenticated and is surfaced as such — callers are never
/// silently defaulted to some anonymous user.
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<SessionUser>;
}

/// Header-based session for the HTTP surface
///
/// Trusts the `x-user-id` / `x-user-name` / `x-user-avatar` headers as set
/// by the authenticating reverse proxy in front of this service.
#[derive(Debug, Clone)]
pub struct HeaderSession {
    user: Option<SessionUser>,
}

impl HeaderSession {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .filter(|v| !v.is_empty())
        };
        let user = header("x-user-id").map(|id| SessionUser {
            id,
            name: header("x-user-name"),
            avatar: header("x-user-avatar"),
        });
        Self { user }
    }
}

impl SessionProvider for HeaderSession {
    fn current_user(&self) -> Option<SessionUser> {
        self.user.clone()
    }
}

/// Fixed-identity session for embedding the tool adapter outside HTTP
/// (agent hosts, tests)
#[derive(Debug, Clone)]
pub struct StaticSession {
    user: Option<SessionUser>,
}

impl StaticSession {
    pub fn user(id: &str) -> Self {
        Self {
            user: Some(SessionUser {
                id: id.to_string(),
                name: None,
                avatar: None,
            }),
        }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<SessionUser> {
        self.user.clone()
    }
}
