//! Outcome of authenticating a request.

use custos_core::models::identity::Identity;

/// Either a resolved identity or nobody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Authenticated(Identity),
    Anonymous,
}

impl Principal {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Principal::Authenticated(identity) => Some(identity),
            Principal::Anonymous => None,
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            Principal::Authenticated(identity) => Some(identity),
            Principal::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}

impl From<Identity> for Principal {
    fn from(identity: Identity) -> Self {
        Principal::Authenticated(identity)
    }
}
