//! Who is signed in.

/// Supplies the id of the signed-in user, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_owner(&self) -> Option<String>;
}

/// A fixed identity, typically read from settings or `DOSSIER_OWNER`.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    owner: Option<String>,
}

impl StaticIdentity {
    /// Signed in as `owner`. A blank owner counts as signed out.
    pub fn new(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        let owner = owner.trim();
        Self {
            owner: (!owner.is_empty()).then(|| owner.to_string()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_owner(&self) -> Option<String> {
        self.owner.clone()
    }
}
