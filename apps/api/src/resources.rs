//! Starter resource provisioning.
//!
//! Local registrations get their first resume synchronously; federated
//! principals get it lazily on the first authenticated read. In between, a
//! principal with zero resumes is a valid state every caller must tolerate.

use tracing::info;
use uuid::Uuid;

use crate::store::{IdentityStore, StoreResult};

pub const DEFAULT_RESUME_TITLE: &str = "My CV";

/// Creates the starter resume unconditionally.
pub async fn issue_default_resume(
    store: &dyn IdentityStore,
    principal_id: Uuid,
) -> StoreResult<Uuid> {
    store.create_resume(principal_id, DEFAULT_RESUME_TITLE).await
}

/// Lazy path: provisions the starter resume only when the principal has none
/// yet. Returns whether one was created.
pub async fn ensure_default_resume(
    store: &dyn IdentityStore,
    principal_id: Uuid,
) -> StoreResult<bool> {
    if store.has_any_resume(principal_id).await? {
        return Ok(false);
    }
    issue_default_resume(store, principal_id).await?;
    info!(%principal_id, "Provisioned starter resume on first read");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        assert!(ensure_default_resume(&store, id).await.unwrap());
        assert!(!ensure_default_resume(&store, id).await.unwrap());
        assert!(store.has_any_resume(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_skips_when_issued_synchronously() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        issue_default_resume(&store, id).await.unwrap();
        assert!(!ensure_default_resume(&store, id).await.unwrap());
    }
}
