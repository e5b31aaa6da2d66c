//! Lookup of the focused customer's full record.

use async_trait::async_trait;
use scopeweb_core::{CustomerScope, ProfileIdentity};

/// Fetches the customer scope for a persisted profile identity.
///
/// The customer scope is never stored in the session; handlers that need it
/// fetch it per request through this seam.
#[async_trait]
pub trait CustomerSource: Send + Sync {
    /// # Errors
    ///
    /// Any backend failure. The request is aborted with a generic error.
    async fn load_customer(&self, identity: &ProfileIdentity) -> anyhow::Result<CustomerScope>;
}
