// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant resolution and webhook authentication.

use std::sync::Arc;

use handoff_core::error::HandoffError;
use handoff_core::traits::channel::ChannelAdapter;
use handoff_core::traits::storage::StorageAdapter;
use handoff_core::types::{ChannelCredential, ChannelKind, Tenant, WebhookRequest};
use tracing::warn;

/// A tenant together with its credential for the channel the webhook arrived on.
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub tenant: Tenant,
    pub credential: ChannelCredential,
}

impl ResolvedTenant {
    /// The configured webhook secret, if verification is enabled.
    ///
    /// An empty string is treated the same as no secret.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.credential
            .webhook_secret
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone)]
pub struct TenantResolver {
    storage: Arc<dyn StorageAdapter>,
}

impl TenantResolver {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Looks up the tenant and its credential for `channel`.
    ///
    /// A missing tenant and a tenant without that channel are both
    /// [`HandoffError::TenantNotConfigured`].
    pub async fn resolve(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
    ) -> Result<ResolvedTenant, HandoffError> {
        let not_configured = || HandoffError::TenantNotConfigured {
            tenant_id: tenant_id.to_string(),
            channel: channel.to_string(),
        };

        let tenant = self
            .storage
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(not_configured)?;
        let credential = self
            .storage
            .get_channel_credential(tenant_id, channel)
            .await?
            .ok_or_else(not_configured)?;

        Ok(ResolvedTenant { tenant, credential })
    }

    /// Verifies the request with the channel's scheme and the tenant's secret.
    pub fn authenticate(
        &self,
        adapter: &dyn ChannelAdapter,
        resolved: &ResolvedTenant,
        request: &WebhookRequest,
    ) -> Result<(), HandoffError> {
        adapter
            .authenticate(request, resolved.webhook_secret())
            .inspect_err(|e| {
                warn!(
                    tenant_id = %resolved.tenant.id,
                    channel = %adapter.kind(),
                    error = %e,
                    "webhook rejected"
                );
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{credential, open_storage, tenant};

    #[tokio::test]
    async fn resolves_tenant_with_channel_credential() {
        let (storage, _dir) = open_storage().await;
        storage.upsert_tenant(&tenant("t1")).await.unwrap();
        storage
            .upsert_channel_credential(&credential("t1", ChannelKind::Telegram, Some("s3cret")))
            .await
            .unwrap();

        let resolver = TenantResolver::new(storage);
        let resolved = resolver.resolve("t1", ChannelKind::Telegram).await.unwrap();
        assert_eq!(resolved.tenant.id, "t1");
        assert_eq!(resolved.webhook_secret(), Some("s3cret"));
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_configured() {
        let (storage, _dir) = open_storage().await;
        let resolver = TenantResolver::new(storage);
        let err = resolver
            .resolve("ghost", ChannelKind::Telegram)
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::TenantNotConfigured { .. }));
        assert!(err.is_request_rejection());
    }

    #[tokio::test]
    async fn tenant_without_the_channel_is_not_configured() {
        let (storage, _dir) = open_storage().await;
        storage.upsert_tenant(&tenant("t1")).await.unwrap();
        storage
            .upsert_channel_credential(&credential("t1", ChannelKind::Telegram, None))
            .await
            .unwrap();

        let resolver = TenantResolver::new(storage);
        let err = resolver
            .resolve("t1", ChannelKind::Whatsapp)
            .await
            .unwrap_err();
        match err {
            HandoffError::TenantNotConfigured { tenant_id, channel } => {
                assert_eq!(tenant_id, "t1");
                assert_eq!(channel, "whatsapp");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_secret_disables_verification() {
        let resolved = ResolvedTenant {
            tenant: tenant("t1"),
            credential: credential("t1", ChannelKind::Telegram, Some("")),
        };
        assert_eq!(resolved.webhook_secret(), None);
    }
}
