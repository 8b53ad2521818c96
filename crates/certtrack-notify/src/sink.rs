use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use certtrack_core::clock::Clock;
use certtrack_store::types::NewNotification;
use certtrack_store::Store;

use crate::content::ProviderRegistry;
use crate::error::Result;
use crate::types::NotificationRequest;

/// Where the engine hands off notification-creation requests.
///
/// Fire-and-forget: the engine never awaits delivery confirmation, only the
/// persistence of the request itself.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Create one notification fanning out to all recipients in the request.
    /// Returns the created notification id, or `None` when the request was
    /// dropped (e.g. no provider registered for its code).
    async fn create_notification(&self, request: NotificationRequest) -> Result<Option<String>>;
}

/// Store-backed sink: resolves the content provider for the request's code,
/// builds the metadata payload, and persists the notification plus one
/// PENDING recipient row per id in a single transaction. The external
/// dispatcher picks the rows up from there.
pub struct StoreSink {
    store: Arc<Store>,
    registry: ProviderRegistry,
    clock: Arc<dyn Clock>,
}

impl StoreSink {
    pub fn new(store: Arc<Store>, registry: ProviderRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }
}

#[async_trait]
impl NotificationSink for StoreSink {
    async fn create_notification(&self, request: NotificationRequest) -> Result<Option<String>> {
        let Some(provider) = self.registry.get(&request.code) else {
            return Ok(None);
        };

        let now = self.clock.now_utc();
        let mut metadata = provider.build_metadata(&self.store, &request.entity_id, now)?;
        if let (Some(base), Some(extra)) = (metadata.as_object_mut(), &request.metadata) {
            if let Some(extra) = extra.as_object() {
                for (key, value) in extra {
                    base.insert(key.clone(), value.clone());
                }
            }
        }

        let id = self.store.insert_notification(
            &NewNotification {
                code: request.code.clone(),
                entity_id: request.entity_id.clone(),
                actor_type: request.actor_type,
                actor_id: request.actor_id.clone(),
                metadata: Some(metadata),
                expires_at: request.expires_at,
                recipient_ids: request.recipient_ids.clone(),
            },
            now,
        )?;

        debug!(
            notification_id = %id,
            code = %request.code,
            entity_id = %request.entity_id,
            recipients = request.recipient_ids.len(),
            "notification created"
        );
        Ok(Some(id))
    }
}
