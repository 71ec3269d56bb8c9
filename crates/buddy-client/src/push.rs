use tracing::{info, warn};
use uuid::Uuid;

use buddy_types::api::{SendPushRequest, SendPushResponse, UpsertPushSubscriptionRequest};

use crate::auth::BuddyClient;
use crate::error::ClientError;

impl BuddyClient {
    /// Register this device's push subscription. Re-registering the same
    /// endpoint refreshes its keys.
    pub async fn subscribe_push(
        &self,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<(), ClientError> {
        let token = self.token().ok_or(ClientError::NotLoggedIn)?;
        let body = UpsertPushSubscriptionRequest {
            endpoint: endpoint.to_string(),
            p256dh: p256dh.to_string(),
            auth: auth.to_string(),
        };

        self.backend()
            .post_empty("/tables/push_subscriptions", &token, &body)
            .await?;
        info!("Push notifications enabled");
        Ok(())
    }

    pub async fn unsubscribe_push(&self, endpoint: &str) -> Result<(), ClientError> {
        let token = self.token().ok_or(ClientError::NotLoggedIn)?;
        self.backend()
            .delete(
                "/tables/push_subscriptions",
                &token,
                &[("endpoint", endpoint.to_string())],
            )
            .await?;
        Ok(())
    }

    /// Ask the delivery function to notify `user_id`. Returns how many
    /// devices the notification was handed to.
    pub async fn send_notification(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
    ) -> Result<usize, ClientError> {
        let token = self.token().ok_or(ClientError::NotLoggedIn)?;
        let request = SendPushRequest {
            user_id,
            title: title.to_string(),
            body: body.to_string(),
        };

        let response: SendPushResponse = self
            .backend()
            .post("/functions/send-push-notification", &token, &request)
            .await
            .inspect_err(|e| warn!("Push notification to {} failed: {}", user_id, e))?;
        Ok(response.delivered)
    }
}
