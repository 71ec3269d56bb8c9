use axum::{Extension, Json, extract::State, http::StatusCode};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use buddy_db::models::convert_all;
use buddy_types::api::{SendPushRequest, SendPushResponse, UpsertPushSubscriptionRequest};
use buddy_types::messages;
use buddy_types::models::PushSubscription;

use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_call};

pub const HELP_REQUEST_TITLE: &str = "Pedido de ajuda 🚨";

/// Forwards notifications to the external delivery function, which owns the
/// web-push encryption. Without a configured URL every delivery is a no-op.
#[derive(Clone)]
pub struct PushNotifier {
    client: reqwest::Client,
    function_url: Option<String>,
}

impl PushNotifier {
    pub fn new(function_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            function_url,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.function_url.is_some()
    }

    /// Send one notification to each subscription. Returns how many were
    /// handed to the delivery function.
    pub async fn deliver(
        &self,
        subscriptions: &[PushSubscription],
        title: &str,
        body: &str,
    ) -> anyhow::Result<usize> {
        let Some(url) = self.function_url.as_deref() else {
            debug!("Push delivery not configured, skipping {} subscription(s)", subscriptions.len());
            return Ok(0);
        };
        if subscriptions.is_empty() {
            return Ok(0);
        }

        let targets: Vec<_> = subscriptions
            .iter()
            .map(|sub| {
                json!({
                    "endpoint": sub.endpoint,
                    "keys": { "p256dh": sub.p256dh, "auth": sub.auth },
                })
            })
            .collect();

        self.client
            .post(url)
            .json(&json!({ "subscriptions": targets, "title": title, "body": body }))
            .send()
            .await?
            .error_for_status()?;

        Ok(subscriptions.len())
    }
}

// -- Subscriptions --

/// POST /tables/push_subscriptions
pub async fn upsert_subscription(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpsertPushSubscriptionRequest>,
) -> ApiResult<StatusCode> {
    let endpoint = req.endpoint.trim().to_string();
    if !endpoint.starts_with("https://") || !is_base64_key(&req.p256dh) || !is_base64_key(&req.auth)
    {
        return Err(ApiError::Validation(messages::INVALID_SUBSCRIPTION));
    }

    let user_id = identity.id();
    db_call(&state, move |s| {
        s.db.upsert_push_subscription(
            &Uuid::new_v4().to_string(),
            &user_id,
            &endpoint,
            &req.p256dh,
            &req.auth,
        )?;
        Ok(())
    })
    .await?;

    debug!("{} ({}) registered a push subscription", identity.username, identity.user_id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, serde::Deserialize)]
pub struct DeleteSubscriptionQuery {
    pub endpoint: String,
}

/// DELETE /tables/push_subscriptions?endpoint=...
pub async fn delete_subscription(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    axum::extract::Query(query): axum::extract::Query<DeleteSubscriptionQuery>,
) -> ApiResult<StatusCode> {
    let user_id = identity.id();
    let removed = db_call(&state, move |s| {
        Ok(s.db.delete_push_subscription(&user_id, query.endpoint.trim())?)
    })
    .await?;

    if !removed {
        return Err(ApiError::NotFound(messages::SUBSCRIPTION_NOT_FOUND));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Browsers hand out the subscription keys in either base64 alphabet.
fn is_base64_key(raw: &str) -> bool {
    let raw = raw.trim();
    !raw.is_empty()
        && [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
            .iter()
            .any(|engine| engine.decode(raw).is_ok_and(|bytes| !bytes.is_empty()))
}

// -- Delivery --

/// POST /functions/send-push-notification
///
/// Callers may notify themselves or anyone they share a connection with.
pub async fn send_push_notification(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SendPushRequest>,
) -> ApiResult<Json<SendPushResponse>> {
    let caller = identity.id();
    let target = req.user_id.to_string();

    let subscriptions = db_call(&state, move |s| {
        let allowed = caller == target
            || s.db.is_connected(&caller, &target)?
            || s.db.is_connected(&target, &caller)?;
        if !allowed {
            return Err(ApiError::Forbidden(messages::NOT_CONNECTED));
        }

        let rows = s.db.push_subscriptions_for(&target)?;
        Ok(convert_all(rows, |row| row.into_push_subscription())?)
    })
    .await?;

    let delivered = state.push.deliver(&subscriptions, &req.title, &req.body).await?;
    info!(
        "{} sent a push notification to {} ({} delivered)",
        identity.username, req.user_id, delivered
    );

    Ok(Json(SendPushResponse { delivered }))
}

/// Notify every guardian of a student that a help request was opened. Runs in
/// the background; failures are only logged.
pub fn notify_guardians(state: &AppState, student_username: String, guardian_ids: Vec<String>) {
    if !state.push.is_enabled() || guardian_ids.is_empty() {
        return;
    }

    let state = state.clone();
    tokio::spawn(async move {
        let lookup = db_call(&state, move |s| {
            let mut subscriptions = Vec::new();
            for guardian_id in &guardian_ids {
                let rows = s.db.push_subscriptions_for(guardian_id)?;
                subscriptions.extend(convert_all(rows, |row| row.into_push_subscription())?);
            }
            Ok(subscriptions)
        })
        .await;

        let subscriptions = match lookup {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                warn!("Failed to load guardian push subscriptions: {}", e);
                return;
            }
        };

        let body = format!("{} precisa de ajuda!", student_username);
        match state.push.deliver(&subscriptions, HELP_REQUEST_TITLE, &body).await {
            Ok(count) => debug!("Help request push for {} delivered to {} device(s)", student_username, count),
            Err(e) => warn!("Help request push for {} failed: {}", student_username, e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_keys_in_either_alphabet() {
        assert!(is_base64_key("BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM"));
        assert!(is_base64_key("tBHItJI5svbpez7KI4CCXg=="));
        assert!(!is_base64_key(""));
        assert!(!is_base64_key("not base64 at all!"));
    }

    #[tokio::test]
    async fn disabled_notifier_delivers_nothing() {
        let notifier = PushNotifier::disabled();
        let sub = PushSubscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            endpoint: "https://push.example.com/abc".into(),
            p256dh: "key".into(),
            auth: "auth".into(),
            created_at: chrono::Utc::now(),
        };

        assert!(!notifier.is_enabled());
        assert_eq!(notifier.deliver(&[sub], "t", "b").await.unwrap(), 0);
    }
}
