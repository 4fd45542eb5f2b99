use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// WhatsApp Router Module
///
/// Twilio calls these endpoints directly. Twilio retries and raises alerts on any
/// non-2xx answer, so every handler here replies 200 even when processing failed;
/// failures are reported through the logs instead.
pub fn whatsapp_routes() -> Router<AppState> {
    Router::new()
        // POST /api/whatsapp/webhook
        // Inbound message. Replies with a TwiML envelope (agent reply or apology).
        .route("/webhook", post(handlers::receive_webhook))
        // POST /api/whatsapp/status
        // Delivery status callback. Logged, answered with "OK".
        .route("/status", post(handlers::status_callback))
        // GET /api/whatsapp/health
        .route("/health", get(handlers::whatsapp_health))
        // POST /api/whatsapp/test
        // JSON entry point running the same processing path as the webhook.
        .route("/test", post(handlers::test_message))
}
