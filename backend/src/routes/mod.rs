/// Router Module Index
///
/// Splits the application's routes by who may call them. Access control is applied
/// per module (via Axum layers in `create_router`), so a route cannot end up
/// unprotected just by being registered in the wrong place.

/// Routes open to anyone. Session-aware handlers resolve the caller through the
/// `CurrentSession` extractor and redirect when the guard says no.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a valid bearer token (or the local `x-user-id` bypass).
pub mod authenticated;

/// Twilio-facing WhatsApp ingress, nested under `/api/whatsapp`.
/// Never answers with an error status.
pub mod whatsapp;
