use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    agent::{AgentError, AgentService},
    models::InboundMessage,
};

/// Reply sent to the citizen whenever the agent service cannot answer.
pub const APOLOGY_TEXT: &str =
    "Sorry, we are having trouble processing your message right now. Please try again in a few minutes.";

/// ReplyOutcome
///
/// What the agent call produced. The webhook always answers Twilio with
/// `reply_text()`; the `Fallback` arm keeps the underlying error around so it can be
/// reported separately.
#[derive(Debug)]
pub enum ReplyOutcome {
    Delivered(String),
    Fallback(AgentError),
}

impl ReplyOutcome {
    pub fn reply_text(&self) -> &str {
        match self {
            ReplyOutcome::Delivered(reply) => reply,
            ReplyOutcome::Fallback(_) => APOLOGY_TEXT,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ReplyOutcome::Fallback(_))
    }

    pub fn into_reply(self) -> String {
        match self {
            ReplyOutcome::Delivered(reply) => reply,
            ReplyOutcome::Fallback(_) => APOLOGY_TEXT.to_string(),
        }
    }
}

/// process_message
///
/// The single processing path shared by the webhook and the test endpoint. Agent
/// failures are logged at error level here and never propagate.
pub async fn process_message(agent: &dyn AgentService, message: &InboundMessage) -> ReplyOutcome {
    tracing::info!(
        message_sid = message.message_sid().unwrap_or("-"),
        phone = message.phone().unwrap_or("-"),
        kind = ?message.kind(),
        num_media = message.num_media(),
        "Inbound WhatsApp message"
    );

    match agent.generate_reply(message).await {
        Ok(reply) => {
            tracing::debug!(
                message_sid = message.message_sid().unwrap_or("-"),
                reply_len = reply.len(),
                "Agent reply generated"
            );
            ReplyOutcome::Delivered(reply)
        }
        Err(e) => {
            tracing::error!(
                message_sid = message.message_sid().unwrap_or("-"),
                phone = message.phone().unwrap_or("-"),
                error = %e,
                "Agent service failed; answering with apology"
            );
            ReplyOutcome::Fallback(e)
        }
    }
}

// --- TwiML Envelope ---

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// render_twiml
///
/// Builds the `<Response>` envelope Twilio expects. A reply that is blank once
/// unusable characters are dropped yields an empty `<Response/>`, which tells Twilio
/// not to send anything back.
pub fn render_twiml(reply: &str) -> String {
    let escaped = escape_xml(reply);
    if escaped.trim().is_empty() {
        return format!("{XML_DECLARATION}<Response/>");
    }
    format!("{XML_DECLARATION}<Response><Message>{escaped}</Message></Response>")
}

/// Characters allowed in XML 1.0 text (`Char` production). `char` already excludes
/// surrogates.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// escape_xml
///
/// Escapes markup characters and drops characters XML 1.0 cannot carry at all, such
/// as NUL or terminal escape codes.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars().filter(|c| is_xml_char(*c)) {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Twiml
///
/// Response wrapper: always `200 OK` with an `application/xml` body.
#[derive(Debug, Clone)]
pub struct Twiml(pub String);

impl Twiml {
    pub fn message(reply: &str) -> Self {
        Twiml(render_twiml(reply))
    }
}

impl IntoResponse for Twiml {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/xml")],
            self.0,
        )
            .into_response()
    }
}
