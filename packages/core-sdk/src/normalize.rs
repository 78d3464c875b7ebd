use tracing::warn;

use crate::models::Message;
use crate::providers::{ProviderKind, OPENAI};

/**
 * \brief Rewrites message roles into the vocabulary of the target provider.
 * \param messages conversation, oldest first; left untouched
 * \param provider target provider tag (case-insensitive)
 * \return a new message list; unknown providers get an unchanged copy
 */
pub fn normalize_messages_for_provider(messages: &[Message], provider: &str) -> Vec<Message> {
    match ProviderKind::parse(provider) {
        Some(ProviderKind::OpenAI) => normalize_for_openai(messages),
        Some(ProviderKind::Gemini) => normalize_for_gemini(messages),
        None => {
            warn!(provider, "unknown provider, returning messages without normalization");
            messages.to_vec()
        }
    }
}

fn normalize_for_openai(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|msg| {
            if OPENAI.supports_role(&msg.role) {
                msg.clone()
            } else {
                warn!(role = %msg.role, "custom role converted to 'user' for openai");
                prefixed_user_message(msg)
            }
        })
        .collect()
}

/// Gemini has no system role: system text is folded into the adjacent user turn,
/// the previous one when it is a user turn, otherwise the next one.
fn normalize_for_gemini(messages: &[Message]) -> Vec<Message> {
    let mut normalized: Vec<Message> = Vec::with_capacity(messages.len());
    let mut pending: Vec<&str> = Vec::new();

    for msg in messages {
        let mut next = match msg.role.as_str() {
            "system" => {
                match normalized.last_mut() {
                    Some(last) if last.role == "user" => {
                        prepend_system(&mut last.content, &msg.content)
                    }
                    _ => pending.push(&msg.content),
                }
                continue;
            }
            "assistant" | "model" => Message::new("model", msg.content.as_str()),
            "user" => msg.clone(),
            _ => {
                warn!(role = %msg.role, "custom role converted to 'user' for gemini");
                prefixed_user_message(msg)
            }
        };

        if next.role == "user" {
            for system in pending.drain(..) {
                prepend_system(&mut next.content, system);
            }
        } else {
            flush_pending(&mut pending, &mut normalized);
        }
        normalized.push(next);
    }
    flush_pending(&mut pending, &mut normalized);

    normalized
}

fn prepend_system(content: &mut String, system: &str) {
    *content = format!("System: {}\n\n{}", system, content);
}

/// Emits system text that found no user turn as a single user message.
fn flush_pending(pending: &mut Vec<&str>, normalized: &mut Vec<Message>) {
    let mut systems = pending.drain(..);
    if let Some(first) = systems.next() {
        let mut content = format!("System: {}", first);
        for system in systems {
            prepend_system(&mut content, system);
        }
        normalized.push(Message::new("user", content));
    }
}

fn prefixed_user_message(msg: &Message) -> Message {
    Message::new("user", format!("[{}]: {}", title_case(&msg.role), msg.content))
}

/**
 * \brief Upper-cases the first letter of every alphabetic run, lower-cases the rest.
 */
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}
