//! Disconnect and chat texts
//!
//! Loaded from a `key: value` file. Lines starting with `//` or `#` are
//! comments, unknown keys are ignored and missing keys keep their default.

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    VerificationSuccess,
    VerificationFailed,
    InvalidUsername,
    CurrentlyPreparing,
    AlreadyVerifying,
    AlreadyQueued,
    Blacklisted,
    ProtocolBlacklisted,
    UnsupportedVersion,
    ReconnectedTooFast,
    TooManyOnlinePerAddress,
    TooManyVerifying,
    QueueFull,
    Welcome,
    EnterCode,
    IncorrectCaptcha,
}

impl MessageKey {
    pub const ALL: [MessageKey; 16] = [
        MessageKey::VerificationSuccess,
        MessageKey::VerificationFailed,
        MessageKey::InvalidUsername,
        MessageKey::CurrentlyPreparing,
        MessageKey::AlreadyVerifying,
        MessageKey::AlreadyQueued,
        MessageKey::Blacklisted,
        MessageKey::ProtocolBlacklisted,
        MessageKey::UnsupportedVersion,
        MessageKey::ReconnectedTooFast,
        MessageKey::TooManyOnlinePerAddress,
        MessageKey::TooManyVerifying,
        MessageKey::QueueFull,
        MessageKey::Welcome,
        MessageKey::EnterCode,
        MessageKey::IncorrectCaptcha,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MessageKey::VerificationSuccess => "verification_success",
            MessageKey::VerificationFailed => "verification_failed",
            MessageKey::InvalidUsername => "invalid_username",
            MessageKey::CurrentlyPreparing => "currently_preparing",
            MessageKey::AlreadyVerifying => "already_verifying",
            MessageKey::AlreadyQueued => "already_queued",
            MessageKey::Blacklisted => "blacklisted",
            MessageKey::ProtocolBlacklisted => "protocol_blacklisted",
            MessageKey::UnsupportedVersion => "unsupported_version",
            MessageKey::ReconnectedTooFast => "reconnected_too_fast",
            MessageKey::TooManyOnlinePerAddress => "too_many_online_per_address",
            MessageKey::TooManyVerifying => "too_many_verifying",
            MessageKey::QueueFull => "queue_full",
            MessageKey::Welcome => "welcome",
            MessageKey::EnterCode => "enter_code",
            MessageKey::IncorrectCaptcha => "incorrect_captcha",
        }
    }

    pub fn from_key(key: &str) -> Option<MessageKey> {
        MessageKey::ALL.into_iter().find(|k| k.key() == key)
    }

    fn index(self) -> usize {
        self as usize
    }

    fn default_text(self) -> &'static str {
        match self {
            MessageKey::VerificationSuccess => "You have been verified successfully. Please reconnect.",
            MessageKey::VerificationFailed => "You failed the bot verification. Please try again.",
            MessageKey::InvalidUsername => "Your username contains invalid characters.",
            MessageKey::CurrentlyPreparing => "The verification is still starting up. Please try again in a moment.",
            MessageKey::AlreadyVerifying => "Your address is already being verified.",
            MessageKey::AlreadyQueued => "Your address is already queued for verification.",
            MessageKey::Blacklisted => "You are temporarily blocked from verifying.",
            MessageKey::ProtocolBlacklisted => "Your game version is not allowed on this server.",
            MessageKey::UnsupportedVersion => "Your game version is not supported.",
            MessageKey::ReconnectedTooFast => "You reconnected too fast. Please wait a few seconds.",
            MessageKey::TooManyOnlinePerAddress => "There are too many players online from your address.",
            MessageKey::TooManyVerifying => "Too many players are verifying right now. Please try again later.",
            MessageKey::QueueFull => "The verification queue is full. Please try again later.",
            MessageKey::Welcome => "",
            MessageKey::EnterCode => "Please enter the code shown on the map into chat.",
            MessageKey::IncorrectCaptcha => "That code is incorrect. Please try again.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages([String; MessageKey::ALL.len()]);

impl Default for Messages {
    fn default() -> Self {
        Self(MessageKey::ALL.map(|key| key.default_text().to_string()))
    }
}

impl Messages {
    pub fn get(&self, key: MessageKey) -> &str {
        &self.0[key.index()]
    }

    pub fn set(&mut self, key: MessageKey, text: impl Into<String>) {
        self.0[key.index()] = text.into();
    }
}

/// Parses a messages file. Keys are case-insensitive.
pub fn parse_messages_file(content: &str) -> Result<Messages> {
    let mut messages = Messages::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            if let Some(key) = MessageKey::from_key(&key.trim().to_ascii_lowercase()) {
                messages.set(key, value.trim());
            }
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
// botwall messages
verification_success: Verified! Join again.
VERIFICATION_FAILED: Nope
# unknown keys are skipped
not_a_key: whatever
blacklisted: Go away: for a while
"#;

    #[test]
    fn test_parse_messages_file() {
        let messages = parse_messages_file(FIXTURE).unwrap();
        assert_eq!(messages.get(MessageKey::VerificationSuccess), "Verified! Join again.");
        assert_eq!(messages.get(MessageKey::VerificationFailed), "Nope");
        // only the first colon separates key and value
        assert_eq!(messages.get(MessageKey::Blacklisted), "Go away: for a while");
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let messages = parse_messages_file("").unwrap();
        assert_eq!(messages, Messages::default());
        assert!(!messages.get(MessageKey::QueueFull).is_empty());
        assert!(messages.get(MessageKey::Welcome).is_empty());
    }

    #[test]
    fn test_keys_are_unique() {
        for key in MessageKey::ALL {
            assert_eq!(MessageKey::from_key(key.key()), Some(key));
        }
    }
}
