//! Inbound client message vocabulary.

use serde_json::Value as Json;

/// A control command decoded from one inbound client message.
///
/// Classification checks a fixed priority order of top-level keys and
/// stops at the first match, so a message carrying several known keys
/// decodes to exactly one variant. Anything else is [`Unknown`], which
/// is not an error: unknown messages are logged and ignored.
///
/// [`Unknown`]: Command::Unknown
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Read the pool variable and push it to the client.
    FetchData,
    /// Set the pooling window length, in samples.
    SetPoolingWindow(f64),
    /// Set the pooling lowpass coefficient.
    SetPoolingAlpha(f64),
    /// Set the pooling type.
    SetPoolingType(String),
    /// Switch the beamformer on or off.
    SetBeamformer(bool),
    /// Change the session's polling interval, in seconds. Local session
    /// state only; never forwarded to the engine.
    SetPollInterval(f64),
    /// Unrecognized message, mistyped payload, or malformed JSON.
    Unknown,
}

impl Command {
    /// Classify a decoded message.
    ///
    /// Key priority: `command`, `new_pooling_wndlen`,
    /// `new_pooling_alpha`, `new_pooling_type`, `beamformer`,
    /// `new_interval`. A matched key whose payload has the wrong type
    /// classifies the whole message as [`Command::Unknown`].
    pub fn classify(message: &Json) -> Command {
        if let Some(command) = message.get("command") {
            return match command.as_str() {
                Some("send_data") => Command::FetchData,
                _ => Command::Unknown,
            };
        }
        if let Some(wndlen) = message.get("new_pooling_wndlen") {
            return wndlen
                .as_f64()
                .map_or(Command::Unknown, Command::SetPoolingWindow);
        }
        if let Some(alpha) = message.get("new_pooling_alpha") {
            return alpha
                .as_f64()
                .map_or(Command::Unknown, Command::SetPoolingAlpha);
        }
        if let Some(pooling_type) = message.get("new_pooling_type") {
            return pooling_type
                .as_str()
                .map_or(Command::Unknown, |t| Command::SetPoolingType(t.to_string()));
        }
        if let Some(enabled) = message.get("beamformer") {
            return enabled
                .as_bool()
                .map_or(Command::Unknown, Command::SetBeamformer);
        }
        if let Some(interval) = message.get("new_interval") {
            return interval
                .as_f64()
                .map_or(Command::Unknown, Command::SetPollInterval);
        }
        Command::Unknown
    }

    /// Parse and classify a raw text frame. Malformed JSON is
    /// [`Command::Unknown`].
    pub fn from_text(text: &str) -> Command {
        match serde_json::from_str::<Json>(text) {
            Ok(message) => Self::classify(&message),
            Err(_) => Command::Unknown,
        }
    }
}
