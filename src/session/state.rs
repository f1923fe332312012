use serde::{Deserialize, Serialize};

/// What is being recorded
///
/// Captured once from the page when the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub streamer_name: String,
    pub stream_title: String,
}

impl StreamInfo {
    pub fn new(streamer_name: impl Into<String>, stream_title: impl Into<String>) -> Self {
        Self {
            streamer_name: streamer_name.into(),
            stream_title: stream_title.into(),
        }
    }

    /// Fill in placeholders for whatever the page did not expose
    pub fn from_page(streamer_name: Option<String>, stream_title: Option<String>) -> Self {
        Self {
            streamer_name: streamer_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "streamer".to_string()),
            stream_title: stream_title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "title".to_string()),
        }
    }
}

/// Lifecycle of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Stopped,
}

/// What ended a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    /// Explicit stop from the record control
    User,
    /// The page navigated away from the recorded stream
    Navigation,
    /// The owner went away without stopping
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_info_defaults() {
        let info = StreamInfo::from_page(None, Some("  ".to_string()));
        assert_eq!(info.streamer_name, "streamer");
        assert_eq!(info.stream_title, "title");

        let info = StreamInfo::from_page(Some("foo".to_string()), Some("live!".to_string()));
        assert_eq!(info, StreamInfo::new("foo", "live!"));
    }

    #[test]
    fn test_stream_info_field_names() {
        let json = serde_json::to_value(StreamInfo::new("foo", "bar")).unwrap();
        assert_eq!(json["streamerName"], "foo");
        assert_eq!(json["streamTitle"], "bar");
    }
}
