//! Wire contract of the media player's control API.
//!
//! The player exposes a plain-HTTP, plain-text API on a fixed port.  Every
//! value crosses the wire as a text body: seconds as decimal numbers, the
//! playing flag as the literal `true`.  Anything that fails to parse is
//! reported as unknown rather than as an error; the player is allowed to
//! answer nonsense while switching tracks.

/// Fixed TCP port of the control API.
pub const CONTROL_PORT: u16 = 65420;

/// A playback command, addressed by endpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    PlayPause,
    PlayNext,
    PlayPrev,
}

impl PlayerCommand {
    /// Endpoint path on the player, without leading slash.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::PlayPause => "play_pause",
            Self::PlayNext => "play_next",
            Self::PlayPrev => "play_prev",
        }
    }
}

impl std::fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Parse a plain-text seconds value.  Non-numeric bodies mean "unknown",
/// not error — the UI blanks the time label instead of failing.
pub fn parse_seconds(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the `/is_playing` body: the literal `true` and nothing else.
pub fn parse_flag(raw: &str) -> bool {
    raw.trim() == "true"
}

pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

pub fn endpoint_url(host: &str, port: u16, path: &str) -> String {
    format!("http://{}:{}/{}", host, port, path)
}

/// Cover-art URL.  The `hash` query carries the art epoch so that a track
/// change produces a fresh URL and defeats any URL-keyed image cache.
pub fn art_url(host: &str, port: u16, epoch: u64) -> String {
    format!("http://{}:{}/art?hash={}", host, port, epoch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("180"), Some(180.0));
        assert_eq!(parse_seconds(" 42.5\n"), Some(42.5));
        assert_eq!(parse_seconds("abc"), None);
        assert_eq!(parse_seconds(""), None);
        assert_eq!(parse_seconds("NaN"), None);
        assert_eq!(parse_seconds("inf"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("true\n"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("True"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_art_url_changes_with_epoch() {
        let a = art_url("192.168.1.20", CONTROL_PORT, 3);
        let b = art_url("192.168.1.20", CONTROL_PORT, 4);
        assert_eq!(a, "http://192.168.1.20:65420/art?hash=3");
        assert_ne!(a, b);
    }

    #[test]
    fn test_command_endpoints() {
        assert_eq!(PlayerCommand::PlayPause.endpoint(), "play_pause");
        assert_eq!(PlayerCommand::PlayNext.endpoint(), "play_next");
        assert_eq!(PlayerCommand::PlayPrev.endpoint(), "play_prev");
    }
}
