//! Channel names and server routes.
//!
//! Channel names are opaque strings compared byte for byte. They are
//! percent-escaped whenever they are placed into a request path.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Maximum channel name length.
pub const MAX_CHANNEL_NAME_LENGTH: usize = 256;

/// A channel identifier, as given by the caller (unescaped).
pub type ChannelId = String;

/// Characters escaped in a path segment: everything except RFC 3986 unreserved.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Validate a channel name.
///
/// # Errors
///
/// Returns an error message if the channel name is invalid.
pub fn validate_channel_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Channel name cannot be empty");
    }
    if name.len() > MAX_CHANNEL_NAME_LENGTH {
        return Err("Channel name too long");
    }
    if name.chars().any(char::is_control) {
        return Err("Channel name contains control characters");
    }
    Ok(())
}

/// Percent-escape a single path segment.
#[must_use]
pub fn escape_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Path of the one-shot channel creation request.
#[must_use]
pub fn create_path(channel: &str) -> String {
    format!("/channel/create/{}", escape_segment(channel))
}

/// Path of the one-shot message send request.
#[must_use]
pub fn send_path(channel: &str, message: &str) -> String {
    format!(
        "/channel/send/{}/{}",
        escape_segment(channel),
        escape_segment(message)
    )
}

/// Path of the send-role stream connection.
#[must_use]
pub fn stream_send_path(channel: &str) -> String {
    format!("/channel/send/{}", escape_segment(channel))
}

/// Path of the listen-role stream connection.
#[must_use]
pub fn listen_path(channel: &str) -> String {
    format!("/channel/listen/{}", escape_segment(channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_validation() {
        assert!(validate_channel_name("test").is_ok());
        assert!(validate_channel_name("room with spaces").is_ok());
        assert!(validate_channel_name("").is_err());
        assert!(validate_channel_name("bad\nname").is_err());

        let long_name = "a".repeat(MAX_CHANNEL_NAME_LENGTH + 1);
        assert!(validate_channel_name(&long_name).is_err());
    }

    #[test]
    fn test_routes() {
        assert_eq!(create_path("test"), "/channel/create/test");
        assert_eq!(stream_send_path("test"), "/channel/send/test");
        assert_eq!(listen_path("test"), "/channel/listen/test");
        assert_eq!(
            send_path("test", "Hello, World!"),
            "/channel/send/test/Hello%2C%20World%21"
        );
    }

    #[test]
    fn test_escape_segment() {
        assert_eq!(escape_segment("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(escape_segment("a/b"), "a%2Fb");
        assert_eq!(escape_segment("频道"), "%E9%A2%91%E9%81%93");
    }
}
