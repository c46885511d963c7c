//! Wire codec for the SYSConnector subscription protocol
//!
//! Outbound requests come in two framings. Normal framing is a minimal
//! HTTP/1.1 POST with Basic credentials. Fast framing drops HTTP entirely:
//!
//! ```text
//! <8 hex digit content length> /sys/<path>\r\n\r\n<content>
//! ```
//!
//! Inbound frames always look like HTTP responses. Only three header lines
//! matter to the client: the status line, `Target-Element:` and
//! `Content-Length:`, which is always the last header before the payload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use url::Url;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Name of the root object; the canary response carries it
pub const ROOT_NAME: &str = "Home";

/// Get-value request sent right after connecting
pub const CANARY_COMMAND: &str = "sys://Home?f??Name";

/// Set request on the well-known connection object that turns on fast mode
pub const FAST_MODE_COMMAND: &str = "{8D692EC9-EB74-4155-9D83-315872AC9800}?e?FastMode";

/// Body sent with [`FAST_MODE_COMMAND`]
pub const FAST_MODE_VALUE: &str = "True";

pub const PAUSE_TOKEN: &str = "pauseConnection";
pub const RESUME_TOKEN: &str = "resumeConnection";
pub const FAST_MODE_TOKEN: &str = "fastMode";

/// Largest inbound payload the client will read, in bytes
pub const MAX_CONTENT_LENGTH: usize = 1024 * 1024;

const SYS_SCHEME: &str = "sys://";
const STATUS_PREFIX: &str = "HTTP/1.1 ";
const TARGET_ELEMENT_PREFIX: &str = "Target-Element: ";
const CONTENT_LENGTH_PREFIX: &str = "Content-Length: ";
const CONNECTION_PREFIX: &str = "Connection: ";
const CONTENT_TYPE_PREFIX: &str = "Content-Type: ";
const ERROR_PREFIX: &str = "Error: ";
const AUTHORIZATION_PREFIX: &str = "Authorization: ";

// ============================================================================
// Commands
// ============================================================================

/// `<location>?a?<id>??<property>?<id>?`
pub fn subscribe_command(location: &str, property: &str, id: u32) -> String {
    format!("{}?a?{}??{}?{}?", location, id, property, id)
}

/// `?c?<id>`
pub fn unsubscribe_command(id: u32) -> String {
    format!("?c?{}", id)
}

/// Drop a leading `sys://` from a location or command
pub fn strip_sys(command: &str) -> &str {
    command.strip_prefix(SYS_SCHEME).unwrap_or(command)
}

// ============================================================================
// Request encoding
// ============================================================================

/// Escaped `/sys/...` path and query for a command
pub fn request_path(config: &ServerConfig, command: &str) -> Result<String> {
    let raw = format!("{}/sys/{}", config.base_url(), strip_sys(command));
    let url = Url::parse(&raw)
        .map_err(|e| ServerError::InvalidLocation(format!("{}: {}", command, e)))?;

    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Ok(path)
}

/// `Authorization` header value for the configured credentials
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Render a command in normal (HTTP) framing
pub fn encode_request(config: &ServerConfig, command: &str, content: &str) -> Result<String> {
    let mut request = format!("POST {} HTTP/1.1\r\n", request_path(config, command)?);
    request.push_str(&format!("User-Agent: {}\r\n", config.user_agent));
    request.push_str(&format!("Host: {}:{}\r\n", config.host, config.port));
    request.push_str("Connection: Keep-Alive\r\n");
    request.push_str(&format!(
        "{}{}\r\n",
        AUTHORIZATION_PREFIX,
        basic_auth(&config.username, &config.password)
    ));
    if !content.is_empty() {
        request.push_str(&format!("{}{}\r\n", CONTENT_LENGTH_PREFIX, content.len()));
    }
    request.push_str("\r\n");
    request.push_str(content);
    Ok(request)
}

/// Render a command in fast framing; the path is not escaped
pub fn encode_fast(command: &str, content: &str) -> String {
    format!(
        "{:08X} /sys/{}\r\n\r\n{}",
        content.len(),
        strip_sys(command),
        content
    )
}

/// Copy of a request safe to log
pub fn redact(request: &str) -> String {
    request
        .split("\r\n")
        .map(|line| {
            if line.starts_with(AUTHORIZATION_PREFIX) {
                "Authorization: Basic <redacted>"
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

// ============================================================================
// Response parsing
// ============================================================================

/// One header line of an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLine {
    /// `HTTP/1.1 <code> <phrase>`
    Status { code: String, phrase: String },
    /// `Target-Element: <id>`; non-numeric ids read as 0
    TargetElement(u32),
    /// `Content-Length: <n>`, the last header before the payload
    ContentLength(usize),
    /// A numeric `Content-Length` above [`MAX_CONTENT_LENGTH`]
    OversizedContent(String),
    /// Anything else, ignored
    Other,
}

impl FrameLine {
    pub fn parse(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix(STATUS_PREFIX) {
            let code: String = rest.chars().take(3).collect();
            let phrase = rest.get(4..).unwrap_or_default().to_string();
            return FrameLine::Status { code, phrase };
        }
        if let Some(id) = line.strip_prefix(TARGET_ELEMENT_PREFIX) {
            return FrameLine::TargetElement(id.trim().parse().unwrap_or(0));
        }
        if let Some(len) = line.strip_prefix(CONTENT_LENGTH_PREFIX) {
            return match parse_content_length(len) {
                Some(Ok(len)) => FrameLine::ContentLength(len),
                Some(Err(())) => FrameLine::OversizedContent(len.trim().to_string()),
                None => FrameLine::Other,
            };
        }
        FrameLine::Other
    }
}

/// `None` for non-numeric text, `Err` for lengths above [`MAX_CONTENT_LENGTH`]
fn parse_content_length(value: &str) -> Option<std::result::Result<usize, ()>> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match value.parse::<usize>() {
        Ok(len) if len <= MAX_CONTENT_LENGTH => Some(Ok(len)),
        _ => Some(Err(())),
    }
}

/// True for 2xx status codes
pub fn is_success(code: &str) -> bool {
    code.starts_with('2')
}

/// What a payload means once its frame is complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Answer to the canary request
    Canary,
    /// Server hit its connection limit; subscriptions are suspended
    Pause,
    /// Server lifted the limit; subscriptions must be sent again
    Resume,
    /// Server switched this connection to fast framing
    FastMode,
    /// A property value for the subscription with this target id
    Value { target: u32, value: &'a str },
}

impl<'a> Payload<'a> {
    pub fn classify(target: u32, payload: &'a str) -> Self {
        if target == 0 && payload == ROOT_NAME {
            return Payload::Canary;
        }
        match payload {
            PAUSE_TOKEN => Payload::Pause,
            RESUME_TOKEN => Payload::Resume,
            FAST_MODE_TOKEN => Payload::FastMode,
            value => Payload::Value { target, value },
        }
    }
}

/// Diagnostic headers collected from an error response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorResponse {
    pub connection: Option<String>,
    pub content_type: Option<String>,
    pub error: Option<String>,
    pub content_length: usize,
    /// The body was announced with a length above [`MAX_CONTENT_LENGTH`]
    pub oversized: bool,
}

impl ErrorResponse {
    /// Record one header line.
    ///
    /// Returns `true` on the blank line that ends the headers.
    pub fn apply(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return true;
        }
        if let Some(value) = line.strip_prefix(CONNECTION_PREFIX) {
            self.connection = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix(CONTENT_TYPE_PREFIX) {
            self.content_type = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix(ERROR_PREFIX) {
            self.error = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix(CONTENT_LENGTH_PREFIX) {
            match parse_content_length(value) {
                Some(Ok(len)) => self.content_length = len,
                Some(Err(())) => {
                    self.content_length = 0;
                    self.oversized = true;
                }
                None => self.content_length = 0,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config() -> ServerConfig {
        ServerConfig::for_host("premise", 86).with_credentials("user", "pass")
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            subscribe_command("sys://Home/Kitchen", "Brightness", 42),
            "sys://Home/Kitchen?a?42??Brightness?42?"
        );
        assert_eq!(unsubscribe_command(42), "?c?42");
        assert_eq!(strip_sys("sys://Home"), "Home");
        assert_eq!(strip_sys("?c?1"), "?c?1");
    }

    #[rstest]
    #[case(CANARY_COMMAND, "/sys/Home?f??Name")]
    #[case("sys://Home/Great Room?a?7??Name?7?", "/sys/Home/Great%20Room?a?7??Name?7?")]
    #[case("?c?7", "/sys/?c?7")]
    #[case(FAST_MODE_COMMAND, "/sys/%7B8D692EC9-EB74-4155-9D83-315872AC9800%7D?e?FastMode")]
    fn test_request_path(#[case] command: &str, #[case] expected: &str) {
        assert_eq!(request_path(&config(), command).unwrap(), expected);
    }

    #[test]
    fn test_encode_request_without_body() {
        let request = encode_request(&config(), CANARY_COMMAND, "").unwrap();
        assert_eq!(
            request,
            "POST /sys/Home?f??Name HTTP/1.1\r\n\
             User-Agent: Premise SDK Rust Client\r\n\
             Host: premise:86\r\n\
             Connection: Keep-Alive\r\n\
             Authorization: Basic dXNlcjpwYXNz\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_encode_request_with_body() {
        let request = encode_request(&config(), FAST_MODE_COMMAND, FAST_MODE_VALUE).unwrap();
        assert!(request.contains("Content-Length: 4\r\n\r\nTrue"));
        assert!(request.ends_with("\r\n\r\nTrue"));
    }

    #[test]
    fn test_encode_fast() {
        assert_eq!(
            encode_fast("sys://Home/Kitchen?a?5??PowerState?5?", ""),
            "00000000 /sys/Home/Kitchen?a?5??PowerState?5?\r\n\r\n"
        );
        assert_eq!(encode_fast("?c?5", "True"), "00000004 /sys/?c?5\r\n\r\nTrue");
        assert_eq!(
            encode_fast("sys://Home/Great Room", &"x".repeat(255)),
            format!("000000FF /sys/Home/Great Room\r\n\r\n{}", "x".repeat(255))
        );
    }

    #[test]
    fn test_redact() {
        let request = encode_request(&config(), CANARY_COMMAND, "").unwrap();
        let redacted = redact(&request);
        assert!(!redacted.contains("dXNlcjpwYXNz"));
        assert!(redacted.contains("Authorization: Basic <redacted>"));
        assert!(redacted.starts_with("POST /sys/Home?f??Name HTTP/1.1"));
    }

    #[rstest]
    #[case("HTTP/1.1 200 OK", FrameLine::Status { code: "200".into(), phrase: "OK".into() })]
    #[case("HTTP/1.1 401 Unauthorized", FrameLine::Status { code: "401".into(), phrase: "Unauthorized".into() })]
    #[case("HTTP/1.1 204", FrameLine::Status { code: "204".into(), phrase: String::new() })]
    #[case("Target-Element: 1234", FrameLine::TargetElement(1234))]
    #[case("Target-Element: abc", FrameLine::TargetElement(0))]
    #[case("Content-Length: 3", FrameLine::ContentLength(3))]
    #[case("Content-Length: many", FrameLine::Other)]
    #[case("Content-Length: 1048576", FrameLine::ContentLength(MAX_CONTENT_LENGTH))]
    #[case("Content-Length: 1048577", FrameLine::OversizedContent("1048577".into()))]
    #[case(
        "Content-Length: 18446744073709551616",
        FrameLine::OversizedContent("18446744073709551616".into())
    )]
    #[case("Content-Type: text/plain", FrameLine::Other)]
    #[case("", FrameLine::Other)]
    fn test_frame_line_parse(#[case] line: &str, #[case] expected: FrameLine) {
        assert_eq!(FrameLine::parse(line), expected);
    }

    #[test]
    fn test_is_success() {
        assert!(is_success("200"));
        assert!(is_success("204"));
        assert!(!is_success("401"));
        assert!(!is_success("500"));
    }

    #[test]
    fn test_payload_classify() {
        assert_eq!(Payload::classify(0, "Home"), Payload::Canary);
        assert_eq!(
            Payload::classify(9, "Home"),
            Payload::Value { target: 9, value: "Home" }
        );
        assert_eq!(Payload::classify(0, "pauseConnection"), Payload::Pause);
        assert_eq!(Payload::classify(3, "resumeConnection"), Payload::Resume);
        assert_eq!(Payload::classify(0, "fastMode"), Payload::FastMode);
        assert_eq!(
            Payload::classify(0, "PauseConnection"),
            Payload::Value { target: 0, value: "PauseConnection" }
        );
        assert_eq!(
            Payload::classify(12, "50%"),
            Payload::Value { target: 12, value: "50%" }
        );
    }

    #[test]
    fn test_error_response_headers() {
        let mut response = ErrorResponse::default();
        assert!(!response.apply("Connection: close"));
        assert!(!response.apply("Content-Type: text/html"));
        assert!(!response.apply("Error: Access denied"));
        assert!(!response.apply("Content-Length: 12"));
        assert!(response.apply(""));

        assert_eq!(response.connection.as_deref(), Some("close"));
        assert_eq!(response.content_type.as_deref(), Some("text/html"));
        assert_eq!(response.error.as_deref(), Some("Access denied"));
        assert_eq!(response.content_length, 12);
    }

    #[test]
    fn test_error_response_oversized_body() {
        let mut response = ErrorResponse::default();
        assert!(!response.apply("Content-Length: 18446744073709551615"));
        assert!(response.apply(""));

        assert_eq!(response.content_length, 0);
        assert!(response.oversized);
    }
}
