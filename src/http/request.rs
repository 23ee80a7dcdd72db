/// Represents a parsed HTTP request from a client.
///
/// Only the request line is interpreted. Header lines are kept verbatim, in
/// the order they arrived, for logging; nothing routes on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The method token as sent (e.g. "GET"). Not validated.
    pub method: String,
    /// The raw request target (e.g. "/index.html"), exactly as received
    pub target: String,
    /// Protocol version token, if the client sent one
    pub version: Option<String>,
    /// Raw header lines without their line terminators
    pub header_lines: Vec<String>,
}

impl Request {
    /// Looks up a header value by name.
    ///
    /// Names are compared case-insensitively and the first matching line
    /// wins. Lines without a colon are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_lines.iter().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}
