use std::fmt;

use crate::http::request::Request;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The request line held no tokens at all
    EmptyRequestLine,
    /// The request line had a method but no target
    MissingTarget,
    /// A request or header line exceeded the configured cap
    LineTooLong(usize),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::EmptyRequestLine => f.write_str("empty request line"),
            ParseError::MissingTarget => f.write_str("request line has no target"),
            ParseError::LineTooLong(limit) => {
                write!(f, "line exceeds {} bytes", limit)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Builds a [`Request`] from a request line and the header lines after it.
///
/// The request line is split on whitespace: method, target and an optional
/// version. Anything after the version is ignored.
pub fn parse_request(
    request_line: &str,
    header_lines: Vec<String>,
) -> Result<Request, ParseError> {
    let mut parts = request_line.split_whitespace();

    let method = parts.next().ok_or(ParseError::EmptyRequestLine)?;
    let target = parts.next().ok_or(ParseError::MissingTarget)?;
    let version = parts.next();

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.map(str::to_string),
        header_lines,
    })
}

/// Turns a raw line into text without losing bytes.
///
/// Valid UTF-8 is kept as is; every byte of an invalid sequence becomes a
/// `%XX` escape, which target resolution decodes back to the same byte.
pub fn decode_line(line: &[u8]) -> String {
    let mut out = String::with_capacity(line.len());
    for chunk in line.utf8_chunks() {
        out.push_str(chunk.valid());
        for byte in chunk.invalid() {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Strips one trailing LF or CRLF from a raw line.
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
