//! Content-type detection from file names.

/// Returned when no known suffix matches.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Known suffixes in priority order. Matching is literal and case-sensitive.
const TABLE: &[(&str, &str)] = &[
    (".htm", "text/html"),
    (".html", "text/html"),
    (".txt", "text/plain"),
    (".java", "text/plain"),
    (".gif", "image/gif"),
    (".jpeg", "image/jpeg"),
    (".png", "image/png"),
    (".mp3", "audio/mpeg"),
];

/// Returns the MIME type for `file_name` based on its suffix.
///
/// The name does not need to refer to an existing file. Anything without a
/// known suffix maps to [`DEFAULT_CONTENT_TYPE`].
///
/// # Example
///
/// ```
/// # use webserver::http::mime::content_type;
/// assert_eq!(content_type("/index.html"), "text/html");
/// assert_eq!(content_type("/song.MP3"), "application/octet-stream");
/// ```
pub fn content_type(file_name: &str) -> &'static str {
    TABLE
        .iter()
        .find(|(suffix, _)| file_name.ends_with(suffix))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
