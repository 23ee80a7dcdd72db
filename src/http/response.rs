use bytes::Bytes;
use tokio::fs::File;

/// HTTP status codes the server can answer with.
///
/// - `Ok` (200): File or directory index found
/// - `BadRequest` (400): Request line could not be parsed
/// - `Forbidden` (403): Access denied, or target outside the served root
/// - `NotFound` (404): Nothing at the requested path
/// - `InternalServerError` (500): Any other file-system failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use webserver::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use webserver::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// Response entity.
#[derive(Debug)]
pub enum Body {
    /// An opened file, streamed in fixed-size chunks
    File(File),
    /// A body held in memory (error pages, directory indexes)
    Bytes(Bytes),
}

/// Represents a complete HTTP response ready to be sent to a client.
///
/// The wire format carries exactly one header, the content type, so there is
/// no general header map.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Value of the `Content-type` header line
    pub content_type: &'static str,
    /// Response entity
    pub body: Body,
}

/// Renders the fixed HTML page sent with error statuses.
///
/// ```
/// # use webserver::http::response::{error_page, StatusCode};
/// assert_eq!(
///     error_page(StatusCode::NotFound),
///     "<html><head><title>Error 404</title></head><body>Not Found</body></html>"
/// );
/// ```
pub fn error_page(status: StatusCode) -> String {
    format!(
        "<html><head><title>Error {}</title></head><body>{}</body></html>",
        status.as_u16(),
        status.reason_phrase()
    )
}

impl Response {
    /// Creates a 200 OK response that streams `file`.
    pub fn file(file: File, content_type: &'static str) -> Self {
        Self {
            status: StatusCode::Ok,
            content_type,
            body: Body::File(file),
        }
    }

    /// Creates a 200 OK `text/html` response with an in-memory body.
    pub fn html(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::Ok,
            content_type: "text/html",
            body: Body::Bytes(body.into()),
        }
    }

    /// Creates an error response carrying the matching HTML error page.
    pub fn error(status: StatusCode) -> Self {
        Self {
            status,
            content_type: "text/html",
            body: Body::Bytes(Bytes::from(error_page(status))),
        }
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request() -> Self {
        Self::error(StatusCode::BadRequest)
    }

    /// Creates a 403 Forbidden response.
    pub fn forbidden() -> Self {
        Self::error(StatusCode::Forbidden)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::error(StatusCode::NotFound)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::error(StatusCode::InternalServerError)
    }
}
