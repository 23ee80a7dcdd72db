//! HTTP/1.0 protocol implementation.
//!
//! Every connection carries exactly one GET-style request: the request line
//! and headers are read, the target is mapped onto a file under the served
//! root, and the response is written before the connection is closed.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine driving one request
//! - **`parser`**: Request-line tokenization and line framing
//! - **`request`**: The parsed request
//! - **`resolve`**: Mapping targets onto files and directory indexes
//! - **`response`**: Status, content type and body of a response
//! - **`writer`**: Serializes the header block and streams the body
//! - **`mime`**: MIME type detection based on file name suffixes
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Request line and headers
//!        └──────┬──────┘
//!               │ Request parsed         (malformed → 400 → Writing)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Resolve target, pick status
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Header block, then body
//!        └──────┬───────────┘
//!               │ Response sent
//!               ▼
//!            Closed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webserver::config::ConnectionLimits;
//! use webserver::http::connection::Connection;
//! use webserver::http::resolve::ServedRoot;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:6789").await?;
//!     let root = Arc::new(ServedRoot::new(".")?);
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let root = root.clone();
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, root, ConnectionLimits::default());
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod resolve;
pub mod response;
pub mod writer;
