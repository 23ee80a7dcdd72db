use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::response::{Body, Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.0";

/// Size of the intermediate buffer used to stream file bodies.
pub const COPY_BUFFER_SIZE: usize = 1024;

/// Renders the status line, the content-type line and the blank line.
pub fn serialize_head(status: StatusCode, content_type: &str) -> Vec<u8> {
    format!(
        "{} {} {}\r\nContent-type: {}\r\n\r\n",
        HTTP_VERSION,
        status.as_u16(),
        status.reason_phrase(),
        content_type,
    )
    .into_bytes()
}

/// Copies `src` into `dst` through a fixed [`COPY_BUFFER_SIZE`] buffer.
///
/// Memory use does not depend on the size of `src`. Returns the number of
/// bytes copied.
pub async fn copy_body<R, W>(src: &mut R, dst: &mut W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        dst.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

pub struct ResponseWriter {
    head: Vec<u8>,
    body: Body,
}

impl ResponseWriter {
    pub fn new(response: Response) -> Self {
        Self {
            head: serialize_head(response.status, response.content_type),
            body: response.body,
        }
    }

    /// Writes the whole response and returns the number of body bytes sent.
    ///
    /// Consumes the writer, so an opened file is closed once this returns,
    /// whether or not the transfer completed.
    pub async fn write_to_stream<W>(self, stream: &mut W) -> anyhow::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        stream.write_all(&self.head).await?;

        let sent = match self.body {
            Body::File(mut file) => copy_body(&mut file, stream).await?,
            Body::Bytes(bytes) => {
                stream.write_all(&bytes).await?;
                bytes.len() as u64
            }
        };

        stream.flush().await?;
        Ok(sent)
    }
}
