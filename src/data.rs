use futures::stream::MapErr;
use futures::TryStreamExt;
use tokio::io::{AsyncReadExt, AsyncWrite, Take};
use tokio_util::io::StreamReader;

use crate::ProteusError;

/// The data stream of a body.
///
/// Every read of a body goes through one of these, with an explicit limit;
/// reading past the limit is reported instead of buffered.
#[derive(Debug)]
#[must_use = "this consumes the body of the request regardless of whether it is used"]
pub struct DataStream {
    stream: Take<StreamReader<HttpStream, bytes::Bytes>>,
    limit: u64,
}

type HttpStream = MapErr<hyper::Body, fn(hyper::Error) -> std::io::Error>;

#[derive(Debug, Copy, Clone)]
/// The result of [`DataStream::into`].
pub struct DataTransfer {
    /// The number of bytes that were transferred.
    pub count: u64,
    /// Whether the stream ended within the limit.  If the limit was reached
    /// with data still pending, this is `false`.
    pub complete: bool,
}

impl DataStream {
    /// Create a new data stream from a hyper body, reading at most `limit`
    /// bytes.
    pub(crate) fn new(body: hyper::Body, limit: u64) -> Self {
        Self {
            stream: StreamReader::new(body.map_err(map_hyper_error as fn(_) -> _))
                .take(limit.saturating_add(1)),
            limit,
        }
    }

    // destructive; only valid once the stream has been drained.
    fn limit_exceeded(&self) -> bool {
        self.stream.limit() == 0
    }

    /// Streams the body into the given writer.
    ///
    /// # Errors
    /// Fails if the body could not be read, or the writer could not be
    /// written to.  A peer that goes away mid-body surfaces as an
    /// [`std::io::ErrorKind::UnexpectedEof`] inside [`ProteusError::ReadBody`].
    /// Exceeding the limit is not an error here; check
    /// [`DataTransfer::complete`].
    pub async fn into<W: AsyncWrite + Unpin>(
        mut self,
        writer: &mut W,
    ) -> Result<DataTransfer, ProteusError> {
        let written = tokio::io::copy(&mut self.stream, writer)
            .await
            .map_err(ProteusError::ReadBody)?;
        let complete = !self.limit_exceeded();
        Ok(DataTransfer {
            count: written.min(self.limit),
            complete,
        })
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    /// Fails for the same reasons as [`Self::into`], and with
    /// [`ProteusError::PayloadTooLarge`] if the body is longer than the limit.
    pub async fn into_bytes(self) -> Result<bytes::Bytes, ProteusError> {
        let limit = self.limit;
        let mut buf = Vec::new();
        let transfer = self.into(&mut buf).await?;

        if transfer.complete {
            Ok(buf.into())
        } else {
            Err(ProteusError::PayloadTooLarge(limit))
        }
    }

    /// Reads the whole body into a string.
    ///
    /// # Errors
    /// Fails for the same reasons as [`Self::into_bytes`], or if the body is
    /// not valid UTF-8.
    pub async fn into_text(self) -> Result<String, ProteusError> {
        let bytes = self.into_bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            ProteusError::ReadBody(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

/// Whether the error means the peer went away mid-body.
pub(crate) fn is_hangup(e: &hyper::Error) -> bool {
    e.is_closed() || e.is_incomplete_message() || e.is_canceled() || e.is_body_write_aborted()
}

fn map_hyper_error(e: hyper::Error) -> std::io::Error {
    if is_hangup(&e) {
        std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e)
    } else {
        std::io::Error::new(std::io::ErrorKind::Other, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_within_limit() {
        let data = DataStream::new(hyper::Body::from("hello"), 5)
            .into_bytes()
            .await
            .unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn rejects_past_limit() {
        let error = DataStream::new(hyper::Body::from("hello!"), 5)
            .into_bytes()
            .await
            .unwrap_err();
        assert!(matches!(error, ProteusError::PayloadTooLarge(5)));
    }

    #[tokio::test]
    async fn reports_incomplete_transfer() {
        let mut sink = Vec::new();
        let transfer = DataStream::new(hyper::Body::from("hello, world"), 4)
            .into(&mut sink)
            .await
            .unwrap();
        assert!(!transfer.complete);
        assert_eq!(transfer.count, 4);
    }

    #[tokio::test]
    async fn aborted_body_is_eof() {
        let (mut sender, body) = hyper::Body::channel();
        sender
            .send_data(bytes::Bytes::from_static(b"partial"))
            .await
            .unwrap();
        sender.abort();

        let error = DataStream::new(body, 1024).into_bytes().await.unwrap_err();
        match error {
            ProteusError::ReadBody(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            e => panic!("unexpected error {:?}", e),
        }
    }
}
