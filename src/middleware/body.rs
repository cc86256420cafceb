use std::pin::Pin;

use super::{Middleware, Next};
use crate::exchange::{BodyAttachment, FormData, FormValue, UploadedFile};
use crate::{HttpEntity, ProteusError, Request, Response};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy)]
/// Reads the whole request body before the endpoint runs.
///
/// The body is stored as a [`BodyAttachment`] extension.  Form bodies are
/// also parsed into [`FormData`]: `application/x-www-form-urlencoded` into
/// text fields, and `multipart/form-data` into text fields and uploaded
/// files, spooled to temporary files.  Nothing over `limit` bytes is read;
/// such a request is answered with a 413.
pub struct BodyReader {
    limit: u64,
}

impl BodyReader {
    /// Creates the middleware, reading at most `limit` bytes per request.
    pub fn new(limit: u64) -> Self {
        BodyReader { limit }
    }

    async fn read(&self, request: &mut Request) -> Result<(), ProteusError> {
        if let Some(length) = content_length(request) {
            if length > self.limit {
                return Err(ProteusError::PayloadTooLarge(self.limit));
            }
        }

        let content_type = request.content_type();
        match content_type.as_ref().map(mime::Mime::essence_str) {
            Some("multipart/form-data") => {
                let form = self.read_multipart(request).await?;
                request.set_ext(form);
            }
            Some("application/x-www-form-urlencoded") => {
                let bytes = request.data(self.limit).into_bytes().await?;
                let mut form = FormData::new();
                for (key, value) in form_urlencoded::parse(&bytes) {
                    form.push(key, FormValue::Text(value.into_owned()));
                }
                request.set_ext(form);
                request.set_ext(BodyAttachment(bytes));
            }
            _ => {
                let bytes = request.data(self.limit).into_bytes().await?;
                log::trace!("read {} bytes of body", bytes.len());
                request.set_ext(BodyAttachment(bytes));
            }
        }

        Ok(())
    }

    async fn read_multipart(&self, request: &mut Request) -> Result<FormData, ProteusError> {
        let boundary = request
            .content_type_str()
            .ok_or_else(|| ProteusError::FormData(anyhow::anyhow!("missing content type")))
            .and_then(|v| multer::parse_boundary(v).map_err(multipart_error))?;
        let constraints = multer::Constraints::new()
            .size_limit(multer::SizeLimit::new().whole_stream(self.limit));
        let mut multipart =
            multer::Multipart::with_constraints(request.take_body(), boundary, constraints);
        let mut form = FormData::new();

        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = match field.name() {
                Some(name) => name.to_owned(),
                None => {
                    log::debug!("skipping unnamed form part");
                    continue;
                }
            };

            if field.file_name().is_none() {
                let text = field.text().await.map_err(multipart_error)?;
                form.push(name, FormValue::Text(text));
                continue;
            }

            let file_name = field.file_name().map(str::to_owned);
            let content_type = field.content_type().cloned();
            let spool = tokio::task::spawn_blocking(tempfile::NamedTempFile::new)
                .await
                .map_err(|e| ProteusError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
                .map_err(ProteusError::Io)?;
            let (file, path) = spool.into_parts();
            let mut file = tokio::fs::File::from_std(file);
            let mut size = 0u64;

            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                size += chunk.len() as u64;
                file.write_all(&chunk).await.map_err(ProteusError::Io)?;
            }
            file.flush().await.map_err(ProteusError::Io)?;

            log::debug!("spooled {} ({} bytes) to {:?}", name, size, &*path);
            form.push(
                name,
                FormValue::File(UploadedFile::spooled(path, file_name, content_type, size)),
            );
        }

        Ok(form)
    }
}

#[async_trait]
impl Middleware for BodyReader {
    async fn apply(
        self: Pin<&Self>,
        mut request: Request,
        next: Next<'_>,
    ) -> Result<Response, anyhow::Error> {
        match self.read(&mut request).await {
            Ok(()) => next.apply(request).await,
            Err(ProteusError::PayloadTooLarge(limit)) => {
                log::debug!("body exceeded {} bytes", limit);
                Ok(Response::payload_too_large())
            }
            Err(ProteusError::FormData(e)) => {
                log::debug!("invalid form data: {:#}", e);
                Ok(Response::bad_request("Invalid form data"))
            }
            Err(ProteusError::ReadBody(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                log::debug!("{} {}: aborted while reading body", request.method(), request.uri());
                Err(crate::HandlerError::Aborted.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn content_length(request: &Request) -> Option<u64> {
    request
        .header(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn multipart_error(error: multer::Error) -> ProteusError {
    match error {
        multer::Error::StreamSizeExceeded { limit } => ProteusError::PayloadTooLarge(limit),
        multer::Error::StreamReadFailed(e) => {
            let kind = match e.downcast_ref::<hyper::Error>() {
                Some(hyper) if crate::data::is_hangup(hyper) => std::io::ErrorKind::UnexpectedEof,
                _ => std::io::ErrorKind::Other,
            };
            ProteusError::ReadBody(std::io::Error::new(kind, e))
        }
        e => ProteusError::FormData(e.into()),
    }
}
