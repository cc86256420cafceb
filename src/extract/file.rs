//! Extractors over uploaded files.
//!
//! Files are parts of a `multipart/form-data` body, spooled to disk by
//! [`crate::middleware::BodyReader`]; the spool files live as long as the
//! exchange does.

use crate::error::{BadInput, HandlerError};
use crate::exchange::UploadedFile;
use crate::Exchange;
use bytes::Bytes;
use std::future::Future;
use std::ops::Deref;
use std::path::PathBuf;

/// The full contents of an uploaded file.
///
/// As a controller parameter, this binds to the form upload of the same
/// name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBytes(pub Bytes);

impl FileBytes {
    /// Unwraps the contents.
    pub fn into_inner(self) -> Bytes {
        self.0
    }
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<FileBytes> for Bytes {
    fn from(file: FileBytes) -> Self {
        file.0
    }
}

/// The uploaded file sent under the given name.
///
/// # Errors
/// Fails if there is no such file.
pub fn upload<'e>(exchange: &'e Exchange, name: &str) -> Result<&'e UploadedFile, BadInput> {
    exchange
        .form()
        .and_then(|form| form.file(name))
        .ok_or_else(|| BadInput::missing(name))
}

/// The path of the spooled file sent under the given name.
///
/// # Errors
/// Fails if there is no such file.
pub fn path(exchange: &Exchange, name: &str) -> Result<PathBuf, BadInput> {
    upload(exchange, name).map(|file| file.path().to_path_buf())
}

/// Reads the whole spooled file sent under the given name.
///
/// The read runs on the blocking pool; the returned future does not borrow
/// the exchange.
///
/// # Errors
/// Fails with [`HandlerError::BadInput`] if there is no such file, and
/// [`HandlerError::Internal`] if it could not be read.
pub fn bytes(
    exchange: &Exchange,
    name: &str,
) -> impl Future<Output = Result<FileBytes, HandlerError>> + Send + 'static {
    let location = path(exchange, name);
    async move { read(location?).await }
}

async fn read(location: PathBuf) -> Result<FileBytes, HandlerError> {
    match tokio::fs::read(&location).await {
        Ok(contents) => Ok(FileBytes(contents.into())),
        Err(e) => Err(HandlerError::Internal(
            anyhow::Error::new(e).context(format!("reading spooled file {}", location.display())),
        )),
    }
}

/// The optional twins of the file extractors.  A missing file is `None`.
pub mod optional {
    use super::*;

    /// The path of the spooled file, if one was sent.
    pub fn path(exchange: &Exchange, name: &str) -> Option<PathBuf> {
        super::path(exchange, name).ok()
    }

    /// Reads the spooled file, if one was sent.
    ///
    /// # Errors
    /// Fails with [`HandlerError::Internal`] if the file could not be read.
    pub fn bytes(
        exchange: &Exchange,
        name: &str,
    ) -> impl Future<Output = Result<Option<FileBytes>, HandlerError>> + Send + 'static {
        let location = path(exchange, name);
        async move {
            match location {
                Some(location) => read(location).await.map(Some),
                None => Ok(None),
            }
        }
    }
}
