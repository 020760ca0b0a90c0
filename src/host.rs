//! The video-hosting collaborator the download workflow is written against.

use std::{
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use crate::{
    error::HostError,
    model::{Playlist, VideoFormat, VideoMetadata},
};

type Completion = Pin<Box<dyn Future<Output = Result<(), HostError>> + Send>>;

/// Read-once byte stream of one video format.
///
/// Some producers only know whether they succeeded after the last byte was
/// read; [`VideoStream::finish`] reports that once the stream is drained.
pub struct VideoStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    completion: Option<Completion>,
}

impl VideoStream {
    pub fn new(reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            reader: Box::pin(reader),
            completion: None,
        }
    }

    #[must_use]
    pub fn with_completion(
        mut self,
        completion: impl Future<Output = Result<(), HostError>> + Send + 'static,
    ) -> Self {
        self.completion = Some(Box::pin(completion));
        self
    }

    pub async fn finish(self) -> Result<(), HostError> {
        match self.completion {
            Some(completion) => completion.await,
            None => Ok(()),
        }
    }
}

impl AsyncRead for VideoStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Resolve a video URL into its metadata and format list.
    async fn fetch_video(&self, url: &str) -> Result<VideoMetadata, HostError>;

    /// Open a byte stream for one of the video's formats.
    async fn open_stream(
        &self,
        video: &VideoMetadata,
        format: &VideoFormat,
    ) -> Result<VideoStream, HostError>;

    /// Resolve a playlist URL into its ordered members.
    async fn fetch_playlist(&self, url: &str) -> Result<Playlist, HostError>;
}
