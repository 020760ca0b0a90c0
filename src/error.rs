use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

/// Failures reported by a [`VideoHost`](crate::host::VideoHost).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to launch {program:?}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("yt-dlp exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("unexpected metadata: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Why a single video or a playlist could not be downloaded.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("error getting video: {0}")]
    Metadata(#[source] HostError),
    #[error("no format with an audio channel is available for {title:?}")]
    NoFormat { title: String },
    #[error("error getting video stream: {0}")]
    Stream(#[source] HostError),
    #[error("error {op} file {}: {source}", path.display())]
    FileSystem {
        /// What was being done to the file: creating, writing or saving
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error downloading video {title}: {source}")]
    PlaylistItem {
        title: String,
        #[source]
        source: Box<DownloadError>,
    },
}

impl DownloadError {
    pub(crate) fn file_system(
        op: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::FileSystem { op, path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_item_names_the_failed_video() {
        let err = DownloadError::PlaylistItem {
            title: "Second clip".to_string(),
            source: Box::new(DownloadError::NoFormat {
                title: "Second clip".to_string(),
            }),
        };

        assert!(err.to_string().starts_with("error downloading video Second clip: "));
    }

    #[test]
    fn file_system_error_carries_path() {
        let err = DownloadError::file_system("creating", "/nowhere/a.mp4")(io::Error::from(
            io::ErrorKind::NotFound,
        ));

        assert!(matches!(&err, DownloadError::FileSystem { path, .. } if path.ends_with("a.mp4")));
        assert!(err.to_string().starts_with("error creating file "));
    }

    #[test]
    fn write_failures_are_not_reported_as_create_failures() {
        let err = DownloadError::file_system("writing", "/full/a.mp4")(io::Error::other("disk full"));

        assert!(err.to_string().starts_with("error writing file "));
    }
}
