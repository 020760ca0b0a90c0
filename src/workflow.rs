//! Single-video and playlist download, plus the dispatcher the UI calls.

use std::path::{Path, PathBuf};

use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, info, warn};

use crate::{
    error::{DownloadError, HostError},
    host::{VideoHost, VideoStream},
    model::{DownloadOutcome, RequestKind, VideoFormat, VideoRequest},
    progress::DownloadEvent,
};

const CHUNK_SIZE: usize = 64 * 1024;

/// Room left for ".mp4.part" under the usual 255-byte name limit
const MAX_STEM_BYTES: usize = 200;

const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[cfg(target_os = "windows")]
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// First format carrying an audio channel.
pub fn select_format(formats: &[VideoFormat]) -> Option<&VideoFormat> {
    formats.iter().find(|f| f.has_audio)
}

/// Turns a video title into a file stem: spaces become underscores and
/// filesystem-reserved characters are replaced.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            ' ' => '_',
            c if RESERVED_CHARS.contains(&c) || c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = truncate_bytes(&replaced, MAX_STEM_BYTES).trim_matches('.');
    if trimmed.is_empty() {
        return "video".to_string();
    }

    #[cfg(target_os = "windows")]
    if RESERVED_NAMES
        .iter()
        .any(|name| trimmed.eq_ignore_ascii_case(name))
    {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub fn output_path(output_dir: &Path, title: &str) -> PathBuf {
    output_dir.join(format!("{}.mp4", sanitize_title(title)))
}

/// Downloads one video into `output_dir`, overwriting any previous file of
/// the same name, and returns the written path.
pub async fn download_video<H>(
    host: &H,
    url: &str,
    output_dir: &Path,
    events: &UnboundedSender<DownloadEvent>,
) -> Result<PathBuf, DownloadError>
where
    H: VideoHost + ?Sized,
{
    let video = host.fetch_video(url).await.map_err(DownloadError::Metadata)?;
    debug!(
        "Resolved {} ({:?}) with {} formats",
        video.id,
        video.title,
        video.formats.len()
    );

    let format = select_format(&video.formats).ok_or_else(|| DownloadError::NoFormat {
        title: video.title.clone(),
    })?;
    debug!(
        "Using format {} ({}, video: {}) for {:?}",
        format.id,
        format.extension.as_deref().unwrap_or("?"),
        format.has_video,
        video.title
    );

    let stream = host
        .open_stream(&video, format)
        .await
        .map_err(DownloadError::Stream)?;

    // The previous file is only replaced once the stream has completed cleanly.
    let path = output_path(output_dir, &video.title);
    let partial = path.with_extension("mp4.part");
    let downloaded = match save_stream(stream, &partial, format.size, events).await {
        Ok(downloaded) => downloaded,
        Err(e) => {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }
    };
    fs::rename(&partial, &path)
        .await
        .map_err(DownloadError::file_system("saving", &path))?;

    info!("Downloaded {:?} ({downloaded} bytes) to {}", video.title, path.display());
    Ok(path)
}

async fn save_stream(
    mut stream: VideoStream,
    path: &Path,
    total: Option<u64>,
    events: &UnboundedSender<DownloadEvent>,
) -> Result<u64, DownloadError> {
    let mut file = File::create(path)
        .await
        .map_err(DownloadError::file_system("creating", path))?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded = 0u64;
    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| DownloadError::Stream(HostError::Io(e)))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .await
            .map_err(DownloadError::file_system("writing", path))?;
        downloaded += n as u64;
        let _ = events.send(DownloadEvent::Progress { downloaded, total });
    }
    file.flush()
        .await
        .map_err(DownloadError::file_system("writing", path))?;

    stream.finish().await.map_err(DownloadError::Stream)?;
    Ok(downloaded)
}

/// Downloads every playlist member in order, stopping at the first failure.
/// Files written before the failure are kept.
pub async fn download_playlist<H>(
    host: &H,
    url: &str,
    output_dir: &Path,
    events: &UnboundedSender<DownloadEvent>,
) -> Result<usize, DownloadError>
where
    H: VideoHost + ?Sized,
{
    let playlist = host
        .fetch_playlist(url)
        .await
        .map_err(DownloadError::Metadata)?;
    let count = playlist.members.len();
    info!("Found {count} videos in playlist {}", playlist.id);
    let _ = events.send(DownloadEvent::PlaylistResolved {
        title: playlist.title.clone(),
        count,
    });

    for (index, member) in playlist.members.iter().enumerate() {
        info!("Downloading video: {}", member.title);
        let _ = events.send(DownloadEvent::VideoStarted {
            title: member.title.clone(),
            position: (index + 1, count),
        });

        let path = download_video(host, &member.watch_url(), output_dir, events)
            .await
            .map_err(|source| {
                warn!("Playlist stopped at {:?}: {source}", member.title);
                DownloadError::PlaylistItem {
                    title: member.title.clone(),
                    source: Box::new(source),
                }
            })?;
        let _ = events.send(DownloadEvent::VideoFinished { path });
    }

    Ok(count)
}

/// Runs the playlist or single-video workflow depending on how the request was classified.
pub async fn dispatch<H>(
    host: &H,
    request: &VideoRequest,
    output_dir: &Path,
    events: &UnboundedSender<DownloadEvent>,
) -> Result<DownloadOutcome, DownloadError>
where
    H: VideoHost + ?Sized,
{
    match request.kind {
        RequestKind::Playlist => download_playlist(host, &request.url, output_dir, events)
            .await
            .map(|count| DownloadOutcome::Playlist { count }),
        RequestKind::Video => {
            let path = download_video(host, &request.url, output_dir, events).await?;
            let _ = events.send(DownloadEvent::VideoFinished { path: path.clone() });
            Ok(DownloadOutcome::Video(path))
        }
    }
}
