use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use rust_embed::RustEmbed;
use serde::Deserialize;
use tokio::{io::AsyncReadExt, process::Command};
use tracing::{debug, trace};

use crate::{
    error::HostError,
    host::{VideoHost, VideoStream},
    model::{Playlist, PlaylistMember, VideoFormat, VideoMetadata},
};

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

const BINARY: &str = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };

/// Picks the yt-dlp executable: the configured one, else a bundled copy
/// extracted to the temp dir, else whatever `yt-dlp` resolves to on `PATH`.
pub fn resolve_binary(configured: Option<&Path>) -> Result<PathBuf, HostError> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    let Some(data) = Asset::get(BINARY) else {
        debug!("No bundled {BINARY}, using PATH");
        return Ok(PathBuf::from(BINARY));
    };

    let tmp = std::env::temp_dir().join(BINARY);
    if !tmp.exists() {
        debug!("Extracting bundled {BINARY} to {}", tmp.display());
        let mut f = File::create(&tmp)?;
        f.write_all(&data.data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))?;
        }
    }
    Ok(tmp)
}

/// [`VideoHost`] backed by the yt-dlp command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    async fn dump_json(&self, args: &[&str], url: &str) -> Result<Vec<u8>, HostError> {
        let mut cmd = self.command();
        cmd.arg("--dump-single-json")
            .arg("--no-warnings")
            .args(args)
            .arg("--")
            .arg(url);
        debug!("Running cmd: {:?}", &cmd);

        let output = cmd.output().await.map_err(|source| HostError::Launch {
            program: self.binary.clone(),
            source,
        })?;
        trace!("yt-dlp stderr: {}", String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(HostError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl VideoHost for YtDlp {
    async fn fetch_video(&self, url: &str) -> Result<VideoMetadata, HostError> {
        let json = self.dump_json(&["--no-playlist"], url).await?;
        parse_video(&json, url)
    }

    async fn open_stream(
        &self,
        video: &VideoMetadata,
        format: &VideoFormat,
    ) -> Result<VideoStream, HostError> {
        let mut cmd = self.command();
        cmd.args(["--quiet", "--no-warnings", "--no-part", "--no-playlist"])
            .args(["-f", format.id.as_str()])
            .args(["-o", "-"])
            .arg("--")
            .arg(&video.url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Running cmd: {:?}", &cmd);

        let mut child = cmd.spawn().map_err(|source| HostError::Launch {
            program: self.binary.clone(),
            source,
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stderr was not captured"))?;

        // Drained concurrently so a chatty child never blocks on a full pipe.
        let stderr_reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        });

        Ok(VideoStream::new(stdout).with_completion(async move {
            let status = child.wait().await?;
            let stderr = stderr_reader.await.map_err(std::io::Error::other)??;
            trace!("yt-dlp stderr: {}", String::from_utf8_lossy(&stderr));

            if status.success() {
                Ok(())
            } else {
                Err(HostError::Failed {
                    status,
                    stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
                })
            }
        }))
    }

    async fn fetch_playlist(&self, url: &str) -> Result<Playlist, HostError> {
        let json = self.dump_json(&["--flat-playlist"], url).await?;
        parse_playlist(&json)
    }
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    id: String,
    title: String,
    webpage_url: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    ext: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

fn has_codec(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if c != "none")
}

impl From<RawFormat> for VideoFormat {
    fn from(raw: RawFormat) -> Self {
        Self {
            has_audio: has_codec(raw.acodec.as_deref()),
            has_video: has_codec(raw.vcodec.as_deref()),
            size: raw
                .filesize
                .or(raw.filesize_approx)
                .filter(|s| *s > 0.0)
                .map(|s| s as u64),
            extension: raw.ext,
            id: raw.format_id,
        }
    }
}

fn parse_video(json: &[u8], requested_url: &str) -> Result<VideoMetadata, HostError> {
    let raw: RawVideo = serde_json::from_slice(json)?;

    Ok(VideoMetadata {
        id: raw.id,
        title: raw.title,
        url: raw.webpage_url.unwrap_or_else(|| requested_url.to_string()),
        formats: raw.formats.into_iter().map(VideoFormat::from).collect(),
    })
}

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    id: String,
    title: Option<String>,
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
}

fn parse_playlist(json: &[u8]) -> Result<Playlist, HostError> {
    let raw: RawPlaylist = serde_json::from_slice(json)?;

    let members = raw
        .entries
        .into_iter()
        .filter_map(|entry| {
            let id = entry.id?;
            let title = entry.title.unwrap_or_else(|| id.clone());
            Some(PlaylistMember { id, title })
        })
        .collect();

    Ok(Playlist {
        id: raw.id,
        title: raw.title,
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_JSON: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "acodec": "none", "vcodec": "none"},
            {"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "filesize": 3433514},
            {"format_id": "18", "ext": "mp4", "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "filesize_approx": 8795000.5},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028"}
        ]
    }"#;

    #[test]
    fn parses_video_formats_in_order() {
        let video = parse_video(VIDEO_JSON.as_bytes(), "https://youtu.be/dQw4w9WgXcQ").unwrap();

        assert_eq!(video.id, "dQw4w9WgXcQ");
        assert_eq!(video.title, "Never Gonna Give You Up");
        assert_eq!(video.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");

        let ids: Vec<_> = video.formats.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["sb0", "140", "18", "137"]);

        assert!(!video.formats[0].has_audio);
        assert!(video.formats[1].has_audio && !video.formats[1].has_video);
        assert_eq!(video.formats[1].size, Some(3_433_514));
        assert_eq!(video.formats[2].size, Some(8_795_000));
        assert!(!video.formats[3].has_audio && video.formats[3].has_video);
    }

    #[test]
    fn video_without_webpage_url_keeps_requested_url() {
        let json = r#"{"id": "x", "title": "t"}"#;
        let video = parse_video(json.as_bytes(), "https://youtu.be/x").unwrap();

        assert_eq!(video.url, "https://youtu.be/x");
        assert!(video.formats.is_empty());
    }

    #[test]
    fn parses_flat_playlist() {
        let json = r#"{
            "_type": "playlist",
            "id": "PLabc",
            "title": "Road trip",
            "entries": [
                {"_type": "url", "id": "a1", "title": "First"},
                {"_type": "url", "id": "b2", "title": null},
                {"_type": "url", "title": "No id"},
                {"_type": "url", "id": "c3", "title": "Third"}
            ]
        }"#;
        let playlist = parse_playlist(json.as_bytes()).unwrap();

        assert_eq!(playlist.title.as_deref(), Some("Road trip"));
        let members: Vec<_> = playlist
            .members
            .iter()
            .map(|m| (m.id.as_str(), m.title.as_str()))
            .collect();
        assert_eq!(members, [("a1", "First"), ("b2", "b2"), ("c3", "Third")]);
    }

    #[test]
    fn rejects_garbage_metadata() {
        assert!(matches!(
            parse_video(b"ERROR: not json", "u"),
            Err(HostError::Parse(_))
        ));
    }

    #[test]
    fn configured_binary_wins() {
        let path = resolve_binary(Some(Path::new("/opt/bin/yt-dlp"))).unwrap();
        assert_eq!(path, PathBuf::from("/opt/bin/yt-dlp"));
    }

    #[cfg(unix)]
    mod script {
        use std::{os::unix::fs::PermissionsExt, time::Duration};

        use tokio::sync::mpsc::unbounded_channel;

        use super::*;
        use crate::{error::DownloadError, workflow::download_video};

        const URL: &str = "https://www.youtube.com/watch?v=abc";

        /// Writes a stand-in yt-dlp that answers metadata queries with one
        /// audio format and runs `stream_body` for the download itself.
        fn fake_yt_dlp(dir: &Path, stream_body: &str) -> YtDlp {
            let script = format!(
                r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "--dump-single-json" ]; then
    printf '%s' '{{"id":"abc","title":"Clip","formats":[{{"format_id":"18","ext":"mp4","acodec":"mp4a.40.2","vcodec":"avc1"}}]}}'
    exit 0
  fi
done
{stream_body}
"#
            );
            let path = dir.join("yt-dlp");
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            YtDlp::new(path)
        }

        #[tokio::test]
        async fn streams_stdout_to_the_file() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let host = fake_yt_dlp(bin.path(), "printf payload");
            let (tx, _rx) = unbounded_channel();

            let path = download_video(&host, URL, out.path(), &tx).await.unwrap();

            assert_eq!(path, out.path().join("Clip.mp4"));
            assert_eq!(std::fs::read(path).unwrap(), b"payload");
        }

        #[tokio::test]
        async fn non_zero_exit_is_a_stream_error_and_keeps_the_old_file() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let existing = out.path().join("Clip.mp4");
            std::fs::write(&existing, b"previous good download").unwrap();
            let host = fake_yt_dlp(
                bin.path(),
                "echo 'ERROR: Requested format is not available' >&2\nexit 1",
            );
            let (tx, _rx) = unbounded_channel();

            let err = download_video(&host, URL, out.path(), &tx).await.unwrap_err();

            assert!(matches!(
                &err,
                DownloadError::Stream(HostError::Failed { stderr, .. })
                    if stderr.contains("Requested format is not available")
            ));
            assert_eq!(std::fs::read(&existing).unwrap(), b"previous good download");
            assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
        }

        #[tokio::test]
        async fn failure_leaves_no_file_behind() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let host = fake_yt_dlp(bin.path(), "printf partial\nexit 2");
            let (tx, _rx) = unbounded_channel();

            let err = download_video(&host, URL, out.path(), &tx).await.unwrap_err();

            assert!(matches!(err, DownloadError::Stream(_)));
            assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn noisy_stderr_does_not_stall_the_stream() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let host = fake_yt_dlp(
                bin.path(),
                "head -c 200000 /dev/zero | tr '\\0' x >&2\nprintf payload",
            );
            let (tx, _rx) = unbounded_channel();

            let path = tokio::time::timeout(
                Duration::from_secs(10),
                download_video(&host, URL, out.path(), &tx),
            )
            .await
            .expect("download stalled")
            .unwrap();

            assert_eq!(std::fs::read(path).unwrap(), b"payload");
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let host = YtDlp::new("/definitely/not/here/yt-dlp");
        let err = host.fetch_video("https://youtu.be/x").await.unwrap_err();

        assert!(matches!(err, HostError::Launch { .. }));
    }
}
