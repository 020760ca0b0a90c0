//! Main application for the YouTube video/playlist downloader GUI

// Command-line / environment configuration
mod config;
// yt-dlp backed video host
mod downloader;
// Download error taxonomy
mod error;
// Video host collaborator trait
mod host;
// Tracing subscriber setup
mod logger;
// Requests, metadata and status text
mod model;
// Side-channel download events
mod progress;
// Background download task
mod task;
// Single-video and playlist workflows
mod workflow;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use config::AppConfig;
use downloader::YtDlp;
use model::{Status, UrlMatching, VideoRequest};
use progress::DownloadEvent;
use task::{DownloadTask, TaskOutcome};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Program entry point: reads configuration, initializes runtime and launches GUI
fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();
    logger::init().context("failed to install logger")?;

    let runtime = RUNTIME.get_or_try_init(Runtime::new)?;
    let binary = downloader::resolve_binary(config.yt_dlp_path.as_deref())?;
    info!("Using yt-dlp at {}", binary.display());

    let app = DownloaderApp::new(
        runtime.handle().clone(),
        Arc::new(YtDlp::new(binary)),
        &config,
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([400.0, 250.0]),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Playlist Downloader",
        options,
        Box::new(|_cc| Box::new(app)),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {e}"))
}

/// A message shown in a modal window
struct Dialog {
    title: &'static str,
    message: String,
}

/// Application state for the GUI
struct DownloaderApp {
    /// Runtime the download tasks are spawned on
    runtime: tokio::runtime::Handle,
    /// Video host shared with the download tasks
    host: Arc<YtDlp>,
    /// How URLs are classified
    url_matching: UrlMatching,
    /// Input field for the YouTube URL
    url_input: String,
    /// Destination folder for downloads
    output_dir: Option<PathBuf>,
    /// Status label text
    status: Status,
    /// Progress of the current video, when its size is known
    progress: Option<f32>,
    /// The download in flight, if any
    active: Option<DownloadTask>,
    /// Open modal, if any
    dialog: Option<Dialog>,
}

impl DownloaderApp {
    fn new(runtime: tokio::runtime::Handle, host: Arc<YtDlp>, config: &AppConfig) -> Self {
        let status = config
            .output_dir
            .clone()
            .map_or(Status::Idle, Status::FolderSelected);

        Self {
            runtime,
            host,
            url_matching: config.url_matching,
            url_input: String::new(),
            output_dir: config.output_dir.clone(),
            status,
            progress: None,
            active: None,
            dialog: None,
        }
    }

    fn show_dialog(&mut self, title: &'static str, message: impl Into<String>) {
        self.dialog = Some(Dialog {
            title,
            message: message.into(),
        });
    }

    fn pick_folder(&mut self) {
        let mut dialog = FileDialog::new();
        if let Some(dir) = &self.output_dir {
            dialog = dialog.set_directory(dir);
        }

        match dialog.pick_folder() {
            Some(dir) => {
                self.status = Status::FolderSelected(dir.clone());
                self.output_dir = Some(dir);
            }
            None => self.status = Status::NoFolder,
        }
    }

    fn start_download(&mut self) {
        if self.url_input.trim().is_empty() {
            self.show_dialog("Error", "Please enter a YouTube URL");
            return;
        }
        // Ensure that the user has selected a download folder
        let Some(output_dir) = self.output_dir.clone() else {
            self.show_dialog("Error", "Please select a download folder");
            return;
        };

        let request = VideoRequest::classify(&self.url_input, self.url_matching);
        info!("Queued {:?} download of {}", request.kind, request.url);

        self.status = Status::Downloading;
        self.progress = None;
        self.active = Some(DownloadTask::spawn(
            &self.runtime,
            Arc::clone(&self.host),
            request,
            output_dir,
        ));
    }

    fn cancel_download(&mut self) {
        if let Some(task) = self.active.take() {
            task.cancel();
            self.status = Status::Cancelled;
            self.progress = None;
        }
    }

    /// Applies pending events and the final result of the running task.
    fn poll_task(&mut self) {
        let Some(task) = self.active.as_mut() else {
            return;
        };

        while let Some(event) = task.next_event() {
            match event {
                DownloadEvent::PlaylistResolved { title, count } => {
                    info!("Playlist {title:?} has {count} videos");
                }
                DownloadEvent::VideoStarted { title, position } => {
                    self.status = Status::DownloadingVideo { title, position };
                    self.progress = None;
                }
                DownloadEvent::Progress { downloaded, total } => {
                    self.progress = progress::fraction(downloaded, total);
                }
                DownloadEvent::VideoFinished { path } => {
                    info!("Saved {}", path.display());
                    self.progress = None;
                }
            }
        }

        let Some(outcome) = task.poll_outcome() else {
            return;
        };
        let kind = task.kind();
        self.active = None;
        self.progress = None;

        match outcome {
            TaskOutcome::Finished(Ok(outcome)) => {
                self.status = Status::finished(kind, Some(&outcome));
            }
            TaskOutcome::Finished(Err(e)) => {
                self.status = Status::finished(kind, None);
                self.show_dialog("Error", e.to_string());
            }
            TaskOutcome::Aborted => {
                warn!("Download task ended without a result");
                self.status = Status::finished(kind, None);
            }
        }
    }

    fn dialog_window(&mut self, ctx: &egui::Context) {
        let Some(dialog) = &self.dialog else {
            return;
        };

        let mut close = false;
        egui::Window::new(dialog.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&dialog.message);
                if ui.button("OK").clicked() {
                    close = true;
                }
            });

        if close {
            self.dialog = None;
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll_task();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(self.dialog.is_none(), |ui| {
                ui.heading("YouTube Video/Playlist Downloader");

                ui.add(
                    egui::TextEdit::singleline(&mut self.url_input)
                        .hint_text("Enter YouTube Video or Playlist URL")
                        .desired_width(f32::INFINITY),
                );

                if ui.button("Select Download Folder").clicked() {
                    self.pick_folder();
                }

                ui.horizontal(|ui| {
                    let idle = self.active.is_none();
                    if ui.add_enabled(idle, egui::Button::new("Download")).clicked() {
                        self.start_download();
                    }
                    if !idle && ui.button("Cancel").clicked() {
                        self.cancel_download();
                    }
                });

                if let Some(fraction) = self.progress {
                    ui.add(egui::ProgressBar::new(fraction).show_percentage());
                }

                ui.label(self.status.to_string());
            });
        });

        self.dialog_window(ctx);

        // Keep polling while a download runs
        if self.active.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
