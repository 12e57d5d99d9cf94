//! Desktop front end for yt-grab

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::{Color32, Visuals};
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

use yt_grab::{
    logging,
    merger::Merger,
    model::{DownloadRequest, DownloadStatus, OutputFormat, WorkerEvent},
    notice::{self, Notice, NoticeKind},
    settings::{AppSettings, Theme},
    worker::DownloadController,
    ytdlp::YtDlpClient,
};

/// Program entry point: sets up logging and the runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // error.log lives next to where the app was started
    let _log_guard = logging::init_tracing(&std::env::current_dir()?);
    logging::install_panic_hook();
    info!("application started");

    // Outlives the window; the controller blocks on it when stopping
    let runtime = Runtime::new()?;

    let settings = AppSettings::load_or_default();
    let controller = DownloadController::new(
        runtime.handle().clone(),
        Arc::new(YtDlpClient::new()),
        Arc::new(Merger::with_default_strategies()),
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("yt-grab")
            .with_inner_size([800.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "yt-grab",
        options,
        Box::new(move |_cc| Box::new(YtGrabApp::new(settings, controller))),
    )?;

    info!("application closed");
    Ok(())
}

/// Application state for the GUI
struct YtGrabApp {
    /// Input field for the video URL
    url_input: String,
    /// Destination folder as typed in the main panel
    download_folder: String,
    /// MP4 or MP3
    selected_format: OutputFormat,
    /// Persisted preferences
    settings: AppSettings,
    /// Single download slot
    controller: DownloadController,
    status: DownloadStatus,
    /// 0 to 100
    progress: f32,
    status_text: String,
    /// Last successfully written file
    last_output: Option<PathBuf>,
    notice: Option<Notice>,
    show_settings: bool,
}

impl YtGrabApp {
    fn new(settings: AppSettings, controller: DownloadController) -> Self {
        Self {
            url_input: String::new(),
            download_folder: settings.download_dir.display().to_string(),
            selected_format: OutputFormat::default(),
            settings,
            controller,
            status: DownloadStatus::Idle,
            progress: 0.0,
            status_text: String::new(),
            last_output: None,
            notice: None,
            show_settings: false,
        }
    }

    fn start_download(&mut self) {
        let url = self.url_input.trim().to_string();
        if url.is_empty() {
            self.notice = Some(Notice::new(NoticeKind::Warning, "Warning", "Please enter a URL."));
            return;
        }

        let request = DownloadRequest {
            url,
            destination: PathBuf::from(self.download_folder.trim()),
            format: self.selected_format,
            bypass: self.settings.bypass_token(),
        };
        match self.controller.start(request) {
            Ok(()) => {
                self.status = DownloadStatus::Downloading;
                self.progress = 0.0;
                self.status_text = "Preparing...".to_string();
                self.last_output = None;
            }
            Err(e) => {
                warn!(error = %e, "download not started");
                self.notice = Some(Notice::new(NoticeKind::Warning, "Warning", e.to_string()));
            }
        }
    }

    /// Applies everything the worker sent since the last frame
    fn drain_worker_events(&mut self) {
        for event in self.controller.poll() {
            match event {
                WorkerEvent::Progress(p) => {
                    self.progress = p.percent;
                    self.status_text = p.message;
                }
                WorkerEvent::Finished(result) => {
                    self.status_text = notice::status_text(&result);
                    self.notice = Some(Notice::for_result(&result));
                    if result.success {
                        self.status = DownloadStatus::Done;
                        self.progress = 100.0;
                        self.last_output = result.path;
                    } else {
                        self.status = DownloadStatus::Failed;
                    }
                }
            }
        }
    }

    fn apply_theme(&self, ctx: &egui::Context, frame: &Frame) {
        let visuals = match self.settings.theme {
            Theme::Light => Visuals::light(),
            Theme::Dark => Visuals::dark(),
            Theme::Auto => frame
                .info()
                .system_theme
                .map(|t| t.egui_visuals())
                .unwrap_or_else(Visuals::dark),
        };
        if ctx.style().visuals.dark_mode != visuals.dark_mode {
            ctx.set_visuals(visuals);
        }
    }

    fn save_settings(&mut self) {
        self.settings.download_dir = PathBuf::from(self.download_folder.trim());
        if let Err(e) = self.settings.save() {
            error!(error = %e, "could not save settings");
            self.notice = Some(Notice::new(NoticeKind::Error, "Failed", notice::notice_text(&e.to_string())));
        }
    }

    fn settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut save = false;
        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("Download");
                ui.horizontal(|ui| {
                    ui.label("Save location:");
                    ui.text_edit_singleline(&mut self.download_folder);
                    if ui.button("Browse…").clicked() {
                        self.pick_folder();
                    }
                });
                ui.separator();

                ui.heading("YouTube");
                ui.label("Bot-check bypass (both fields are needed)");
                ui.horizontal(|ui| {
                    ui.label("PO token:");
                    ui.add(egui::TextEdit::singleline(&mut self.settings.po_token).password(true));
                });
                ui.horizontal(|ui| {
                    ui.label("Visitor data:");
                    ui.add(egui::TextEdit::singleline(&mut self.settings.visitor_data).password(true));
                });
                ui.separator();

                ui.heading("App");
                egui::ComboBox::from_label("Theme")
                    .selected_text(self.settings.theme.label())
                    .show_ui(ui, |ui| {
                        for theme in Theme::ALL {
                            ui.selectable_value(&mut self.settings.theme, theme, theme.label());
                        }
                    });
                ui.add_space(8.0);
                if ui.button("Save").clicked() {
                    save = true;
                }
            });
        if save {
            self.save_settings();
        }
        self.show_settings = open;
    }

    fn pick_folder(&mut self) {
        if let Some(folder) = FileDialog::new().set_directory(&self.download_folder).pick_folder() {
            self.download_folder = folder.display().to_string();
        }
    }

    fn notice_area(&mut self, ctx: &egui::Context) {
        if self.notice.as_ref().is_some_and(|n| n.is_expired(Instant::now())) {
            self.notice = None;
        }
        let Some(notice) = &self.notice else {
            return;
        };
        let color = match notice.kind {
            NoticeKind::Success => Color32::from_rgb(60, 170, 90),
            NoticeKind::Warning => Color32::from_rgb(220, 160, 40),
            NoticeKind::Error => Color32::from_rgb(210, 60, 60),
        };
        egui::Area::new(egui::Id::new("notice"))
            .anchor(egui::Align2::RIGHT_TOP, [-12.0, 12.0])
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_max_width(320.0);
                    ui.colored_label(color, notice.title);
                    ui.label(&notice.text);
                });
            });
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for YtGrabApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut Frame) {
        self.apply_theme(ctx, frame);

        // 1️⃣ Poll the worker channel
        self.drain_worker_events();

        // 2️⃣ Top bar with the settings toggle
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("YouTube Downloader");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("⚙ Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                });
            });
        });

        // 3️⃣ Main panel: URL, folder, format, Download button and progress
        egui::CentralPanel::default().show(ctx, |ui| {
            let busy = self.controller.is_busy();

            ui.label("Paste YouTube video URL:");
            ui.add_enabled(
                !busy,
                egui::TextEdit::singleline(&mut self.url_input).hint_text("https://youtu.be/..."),
            );

            ui.horizontal(|ui| {
                ui.label("Download folder:");
                ui.add_enabled(!busy, egui::TextEdit::singleline(&mut self.download_folder));
                if ui.add_enabled(!busy, egui::Button::new("Browse…")).clicked() {
                    self.pick_folder();
                }
            });

            ui.add_enabled_ui(!busy, |ui| {
                egui::ComboBox::from_label("Format")
                    .selected_text(self.selected_format.to_string())
                    .show_ui(ui, |ui| {
                        for format in OutputFormat::ALL {
                            ui.selectable_value(&mut self.selected_format, format, format.to_string());
                        }
                    });
            });

            ui.add_space(8.0);
            if ui.add_enabled(!busy, egui::Button::new("⬇ Download")).clicked() {
                self.start_download();
            }
            ui.add_space(8.0);

            if matches!(self.status, DownloadStatus::Downloading) {
                ui.add(egui::ProgressBar::new(self.progress / 100.0).show_percentage());
            }
            if !self.status_text.is_empty() {
                let color = match self.status {
                    DownloadStatus::Failed => Color32::from_rgb(210, 60, 60),
                    _ => ui.visuals().text_color(),
                };
                ui.colored_label(color, &self.status_text);
            }

            // When done, offer to open the destination folder
            if let (DownloadStatus::Done, Some(output)) = (self.status, &self.last_output) {
                if ui.button("Open Folder").clicked() {
                    let folder = output
                        .parent()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| PathBuf::from(&self.download_folder));
                    std::thread::spawn(move || {
                        #[cfg(target_os = "windows")]
                        {
                            let _ = std::process::Command::new("explorer").arg(folder).spawn();
                        }
                        #[cfg(target_os = "macos")]
                        {
                            let _ = std::process::Command::new("open").arg(folder).spawn();
                        }
                        #[cfg(all(unix, not(target_os = "macos")))]
                        {
                            let _ = std::process::Command::new("xdg-open").arg(folder).spawn();
                        }
                    });
                }
            }
        });

        if self.show_settings {
            self.settings_window(ctx);
        }
        self.notice_area(ctx);

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
