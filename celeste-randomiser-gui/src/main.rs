use eframe::egui;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use celeste_randomiser_core::{run as run_randomiser, RandomiserSettings, RunEvent};

mod config;

use config::{load_config, save_config, GuiConfig};

const BG_COLOR: egui::Color32 = egui::Color32::from_rgb(0x1d, 0x1f, 0x33);
const FG_COLOR: egui::Color32 = egui::Color32::from_rgb(0xc2, 0xc9, 0xff);
const BUTTON_COLOR: egui::Color32 = egui::Color32::from_rgb(0x3a, 0x3d, 0x5f);
const HIGHLIGHT_COLOR: egui::Color32 = egui::Color32::from_rgb(0xff, 0x99, 0xff);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Notice {
    Error(String),
    Complete(String),
}

struct RandomiserApp {
    output_path: String,
    passes_text: String,

    progress: f32,
    is_running: bool,
    log: String,
    events: Option<mpsc::Receiver<RunEvent>>,
    notice: Option<Notice>,
}

impl RandomiserApp {
    fn new(cfg: GuiConfig) -> Self {
        Self {
            output_path: cfg.output_path,
            passes_text: cfg.passes,
            progress: 0.0,
            is_running: false,
            log: String::new(),
            events: None,
            notice: None,
        }
    }

    fn push_log(&mut self, line: &str) {
        if !self.log.is_empty() {
            self.log.push('\n');
        }
        self.log.push_str(line);
    }

    /// Validates the inputs and hands the run to a worker thread.
    fn start(&mut self) {
        let settings = match RandomiserSettings::from_inputs(&self.output_path, &self.passes_text) {
            Ok(settings) => settings,
            Err(err) => {
                self.notice = Some(Notice::Error(err.to_string()));
                return;
            }
        };

        save_config(&GuiConfig {
            output_path: self.output_path.clone(),
            passes: self.passes_text.clone(),
        });

        let (tx, rx) = mpsc::channel();
        self.events = Some(rx);
        self.is_running = true;
        self.progress = 0.0;
        self.push_log(&format!(
            "Randomising into {} ({} pass(es))...",
            settings.output_path.display(),
            settings.passes
        ));

        thread::spawn(move || {
            let mut sink = tx.clone();
            let event = match run_randomiser(settings, &mut sink) {
                Ok(summary) => RunEvent::Finished(summary),
                Err(err) => RunEvent::Failed(err.to_string()),
            };
            let _ = tx.send(event);
        });
    }

    fn handle_event(&mut self, event: RunEvent) {
        match event {
            RunEvent::Stage(stage) => self.push_log(&stage.to_string()),
            RunEvent::Progress(percent) => self.progress = percent.clamp(0.0, 100.0),
            RunEvent::Completed(archive) => {
                self.notice = Some(Notice::Complete(format!(
                    "Textures have been randomized and the mod has been created successfully!\n{}",
                    archive.display()
                )));
            }
            RunEvent::Finished(summary) => {
                self.is_running = false;
                self.events = None;
                self.push_log(&format!(
                    "Done: {} file(s) in {} folder(s), seed {}.",
                    summary.files, summary.directories, summary.seed
                ));
            }
            RunEvent::Failed(message) => {
                self.is_running = false;
                self.events = None;
                self.push_log(&format!("Error: {message}"));
                self.notice = Some(Notice::Error(message));
            }
        }
    }

    fn drain_events(&mut self) {
        loop {
            let next = match self.events.as_ref() {
                Some(rx) => rx.try_recv(),
                None => return,
            };
            match next {
                Ok(event) => self.handle_event(event),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    if self.is_running {
                        self.handle_event(RunEvent::Failed(
                            "The randomiser stopped unexpectedly.".to_string(),
                        ));
                    }
                    self.events = None;
                    return;
                }
            }
        }
    }

    fn show_notice(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.notice.clone() else {
            return;
        };
        let (title, message) = match &notice {
            Notice::Error(msg) => ("Error", msg.as_str()),
            Notice::Complete(msg) => ("Complete", msg.as_str()),
        };

        let mut close = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                ui.add_space(6.0);
                if ui.button("OK").clicked() {
                    close = true;
                }
            });
        if close {
            self.notice = None;
        }
    }
}

impl eframe::App for RandomiserApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            let modal_open = self.notice.is_some();
            ui.add_enabled_ui(!modal_open, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Select Mod Output Directory:");
                    ui.add(egui::TextEdit::singleline(&mut self.output_path).desired_width(320.0));
                    if ui.button("Browse").clicked() {
                        let mut dialog = rfd::FileDialog::new();
                        if !self.output_path.trim().is_empty() {
                            dialog = dialog.set_directory(self.output_path.trim());
                        }
                        if let Some(path) = dialog.pick_folder() {
                            self.output_path = path.display().to_string();
                        }
                    }
                });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    ui.label("Number of Times to Randomize (1-4):");
                    ui.add(egui::TextEdit::singleline(&mut self.passes_text).desired_width(40.0));
                });

                ui.add_space(8.0);
                ui.add(
                    egui::ProgressBar::new(self.progress / 100.0)
                        .show_percentage()
                        .fill(HIGHLIGHT_COLOR),
                );

                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    if ui.add_enabled(!self.is_running, egui::Button::new("Go")).clicked() {
                        self.start();
                    }
                });
            });

            ui.separator();
            ui.label("Log:");
            egui::ScrollArea::vertical()
                .id_source("log_scroll")
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    ui.monospace(&self.log);
                });
        });

        self.show_notice(ctx);

        if self.is_running {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

fn celeste_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(FG_COLOR);
    visuals.panel_fill = BG_COLOR;
    visuals.window_fill = BG_COLOR;
    visuals.extreme_bg_color = BUTTON_COLOR;
    visuals.selection.bg_fill = HIGHLIGHT_COLOR;
    visuals.widgets.inactive.weak_bg_fill = BUTTON_COLOR;
    visuals.widgets.hovered.weak_bg_fill = HIGHLIGHT_COLOR;
    visuals
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Celeste Texture Randomizer")
            .with_inner_size([640.0, 360.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Celeste Texture Randomizer",
        native_options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(celeste_visuals());
            Box::new(RandomiserApp::new(load_config()))
        }),
    )
}
