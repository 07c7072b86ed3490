use eframe::egui;
use std::collections::HashMap;
use tokio::sync::mpsc;
use vidgrab_core::{
    JobHandle, JobId, JobUpdate, Mode, StatusBoard, Submitter, YtDlp, status::JobState,
};

/// 下载表单
pub struct VidGrabApp {
    submitter: Submitter<YtDlp>,
    updates: mpsc::UnboundedReceiver<JobUpdate>,
    board: StatusBoard,
    handles: HashMap<JobId, JobHandle>,
    choices: Vec<String>,

    url: String,
    mode: Mode,
    quality: String,
    destination: String,
}

impl VidGrabApp {
    pub fn new(
        submitter: Submitter<YtDlp>,
        updates: mpsc::UnboundedReceiver<JobUpdate>,
        mode: Mode,
        destination: String,
    ) -> Self {
        let choices = submitter
            .destinations()
            .choices()
            .map(str::to_string)
            .collect();
        Self {
            submitter,
            updates,
            board: StatusBoard::new(),
            handles: HashMap::new(),
            choices,
            url: String::new(),
            mode,
            quality: String::new(),
            destination,
        }
    }

    fn start_download(&mut self) {
        match self
            .submitter
            .submit(&self.url, self.mode, &self.quality, &self.destination)
        {
            Ok(handle) => {
                self.handles.insert(handle.id(), handle);
            }
            Err(e) => {
                tracing::warn!("download not started: {e}");
                self.board.set_notice(e.to_string());
            }
        }
    }

    fn form(&mut self, ui: &mut egui::Ui) {
        ui.label("Video URL");
        ui.add(
            egui::TextEdit::singleline(&mut self.url)
                .hint_text("https://youtube.com/...")
                .desired_width(f32::INFINITY),
        );

        ui.label("Mode");
        egui::ComboBox::from_id_salt("mode")
            .selected_text(self.mode.label())
            .show_ui(ui, |ui| {
                for mode in Mode::ALL {
                    ui.selectable_value(&mut self.mode, mode, mode.label());
                }
            });

        ui.label("Quality (video: best/720/1080 | audio: 128/192/320)");
        ui.add(
            egui::TextEdit::singleline(&mut self.quality)
                .hint_text("Leave empty for best")
                .desired_width(f32::INFINITY),
        );

        ui.label("Save to");
        egui::ComboBox::from_id_salt("destination")
            .selected_text(self.destination.as_str())
            .show_ui(ui, |ui| {
                for choice in &self.choices {
                    ui.selectable_value(&mut self.destination, choice.clone(), choice.as_str());
                }
            });

        ui.add_space(8.0);
        if ui.button("Download").clicked() {
            self.start_download();
        }
    }

    fn status(&mut self, ui: &mut egui::Ui) {
        let (text, percent) = self.board.headline();
        ui.add(egui::ProgressBar::new(percent / 100.0).show_percentage());
        ui.label(text);

        if self.board.is_empty() {
            return;
        }

        ui.separator();
        for (id, status) in self.board.iter() {
            ui.horizontal(|ui| {
                ui.monospace(id.short());
                ui.add(
                    egui::ProgressBar::new(status.percent / 100.0)
                        .desired_width(120.0)
                        .show_percentage(),
                );
                let text = match status.state {
                    JobState::Failed => egui::RichText::new(&status.text).color(ui.visuals().error_fg_color),
                    _ => egui::RichText::new(&status.text),
                };
                ui.label(text);
                if let Some(handle) = self.handles.get(&id)
                    && !status.is_finished()
                    && ui.small_button("Cancel").clicked()
                {
                    handle.cancel();
                }
            });
        }

        if ui.button("Clear finished").clicked() {
            self.board.clear_finished();
        }
    }
}

impl eframe::App for VidGrabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.board.drain(&mut self.updates) > 0 {
            let board = &self.board;
            self.handles
                .retain(|id, _| board.get(*id).is_none_or(|status| !status.is_finished()));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Video Downloader");
            ui.add_space(8.0);
            self.form(ui);
            ui.add_space(8.0);
            self.status(ui);
        });
    }
}
