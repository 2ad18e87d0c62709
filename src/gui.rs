// src/gui.rs
use crate::config::AcquisitionConfig;
use crate::drivers::{ExitReason, PlotData};
use crate::types::EngineMessage;
use eframe::egui;
use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

const MAX_LOG_LINES: usize = 8;

pub struct OxyscopeApp {
    is_running: bool,
    banner: Option<String>,
    exit: Option<ExitReason>,
    last_skip: Option<String>,
    plot: Option<PlotData>,
    settings: String,
    log_messages: Vec<String>,
    rx: Receiver<EngineMessage>,
    stop: Arc<AtomicBool>,
}

impl OxyscopeApp {
    pub fn new(config: &AcquisitionConfig, rx: Receiver<EngineMessage>, stop: Arc<AtomicBool>) -> Self {
        let settings = format!(
            "{:?} source\n{} @ {} baud\n{}-point {} window on {}",
            config.source, config.port, config.baud_rate, config.window_size, config.window, config.channel
        );
        Self {
            is_running: false,
            banner: None,
            exit: None,
            last_skip: None,
            plot: None,
            settings,
            log_messages: vec!["oxyscope ready.".to_owned()],
            rx,
            stop,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > MAX_LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn drain(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                EngineMessage::Log(s) => self.log(&s),
                EngineMessage::Status(b) => self.is_running = b,
                EngineMessage::Banner(s) => {
                    self.log(&format!("device: {s}"));
                    self.banner = Some(s);
                }
                // only the newest frame is worth drawing
                EngineMessage::Plot(plot) => {
                    self.last_skip = None;
                    self.plot = Some(plot);
                }
                EngineMessage::Skipped(reason) => self.last_skip = Some(reason.to_string()),
                EngineMessage::Stopped(reason) => {
                    self.log(&format!("acquisition ended: {reason:?}"));
                    self.is_running = false;
                    self.exit = Some(reason);
                }
            }
        }
    }

    fn draw_plots(&self, ui: &mut egui::Ui) {
        let Some(plot) = &self.plot else {
            ui.label(self.last_skip.as_deref().unwrap_or("Waiting for data..."));
            return;
        };
        ui.columns(2, |cols| {
            cols[0].label(format!("Photodiode readings ({} rows)", plot.rows));
            Plot::new("time_plot")
                .legend(Legend::default())
                .include_y(0.0)
                .include_y(1023.0)
                .x_axis_label("Time (s)")
                .show(&mut cols[0], |plot_ui| {
                    plot_ui.line(
                        Line::new(PlotPoints::new(plot.time.clone()))
                            .name(plot.channel.name())
                            .color(Color32::WHITE),
                    );
                });
            cols[1].label("Fourier transforms");
            match &plot.spectrum {
                Ok(spectrum) => {
                    Plot::new("spectrum_plot")
                        .legend(Legend::default())
                        .include_y(0.0)
                        .x_axis_label("Frequency (Hz)")
                        .show(&mut cols[1], |plot_ui| {
                            if let Some(device) = &spectrum.device {
                                plot_ui.line(
                                    Line::new(PlotPoints::new(device.clone()))
                                        .name("FFT (board)")
                                        .color(Color32::from_rgb(0, 255, 255)),
                                );
                            }
                            plot_ui.line(
                                Line::new(PlotPoints::new(spectrum.local.clone()))
                                    .name("FFT (host)")
                                    .color(Color32::RED),
                            );
                        });
                }
                Err(reason) => {
                    cols[1].label(reason.to_string());
                }
            }
        });
    }
}

impl eframe::App for OxyscopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain();
        // Ctrl-C lands here too
        if self.stop.load(Ordering::SeqCst) && self.exit.is_some() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
        ctx.request_repaint();

        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::SidePanel::left("L").min_width(260.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("oxyscope");
            ui.label("Pulse oximetry");
            ui.separator();
            let (status, color) = if self.is_running {
                ("ACQUIRING", Color32::GREEN)
            } else if self.exit.is_some() {
                ("STOPPED", Color32::YELLOW)
            } else {
                ("STARTING", Color32::GRAY)
            };
            ui.label(egui::RichText::new(status).strong().color(color));
            if let Some(banner) = &self.banner {
                ui.label(egui::RichText::new(banner).small());
            }
            ui.monospace(&self.settings);
            ui.add_space(10.0);
            let stopping = self.stop.load(Ordering::SeqCst);
            if ui
                .add_enabled(!stopping, egui::Button::new("STOP"))
                .clicked()
            {
                self.stop.store(true, Ordering::SeqCst);
                self.log("stop requested");
            }
            if let Some(reason) = &self.last_skip {
                ui.label(egui::RichText::new(reason).color(Color32::YELLOW).small());
            }
            ui.add_space(10.0);
            egui::ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| self.draw_plots(ui));
    }
}
