// src/main.rs
mod config;
mod drivers;
mod engine;
mod gui;
mod types;
use anyhow::{anyhow, Context};
use config::{AcquisitionConfig, RenderKind};
use drivers::ExitReason;
use eframe::egui;
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = AcquisitionConfig::load()?;
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("failed to install the Ctrl-C handler")?;
    }
    let reason = match config.render {
        RenderKind::Png => engine::run_headless(&config, &stop)?.reason,
        RenderKind::Gui => run_gui(config, stop)?,
    };
    info!("exit: {reason:?}");
    match reason {
        ExitReason::Failed(message) => Err(anyhow!(message)),
        _ => Ok(()),
    }
}

fn run_gui(config: AcquisitionConfig, stop: Arc<AtomicBool>) -> anyhow::Result<ExitReason> {
    let (tx, rx) = channel();
    let app = gui::OxyscopeApp::new(&config, rx, stop.clone());
    let handle = engine::spawn_thread(config, tx, stop.clone());
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 720.0])
        .with_min_inner_size([800.0, 480.0])
        .with_title("oxyscope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let ui_result = eframe::run_native("oxyscope", options, Box::new(move |_cc| Box::new(app)));
    // the window is gone; make sure the engine stops and releases the port
    stop.store(true, Ordering::SeqCst);
    let reason = handle.join().unwrap_or_else(|_| {
        error!("engine thread panicked");
        ExitReason::Failed("engine thread panicked".into())
    });
    ui_result.map_err(|e| anyhow!("window failed: {e}"))?;
    Ok(reason)
}
