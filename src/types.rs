// src/types.rs
use crate::drivers::{ExitReason, PlotData, SkipReason};

// engine thread -> GUI
#[derive(Clone, Debug)]
pub enum EngineMessage {
    Log(String),
    // acquisition running or not
    Status(bool),
    // handshake greeting from the board
    Banner(String),
    Plot(PlotData),
    Skipped(SkipReason),
    Stopped(ExitReason),
}
