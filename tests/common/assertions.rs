//! Helpers for inspecting sweep output

use gfi_sweep::Event;
use std::path::Path;
use tokio::sync::broadcast;

/// File names in `dir`, sorted; empty if the directory does not exist
pub fn artifact_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("gfi_"))
        .collect();
    names.sort();
    names
}

/// Drain every event already buffered in `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
