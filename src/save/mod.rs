use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::sim::{DayStartedEvent, LastTickReport, Simulation};

// ═══════════════════════════════════════════════════════════════════════
// PUBLIC TYPES
// ═══════════════════════════════════════════════════════════════════════

pub const SAVE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File access failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Save has version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
}

/// Where the day-start autosave goes. `None` disables it.
#[derive(Resource, Debug, Clone, Default)]
pub struct AutosaveSettings {
    pub path: Option<PathBuf>,
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Event, Debug, Clone)]
pub struct SaveRequestEvent {
    pub path: PathBuf,
}

#[derive(Event, Debug, Clone)]
pub struct LoadRequestEvent {
    pub path: PathBuf,
}

#[derive(Event, Debug, Clone)]
pub struct SaveCompleteEvent {
    pub path: PathBuf,
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Event, Debug, Clone)]
pub struct LoadCompleteEvent {
    pub path: PathBuf,
    pub success: bool,
    pub error_message: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct SavePlugin;

impl Plugin for SavePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AutosaveSettings>()
            .add_event::<SaveRequestEvent>()
            .add_event::<LoadRequestEvent>()
            .add_event::<SaveCompleteEvent>()
            .add_event::<LoadCompleteEvent>()
            .add_systems(
                Update,
                (handle_load_request, handle_save_request)
                    .chain()
                    .in_set(crate::shared::SimSet::Requests),
            )
            .add_systems(
                Update,
                autosave_on_new_day.in_set(crate::shared::SimSet::Report),
            );
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════

/// Borrowing half of the file format, so saving never clones the state.
#[derive(Serialize)]
struct SaveFileRef<'a> {
    version: u32,
    day: u32,
    state: &'a Simulation,
}

#[derive(Deserialize)]
struct SaveFile {
    version: u32,
    state: Simulation,
}

/// Only the header, so a mismatched version reports as such rather than as
/// a field error deep in the state.
#[derive(Deserialize)]
struct SaveHeader {
    version: u32,
}

/// The whole scheduler state as versioned JSON.
pub fn serialize_state(sim: &Simulation) -> Result<String, SaveError> {
    let file = SaveFileRef {
        version: SAVE_VERSION,
        day: sim.day,
        state: sim,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

pub fn deserialize_state(json: &str) -> Result<Simulation, SaveError> {
    let header: SaveHeader = serde_json::from_str(json)?;
    if header.version != SAVE_VERSION {
        return Err(SaveError::Version {
            found: header.version,
            expected: SAVE_VERSION,
        });
    }
    let file: SaveFile = serde_json::from_str(json)?;
    debug_assert_eq!(file.version, SAVE_VERSION);
    Ok(file.state)
}

// ═══════════════════════════════════════════════════════════════════════
// SAVE / LOAD LOGIC
// ═══════════════════════════════════════════════════════════════════════

/// Writes to a temp file first, then renames over `path`.
pub fn write_save(path: &Path, sim: &Simulation) -> Result<(), SaveError> {
    let json = serialize_state(sim)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_save(path: &Path) -> Result<Simulation, SaveError> {
    let json = fs::read_to_string(path)?;
    deserialize_state(&json)
}

fn handle_save_request(
    mut save_events: EventReader<SaveRequestEvent>,
    mut complete_events: EventWriter<SaveCompleteEvent>,
    sim: Res<Simulation>,
) {
    for ev in save_events.read() {
        let result = write_save(&ev.path, &sim);
        match &result {
            Ok(()) => info!("[Save] Saved day {} to {}", sim.day, ev.path.display()),
            Err(e) => warn!("[Save] Saving to {} FAILED: {}", ev.path.display(), e),
        }
        complete_events.send(SaveCompleteEvent {
            path: ev.path.clone(),
            success: result.is_ok(),
            error_message: result.err().map(|e| e.to_string()),
        });
    }
}

fn handle_load_request(
    mut load_events: EventReader<LoadRequestEvent>,
    mut complete_events: EventWriter<LoadCompleteEvent>,
    mut sim: ResMut<Simulation>,
    mut last: ResMut<LastTickReport>,
) {
    for ev in load_events.read() {
        match read_save(&ev.path) {
            Ok(loaded) => {
                *sim = loaded;
                *last = LastTickReport::default();
                info!("[Save] Loaded day {} from {}", sim.day, ev.path.display());
                complete_events.send(LoadCompleteEvent {
                    path: ev.path.clone(),
                    success: true,
                    error_message: None,
                });
            }
            Err(e) => {
                warn!("[Save] Loading {} FAILED: {}", ev.path.display(), e);
                complete_events.send(LoadCompleteEvent {
                    path: ev.path.clone(),
                    success: false,
                    error_message: Some(e.to_string()),
                });
            }
        }
    }
}

fn autosave_on_new_day(
    mut days: EventReader<DayStartedEvent>,
    settings: Res<AutosaveSettings>,
    mut save_writer: EventWriter<SaveRequestEvent>,
) {
    for ev in days.read() {
        if let Some(path) = &settings.path {
            info!("[Save] Autosaving at the start of day {}", ev.day);
            save_writer.send(SaveRequestEvent { path: path.clone() });
        }
    }
}
