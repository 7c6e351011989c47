//! Farming domain — the per-zone task queue and the farmer who works it.
//!
//! Input collaborators send `TaskRequestEvent` / `CancelTaskAtEvent`; this
//! plugin turns them into queue operations on the simulation and reports what
//! happened. Task completion is reported after each tick.

use bevy::prelude::*;

use crate::shared::*;
use crate::sim::{LastTickReport, Simulation};

pub mod farmer;
pub mod tasks;

pub use farmer::{base_duration, Farmer, FarmerOutcome, FarmerState, BASKET_CAPACITY, FARMER_SPEED};
pub use tasks::{TaskToggle, MAX_ZONE_TASKS};

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// A tile click from the input layer. Toggles: a tile that already has a task
/// gets that task cancelled.
#[derive(Event, Debug, Clone)]
pub struct TaskRequestEvent {
    pub zone: ZoneId,
    pub kind: TaskKind,
    pub tile: GridPos,
}

#[derive(Event, Debug, Clone)]
pub struct CancelTaskAtEvent {
    pub zone: ZoneId,
    pub tile: GridPos,
}

#[derive(Event, Debug, Clone)]
pub struct TaskQueuedEvent {
    pub zone: ZoneId,
    pub task: TaskId,
}

#[derive(Event, Debug, Clone)]
pub struct TaskCancelledEvent {
    pub zone: ZoneId,
    pub task: TaskId,
}

/// A task left the queue at the end of its work, done or dropped.
#[derive(Event, Debug, Clone)]
pub struct TaskFinishedEvent {
    pub zone: ZoneId,
    pub outcome: FarmerOutcome,
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin
// ─────────────────────────────────────────────────────────────────────────────

pub struct FarmingPlugin;

impl Plugin for FarmingPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<TaskRequestEvent>()
            .add_event::<CancelTaskAtEvent>()
            .add_event::<TaskQueuedEvent>()
            .add_event::<TaskCancelledEvent>()
            .add_event::<TaskFinishedEvent>()
            .add_systems(
                Update,
                (handle_task_requests, handle_cancel_requests)
                    .chain()
                    .in_set(SimSet::Requests),
            )
            .add_systems(Update, publish_finished_tasks.in_set(SimSet::Report));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Systems
// ─────────────────────────────────────────────────────────────────────────────

fn handle_task_requests(
    mut events: EventReader<TaskRequestEvent>,
    mut sim: ResMut<Simulation>,
    mut queued: EventWriter<TaskQueuedEvent>,
    mut cancelled: EventWriter<TaskCancelledEvent>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        match sim.request_task(ev.zone, ev.kind, ev.tile) {
            Ok(TaskToggle::Queued(task)) => {
                queued.send(TaskQueuedEvent { zone: ev.zone, task });
            }
            Ok(TaskToggle::Cancelled(task)) => {
                cancelled.send(TaskCancelledEvent { zone: ev.zone, task });
            }
            Err(error) => {
                info!("[Farmer] Rejected {:?} at {:?}: {}", ev.kind, ev.tile, error);
                rejected.send(RequestRejectedEvent {
                    request: format!("{:?} at {:?}", ev.kind, ev.tile),
                    error,
                });
            }
        }
    }
}

fn handle_cancel_requests(
    mut events: EventReader<CancelTaskAtEvent>,
    mut sim: ResMut<Simulation>,
    mut cancelled: EventWriter<TaskCancelledEvent>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        match sim.cancel_task_at(ev.zone, ev.tile) {
            Ok(task) => {
                cancelled.send(TaskCancelledEvent { zone: ev.zone, task });
            }
            Err(error) => {
                rejected.send(RequestRejectedEvent {
                    request: format!("cancel at {:?}", ev.tile),
                    error,
                });
            }
        }
    }
}

fn publish_finished_tasks(
    report: Res<LastTickReport>,
    mut writer: EventWriter<TaskFinishedEvent>,
) {
    if !report.is_changed() {
        return;
    }
    for (zone, outcome) in &report.0.farmer {
        writer.send(TaskFinishedEvent {
            zone: *zone,
            outcome: outcome.clone(),
        });
    }
}
