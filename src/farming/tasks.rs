//! The per-zone task queue: at most one active task plus two queued.

use bevy::prelude::*;

use crate::shared::*;
use crate::sim::Simulation;
use crate::world::Zone;

/// Active task + queued tasks may never exceed this.
pub const MAX_ZONE_TASKS: usize = 3;

/// What a toggle-style request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskToggle {
    Queued(TaskId),
    Cancelled(TaskId),
}

impl Zone {
    pub fn task_count(&self) -> usize {
        self.current_task.iter().count() + self.task_queue.len()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.current_task.iter().chain(self.task_queue.iter())
    }

    pub fn task_at(&self, tile: GridPos) -> Option<&Task> {
        self.tasks().find(|t| t.target == tile)
    }

    /// Moves the queue head into the active slot when it is empty.
    pub(crate) fn promote_task(&mut self) {
        if self.current_task.is_none() {
            self.current_task = self.task_queue.pop_front();
        }
    }

    /// Whether `kind` can be carried out on `tile` right now.
    pub fn validate_task(&self, kind: TaskKind, tile: GridPos) -> SchedulerResult<()> {
        let invalid = |why: &str| -> SchedulerResult<()> {
            Err(SchedulerError::InvalidTarget(format!("{:?}: {}", tile, why)))
        };
        let Some(t) = self.grid.get(tile) else {
            return invalid("outside the zone");
        };

        match kind {
            TaskKind::Clear if !t.is_obstacle() => invalid("nothing to clear"),
            TaskKind::Water => match &t.crop {
                None => invalid("no crop to water"),
                Some(c) if c.watered_today => invalid("already watered today"),
                Some(_) => Ok(()),
            },
            TaskKind::Harvest if !t.crop.as_ref().is_some_and(|c| c.is_ripe()) => {
                invalid("no ripe crop")
            }
            TaskKind::Plant(_) if !t.is_plantable() => invalid("not plantable"),
            TaskKind::Uproot if t.crop.is_none() => invalid("no crop to uproot"),
            TaskKind::PlaceSprinkler if !t.is_buildable() => invalid("not free ground"),
            TaskKind::PlaceBuilding(b) => {
                if self.buildings.contains_key(&b) {
                    invalid("zone already has one")
                } else if !t.is_buildable() {
                    invalid("not free ground")
                } else {
                    Ok(())
                }
            }
            TaskKind::Deposit if self.site(BuildingKind::Warehouse) != Some(tile) => {
                invalid("not the warehouse")
            }
            _ => Ok(()),
        }
    }
}

impl Simulation {
    /// Queues a farmer task. Capacity is checked before the target so a full
    /// queue always answers `CapacityExceeded`.
    pub fn add_task(
        &mut self,
        zone: ZoneId,
        kind: TaskKind,
        tile: GridPos,
    ) -> SchedulerResult<TaskId> {
        let index = self.owned_zone_index(zone)?;
        if self.zones[index].task_count() >= MAX_ZONE_TASKS {
            return Err(SchedulerError::CapacityExceeded(CapacityKind::TaskQueue));
        }
        if self.zones[index].task_at(tile).is_some() {
            return Err(SchedulerError::InvalidTarget(format!(
                "{:?} already has a task",
                tile
            )));
        }
        self.zones[index].validate_task(kind, tile)?;

        let id = TaskId(self.next_id());
        let z = &mut self.zones[index];
        z.task_queue.push_back(Task {
            id,
            kind,
            target: tile,
            zone,
            progress: 0,
        });
        z.promote_task();
        debug!("[Farmer] Queued {} {:?} at {:?}", id, kind, tile);
        Ok(id)
    }

    /// Cancels a queued or active task. Partial progress is discarded and
    /// nothing is refunded (plant costs are only charged at completion).
    pub fn remove_task(&mut self, id: TaskId) -> SchedulerResult<Task> {
        let now = self.now();
        for z in self.zones.iter_mut() {
            if z.current_task.as_ref().is_some_and(|t| t.id == id) {
                let task = z.current_task.take().ok_or(SchedulerError::NotFound)?;
                z.farmer.abandon(now);
                z.promote_task();
                info!("[Farmer] Cancelled active {} {:?}", id, task.kind);
                return Ok(task);
            }
            if let Some(pos) = z.task_queue.iter().position(|t| t.id == id) {
                let task = z.task_queue.remove(pos).ok_or(SchedulerError::NotFound)?;
                info!("[Farmer] Cancelled queued {} {:?}", id, task.kind);
                return Ok(task);
            }
        }
        Err(SchedulerError::NotFound)
    }

    /// Input-side entry point: a second request on a tile that already has a
    /// task cancels that task instead of queueing a duplicate.
    pub fn request_task(
        &mut self,
        zone: ZoneId,
        kind: TaskKind,
        tile: GridPos,
    ) -> SchedulerResult<TaskToggle> {
        let existing = self.zone(zone)?.task_at(tile).map(|t| t.id);
        match existing {
            Some(id) => self.remove_task(id).map(|_| TaskToggle::Cancelled(id)),
            None => self.add_task(zone, kind, tile).map(TaskToggle::Queued),
        }
    }

    pub fn cancel_task_at(&mut self, zone: ZoneId, tile: GridPos) -> SchedulerResult<TaskId> {
        let id = self
            .zone(zone)?
            .task_at(tile)
            .map(|t| t.id)
            .ok_or(SchedulerError::NotFound)?;
        self.remove_task(id)?;
        Ok(id)
    }
}
