//! Bot shop: buying, selling, configuring and renaming bots.

use std::collections::BTreeSet;

use bevy::prelude::*;

use crate::bots::{
    seed, Bot, BotConfig, BotRole, Chassis, FertilizerConfig, SeedBotJob, SeedConfig,
    TransportConfig,
};
use crate::data::bot_spec;
use crate::shared::*;
use crate::sim::Simulation;
use crate::world::Zone;

/// A configuration that passed every check and only needs applying.
enum Prepared {
    Seed {
        jobs: Vec<SeedBotJob>,
        auto_buy_seeds: bool,
    },
    Transport(TransportConfig),
    Fertilizer(FertilizerConfig),
}

/// Seed job tiles must lie in the zone and not belong to another seed bot.
fn check_seed_tiles(zone: &Zone, owner: Option<BotId>, config: &SeedConfig) -> SchedulerResult<()> {
    seed::validate_jobs(&config.jobs)?;
    let taken: BTreeSet<GridPos> = zone
        .bots
        .iter()
        .filter(|b| Some(b.id) != owner)
        .filter_map(|b| match &b.role {
            BotRole::Seed(s) => Some(s.tiles()),
            _ => None,
        })
        .flatten()
        .collect();
    for tile in config.jobs.iter().flat_map(|j| j.tiles.iter()) {
        if !zone.grid.in_bounds(*tile) {
            return Err(SchedulerError::InvalidTarget(format!(
                "{:?} is outside the zone",
                tile
            )));
        }
        if taken.contains(tile) {
            return Err(SchedulerError::InvalidTarget(format!(
                "{:?} already belongs to another seed bot",
                tile
            )));
        }
    }
    Ok(())
}

fn check_name(name: &str) -> SchedulerResult<()> {
    if name.trim().is_empty() {
        return Err(SchedulerError::InvalidConfig("bot name is empty".to_string()));
    }
    Ok(())
}

fn apply(role: &mut BotRole, chassis: &Chassis, prepared: Prepared) {
    match (role, prepared) {
        (
            BotRole::Seed(bot),
            Prepared::Seed {
                jobs,
                auto_buy_seeds,
            },
        ) => bot.set_jobs(jobs, auto_buy_seeds),
        (BotRole::Transport(bot), Prepared::Transport(config)) => bot.config = config,
        (BotRole::Fertilizer(bot), Prepared::Fertilizer(config)) => bot.set_config(config, chassis),
        (role, _) => warn!("[Shop] Config does not fit a {:?} bot", role.kind()),
    }
}

impl Simulation {
    /// Zone index and bot index of `id`.
    fn locate_bot(&self, id: BotId) -> SchedulerResult<(usize, usize)> {
        self.zones
            .iter()
            .enumerate()
            .find_map(|(zi, z)| z.bots.iter().position(|b| b.id == id).map(|bi| (zi, bi)))
            .ok_or(SchedulerError::NotFound)
    }

    fn prepare(
        &mut self,
        zone_index: usize,
        kind: BotKind,
        owner: Option<BotId>,
        config: BotConfig,
    ) -> SchedulerResult<Prepared> {
        if config.kind() != kind {
            return Err(SchedulerError::InvalidConfig(format!(
                "{:?} settings cannot be applied to a {:?} bot",
                config.kind(),
                kind
            )));
        }
        match config {
            BotConfig::Seed(config) => {
                check_seed_tiles(&self.zones[zone_index], owner, &config)?;
                let jobs = config
                    .jobs
                    .into_iter()
                    .map(|job| SeedBotJob {
                        id: JobId(self.next_id()),
                        crop: job.crop,
                        target_tiles: job.tiles,
                    })
                    .collect();
                Ok(Prepared::Seed {
                    jobs,
                    auto_buy_seeds: config.auto_buy_seeds,
                })
            }
            BotConfig::Transport(config) => {
                config.validate()?;
                Ok(Prepared::Transport(config))
            }
            BotConfig::Fertilizer(config) => {
                config.validate()?;
                Ok(Prepared::Fertilizer(config))
            }
        }
    }

    /// Buys a bot of `kind` into `zone`. It starts at the garage, or at the
    /// zone centre when there is none, and is stepped from the next tick.
    pub fn buy_bot(
        &mut self,
        kind: BotKind,
        zone: ZoneId,
        name: Option<String>,
        config: Option<BotConfig>,
    ) -> SchedulerResult<BotId> {
        let index = self.owned_zone_index(zone)?;
        let spec = bot_spec(kind);
        if self.zones[index].bot_count(kind) >= spec.max_per_zone {
            return Err(SchedulerError::CapacityExceeded(CapacityKind::BotOwnership));
        }
        if let Some(name) = &name {
            check_name(name)?;
        }
        let prepared = match config {
            Some(config) => Some(self.prepare(index, kind, None, config)?),
            None => None,
        };
        self.ledger.spend(spec.cost, "bot purchase")?;

        let id = BotId(self.next_id());
        let z = &mut self.zones[index];
        let pos = z
            .site(BuildingKind::Garage)
            .unwrap_or_else(|| z.grid.center());
        let mut chassis = Chassis::new(pos);
        chassis.supercharged = z.site(BuildingKind::Supercharger).is_some();
        chassis.hopper_upgrade = kind.takes_hopper() && z.site(BuildingKind::Hopper).is_some();

        let mut role = BotRole::new(kind);
        if let Some(prepared) = prepared {
            apply(&mut role, &chassis, prepared);
        }
        if let BotRole::Fertilizer(bot) = &mut role {
            bot.fertilizer_level = bot.capacity(&chassis);
        }

        let name = name.unwrap_or_else(|| format!("{} {}", spec.display_name, z.bot_count(kind) + 1));
        info!("[Shop] Bought {} ({}) for {}g in zone {:?}", name, id, spec.cost, zone);
        z.insert_bot(Bot {
            id,
            name,
            chassis,
            role,
        });
        Ok(id)
    }

    /// Sells a bot for its refund. Any action in flight is dropped and its
    /// cargo is stored in the zone's warehouse.
    pub fn sell_bot(&mut self, id: BotId) -> SchedulerResult<u64> {
        let (zi, bi) = self.locate_bot(id)?;
        let z = &mut self.zones[zi];
        let mut bot = z.bots.remove(bi);
        bot.reset_activity();

        let cargo = bot.take_cargo();
        if !cargo.is_empty() {
            let leftover = z.warehouse.store(cargo);
            if !leftover.is_empty() {
                warn!(
                    "[Shop] {} items from {} lost, warehouse is full",
                    leftover.len(),
                    bot.name
                );
            }
        }

        let refund = bot_spec(bot.kind()).refund();
        self.ledger.credit(refund, "bot sale");
        info!("[Shop] Sold {} ({}) for {}g", bot.name, id, refund);
        Ok(refund)
    }

    /// Replaces a bot's settings. Seed bots restart their jobs from the top.
    pub fn configure_bot(&mut self, id: BotId, config: BotConfig) -> SchedulerResult<()> {
        let (zi, bi) = self.locate_bot(id)?;
        let kind = self.zones[zi].bots[bi].kind();
        let prepared = self.prepare(zi, kind, Some(id), config)?;
        let bot = &mut self.zones[zi].bots[bi];
        apply(&mut bot.role, &bot.chassis, prepared);
        info!("[Shop] Reconfigured {} ({})", bot.name, id);
        Ok(())
    }

    pub fn rename_bot(&mut self, id: BotId, name: String) -> SchedulerResult<()> {
        check_name(&name)?;
        let bot = self.bot_mut(id).ok_or(SchedulerError::NotFound)?;
        bot.name = name;
        Ok(())
    }
}
