use std::fs;
use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod catalog;
pub mod context;
pub mod report;
pub mod tables;
pub mod walk;

mod balance;
mod cluster;
mod constraints;
mod passes;
mod rank;
mod stats;
mod substitute;

use catalog::{Catalog, EntityKind};
use context::RunContext;

#[derive(Debug, Error)]
pub enum RandomizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("empty candidate pool for {0}")]
    EmptyPool(&'static str),
    #[error("consistency check failed: {0}")]
    Consistency(String),
}

pub type Result<T> = std::result::Result<T, RandomizerError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomizerSettings {
    pub seed: u64,
    /// Global randomization strength in [0, 1]; 0 leaves tables unchanged.
    pub strength: f64,
    /// Multiplier applied on top of strength for power-like fields.
    pub difficulty: f64,
    pub randomize_equipment: bool,
    pub randomize_abilities: bool,
    pub randomize_shops: bool,
    pub randomize_trades: bool,
    pub randomize_monsters: bool,
    pub randomize_formations: bool,
    pub randomize_masters: bool,
    pub randomize_levels: bool,
    pub randomize_base_stats: bool,
    pub equipment_strength: Option<f64>,
    pub shop_strength: Option<f64>,
    pub monster_strength: Option<f64>,
    pub master_strength: Option<f64>,
    /// Downgrades cleanup consistency failures to warnings.
    pub permissive: bool,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub spoiler_path: Option<PathBuf>,
}

impl RandomizerSettings {
    pub fn strength_for(&self, kind: EntityKind) -> f64 {
        let override_value = match kind {
            EntityKind::Item
            | EntityKind::Weapon
            | EntityKind::Armor
            | EntityKind::Accessory => self.equipment_strength,
            EntityKind::Shop | EntityKind::Trade => self.shop_strength,
            EntityKind::Monster | EntityKind::Formation => self.monster_strength,
            EntityKind::MasterStats | EntityKind::MasterSkills => self.master_strength,
            _ => None,
        };
        override_value.unwrap_or(self.strength).clamp(0.0, 1.0)
    }

    pub fn enabled(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Item
            | EntityKind::Weapon
            | EntityKind::Armor
            | EntityKind::Accessory => self.randomize_equipment,
            EntityKind::KeyItem => false,
            EntityKind::Ability => self.randomize_abilities,
            EntityKind::Shop => self.randomize_shops,
            EntityKind::Trade => self.randomize_trades,
            EntityKind::Monster => self.randomize_monsters,
            EntityKind::Formation => self.randomize_formations,
            EntityKind::MasterStats | EntityKind::MasterSkills => self.randomize_masters,
            EntityKind::Level => self.randomize_levels,
            EntityKind::BaseStats => self.randomize_base_stats,
        }
    }
}

/// Fixed dependency order over entity kinds: a plain topological pass over
/// each kind's declared "runs after" set, deterministic because candidates
/// are considered in declaration order.
pub fn execution_order() -> Result<Vec<EntityKind>> {
    let mut order: Vec<EntityKind> = Vec::with_capacity(EntityKind::ALL.len());
    while order.len() < EntityKind::ALL.len() {
        let before = order.len();
        for kind in EntityKind::ALL {
            if order.contains(&kind) {
                continue;
            }
            if kind.runs_after().iter().all(|dep| order.contains(dep)) {
                order.push(kind);
            }
        }
        if order.len() == before {
            return Err(RandomizerError::Precondition(
                "cycle in entity kind dependencies".to_string(),
            ));
        }
    }
    Ok(order)
}

/// Ordered "mutate everything" entry point for callers that hold a catalog
/// of their own.
pub fn mutate_all(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    passes::mutate_all(catalog, ctx, settings)
}

/// Post-mutation invariant repair: cluster synchronization, derived-list
/// re-sorting, and consistency checks.
pub fn cleanup_all(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    passes::cleanup_all(catalog, ctx, settings)
}

/// Full pipeline: read the table dump, randomize, clean up, and write the
/// randomized dump plus the optional spoiler report.
pub fn run(settings: RandomizerSettings) -> Result<()> {
    info!(
        "randomizing {} with seed {}",
        settings.input_path.display(),
        settings.seed
    );
    let text = fs::read_to_string(&settings.input_path)?;
    let raw: tables::RawTables = serde_json::from_str(&text)?;
    let mut catalog = tables::load_catalog(&raw)?;
    let mut ctx = RunContext::new(settings.seed);

    mutate_all(&mut catalog, &mut ctx, &settings)?;
    cleanup_all(&mut catalog, &mut ctx, &settings)?;

    let out = tables::dump_catalog(&catalog);
    let mut rendered = serde_json::to_string_pretty(&out)?;
    rendered.push('\n');
    fs::write(&settings.output_path, rendered)?;

    if let Some(spoiler_path) = &settings.spoiler_path {
        fs::write(spoiler_path, report::spoiler(&catalog))?;
    }
    info!("wrote {}", settings.output_path.display());
    Ok(())
}
