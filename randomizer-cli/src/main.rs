use clap::{ArgAction, Parser};
use std::path::PathBuf;

use randomizer_core::{run, RandomizerSettings};

#[derive(Debug, Parser)]
#[command(
    name = "bof3-randomizer",
    version,
    about = "Breath of Fire III table randomizer"
)]
struct Args {
    /// JSON table dump exported by the codec tool.
    #[arg(long)]
    input: PathBuf,

    /// Where to write the randomized table dump.
    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    seed: u64,

    /// Global randomization strength in [0, 1].
    #[arg(long, default_value_t = 0.5)]
    strength: f64,

    /// Difficulty multiplier applied to power-like fields.
    #[arg(long, default_value_t = 1.0)]
    difficulty: f64,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    randomize_equipment: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    randomize_abilities: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    randomize_shops: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    randomize_trades: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    randomize_monsters: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    randomize_formations: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    randomize_masters: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    randomize_levels: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    randomize_base_stats: bool,

    #[arg(long)]
    equipment_strength: Option<f64>,

    #[arg(long)]
    shop_strength: Option<f64>,

    #[arg(long)]
    monster_strength: Option<f64>,

    #[arg(long)]
    master_strength: Option<f64>,

    /// Downgrade cleanup consistency failures to warnings.
    #[arg(long, default_value_t = false)]
    permissive: bool,

    /// Optional path for the human-readable spoiler report.
    #[arg(long)]
    spoiler: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let settings = RandomizerSettings {
        seed: args.seed,
        strength: args.strength,
        difficulty: args.difficulty,
        randomize_equipment: args.randomize_equipment,
        randomize_abilities: args.randomize_abilities,
        randomize_shops: args.randomize_shops,
        randomize_trades: args.randomize_trades,
        randomize_monsters: args.randomize_monsters,
        randomize_formations: args.randomize_formations,
        randomize_masters: args.randomize_masters,
        randomize_levels: args.randomize_levels,
        randomize_base_stats: args.randomize_base_stats,
        equipment_strength: args.equipment_strength,
        shop_strength: args.shop_strength,
        monster_strength: args.monster_strength,
        master_strength: args.master_strength,
        permissive: args.permissive,
        input_path: args.input,
        output_path: args.output,
        spoiler_path: args.spoiler,
    };

    if let Err(err) = run(settings) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_on_toggles_can_be_switched_off() {
        let args = Args::try_parse_from([
            "bof3-randomizer",
            "--input",
            "tables.json",
            "--output",
            "out.json",
            "--seed",
            "7",
            "--randomize-shops",
            "false",
        ])
        .unwrap();
        assert!(!args.randomize_shops);
        assert!(args.randomize_trades);
    }

    #[test]
    fn toggles_default_per_their_declared_values() {
        let args = Args::try_parse_from([
            "bof3-randomizer",
            "--input",
            "tables.json",
            "--output",
            "out.json",
            "--seed",
            "1",
        ])
        .unwrap();
        assert!(args.randomize_equipment);
        assert!(!args.randomize_base_stats);
        assert!(!args.permissive);
    }
}
