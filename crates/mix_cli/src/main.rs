use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mix_core::{
    apply_command, commit, load_mix, materials_for_owner, summarize, Category,
    CategoryThresholds, MaterialCatalog, MaterialId, Mix, MixCommand, MixSummary, RecipeOwnerId,
};
use mix_store::{MaterialRecord, Store};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "mix_cli", about = "Compost mix composer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the sample residues to a data directory.
    Seed {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
    /// List materials grouped by category.
    Materials {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
    /// Show the movement history of one material.
    Movements {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        #[arg(long)]
        material: String,
    },
    /// Register a newly delivered residue batch.
    AddMaterial {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Carbon:nitrogen ratio.
        #[arg(long)]
        ratio: f64,
        #[arg(long)]
        quantity: f64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Record a manual quantity correction (negative to remove).
    Adjust {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        #[arg(long)]
        material: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Change the ratio cut-offs used to categorize materials.
    Thresholds {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        #[arg(long)]
        high_nitrogen: f64,
        #[arg(long)]
        green: f64,
    },
    /// Replay a JSON array of mix commands for a pile.
    Compose {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        script: PathBuf,
        /// Start from an empty mix instead of the owner's saved recipe.
        #[arg(long)]
        fresh: bool,
        /// Commit the resulting mix as the owner's recipe.
        #[arg(long)]
        commit: bool,
    },
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn seed(data_dir: &Path) -> Result<()> {
    let mut store = Store::open(data_dir)?;
    let added = store.seed_sample_materials()?;
    println!("Seeded {added} material(s) into {}", data_dir.display());
    Ok(())
}

fn list_materials(data_dir: &Path) -> Result<()> {
    let store = Store::open(data_dir)?;
    let materials = store
        .list_available_materials()
        .context("listing materials")?;
    if materials.is_empty() {
        println!("No materials. Run `mix_cli seed` first.");
        return Ok(());
    }
    for category in Category::ALL {
        println!("{category}");
        for material in materials.iter().filter(|m| m.category == category) {
            println!(
                "  {id:<16} {name:<20} C:N={ratio:>6.1}  available={available:>7.2} / {total:.2}",
                id = material.id,
                name = material.name,
                ratio = material.ratio,
                available = material.available_quantity,
                total = material.total_quantity,
            );
        }
    }
    Ok(())
}

fn list_movements(data_dir: &Path, material: &str) -> Result<()> {
    let store = Store::open(data_dir)?;
    let id = MaterialId::from(material);
    let history = store.movement_history(&id)?;
    let delivered = store.material(&id).map_or(0.0, |m| m.quantity);
    println!("{id}: delivered {delivered:.2}");
    for row in &history {
        let owner = row
            .movement
            .owner
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!(
            "  {at}  {kind:<10} {amount:>+8.2}  owner={owner:<12} left={left:.2}",
            at = row.movement.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            kind = format!("{:?}", row.movement.kind).to_lowercase(),
            amount = row.movement.amount,
            left = row.running_total,
        );
    }
    Ok(())
}

fn add_material(data_dir: &Path, record: MaterialRecord) -> Result<()> {
    let mut store = Store::open(data_dir)?;
    let id = record.id.clone();
    let category = store.config().thresholds.classify(record.ratio);
    store
        .add_material(record)
        .with_context(|| format!("adding material {id}"))?;
    println!("Added {id} ({category})");
    Ok(())
}

fn adjust(data_dir: &Path, material: &str, amount: f64) -> Result<()> {
    let mut store = Store::open(data_dir)?;
    let id = MaterialId::from(material);
    store
        .record_adjustment(&id, amount)
        .with_context(|| format!("adjusting {id}"))?;
    let available = store.available_quantity(&id).unwrap_or(0.0);
    println!("{id}: {amount:+.2}, available {available:.2}");
    Ok(())
}

fn set_thresholds(data_dir: &Path, thresholds: CategoryThresholds) -> Result<()> {
    let mut store = Store::open(data_dir)?;
    store
        .set_thresholds(thresholds)
        .context("updating category thresholds")?;
    println!(
        "High nitrogen <= {:.1}, green <= {:.1}, brown above",
        thresholds.high_nitrogen, thresholds.green
    );
    Ok(())
}

fn read_script(path: &Path) -> Result<Vec<MixCommand>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading script: {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing script: {}", path.display()))
}

/// Replays `commands` one by one. A rejected command is reported and
/// skipped; the mix carries on from its last good state.
fn replay(
    store: &Store,
    owner: &RecipeOwnerId,
    fresh: bool,
    commands: &[MixCommand],
) -> Result<(Mix, usize)> {
    let materials = materials_for_owner(store, owner)?;
    let mut mix = if fresh {
        Mix::new()
    } else {
        load_mix(store, owner).with_context(|| format!("loading recipe for {owner}"))?
    };

    let mut rejected = 0;
    for (step, command) in commands.iter().enumerate() {
        match apply_command(&mix, command, &materials) {
            Ok(next) => {
                mix = next;
                print_status(step + 1, command, &mix, None);
            }
            Err(err) => {
                rejected += 1;
                print_status(step + 1, command, &mix, Some(&err.to_string()));
            }
        }
    }
    Ok((mix, rejected))
}

fn compose(
    data_dir: &Path,
    owner: &str,
    script: &Path,
    fresh: bool,
    do_commit: bool,
) -> Result<()> {
    let mut store = Store::open(data_dir)?;
    let owner = RecipeOwnerId::from(owner);
    let commands = read_script(script)?;

    println!("Composing for {owner}: {} command(s)", commands.len());
    println!("{}", "-".repeat(80));
    let (mix, rejected) = replay(&store, &owner, fresh, &commands)?;
    println!("{}", "-".repeat(80));

    let config = *store.config();
    let summary = summarize(&mix, &config.thresholds, &config.target);
    print_summary(&summary);
    if rejected > 0 {
        println!("{rejected} command(s) rejected.");
    }

    if do_commit {
        if !summary.can_commit {
            bail!("mix for {owner} cannot be committed");
        }
        let receipt = commit(&mix, &owner, &mut store)
            .with_context(|| format!("committing recipe for {owner}"))?;
        println!("Committed {} line(s) for {owner}:", receipt.lines.len());
        for (material_id, amount) in receipt.movements() {
            println!("  {material_id:<16} {amount:>+8.2}");
        }
    }
    Ok(())
}

fn describe(command: &MixCommand) -> String {
    match command {
        MixCommand::AddMaterial { material_id } => format!("add {material_id}"),
        MixCommand::RemoveMaterial { material_id } => format!("remove {material_id}"),
        MixCommand::SetVolumeProportion { material_id, value } => {
            format!("volume {material_id}={value:.3}")
        }
        MixCommand::SetMixProportion { material_id, value } => {
            format!("mix {material_id}={value:.3}")
        }
        MixCommand::SetLimitant { material_id } => format!("limitant {material_id}"),
    }
}

fn print_status(step: usize, command: &MixCommand, mix: &Mix, error: Option<&str>) {
    let limitant = mix
        .limitant()
        .map_or_else(|| "-".to_string(), |entry| entry.id().to_string());
    let shares: Vec<String> = mix
        .entries()
        .iter()
        .map(|entry| format!("{}={:.3}", entry.id(), entry.mix_proportion))
        .collect();
    let outcome = match error {
        Some(err) => format!("REJECTED ({err})"),
        None => "ok".to_string(),
    };
    println!(
        "[step={step:03}]  {action:<32} {outcome}  limitant={limitant}  blend={blend:.1}  [{shares}]",
        action = describe(command),
        blend = mix_core::summary::blended_ratio(mix),
        shares = shares.join(", "),
    );
}

fn print_summary(summary: &MixSummary) {
    println!(
        "Total volume {:.2}  blended C:N {:.1}",
        summary.total_volume, summary.blended_ratio
    );
    for category in Category::ALL {
        println!(
            "  {:<14} {:>5.1}%",
            category.label(),
            summary.categories.get(category) * 100.0
        );
    }
    for line in &summary.lines {
        let flag = if line.exceeds_available {
            "  EXCEEDS AVAILABLE"
        } else {
            ""
        };
        println!(
            "  {id:<16} mix={mix:.3} volume={volume:.3} used={used:.2}/{available:.2}{marker}{flag}",
            id = line.material_id,
            mix = line.mix_proportion,
            volume = line.volume_proportion,
            used = line.volume_used,
            available = line.available_quantity,
            marker = if line.is_limitant { " *" } else { "" },
        );
    }
    if let Some(recommendation) = summary.recommendation {
        println!("{}", recommendation.advice());
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Seed { data_dir } => seed(&data_dir)?,
        Commands::Materials { data_dir } => list_materials(&data_dir)?,
        Commands::Movements { data_dir, material } => list_movements(&data_dir, &material)?,
        Commands::AddMaterial {
            data_dir,
            id,
            name,
            ratio,
            quantity,
            description,
            location,
        } => {
            let record = MaterialRecord {
                description,
                location,
                ..MaterialRecord::new(MaterialId(id), name, ratio, quantity)
            };
            add_material(&data_dir, record)?;
        }
        Commands::Adjust {
            data_dir,
            material,
            amount,
        } => adjust(&data_dir, &material, amount)?,
        Commands::Thresholds {
            data_dir,
            high_nitrogen,
            green,
        } => set_thresholds(
            &data_dir,
            CategoryThresholds {
                high_nitrogen,
                green,
            },
        )?,
        Commands::Compose {
            data_dir,
            owner,
            script,
            fresh,
            commit,
        } => compose(&data_dir, &owner, &script, fresh, commit)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"[
        { "op": "add_material", "material_id": "res_food" },
        { "op": "add_material", "material_id": "res_sawdust" },
        { "op": "set_mix_proportion", "material_id": "res_food", "value": 0.9 },
        { "op": "set_mix_proportion", "material_id": "res_sawdust", "value": 0.5 }
    ]"#;

    fn seeded_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path()).unwrap();
        dir
    }

    #[test]
    fn replay_skips_rejected_commands() {
        let dir = seeded_dir();
        let store = Store::open(dir.path()).unwrap();
        let commands: Vec<MixCommand> = serde_json::from_str(SCRIPT).unwrap();
        let owner = RecipeOwnerId::from("pile_1");

        let (mix, rejected) = replay(&store, &owner, true, &commands).unwrap();
        // Sawdust is derived from food in a two-entry mix.
        assert_eq!(rejected, 1);
        let food = mix.get(&MaterialId::from("res_food")).unwrap();
        assert!((food.mix_proportion - 0.9).abs() < 1e-9);
    }

    #[test]
    fn compose_with_commit_persists_recipe() {
        let dir = seeded_dir();
        let script = dir.path().join("script.json");
        std::fs::write(&script, SCRIPT).unwrap();

        compose(dir.path(), "pile_1", &script, true, true).unwrap();

        let store = Store::open(dir.path()).unwrap();
        let owner = RecipeOwnerId::from("pile_1");
        assert_eq!(store.load_existing_recipe(&owner).unwrap().len(), 2);
        assert!(store.pile(&owner).is_some());
    }

    #[test]
    fn added_material_is_listed() {
        let dir = seeded_dir();
        let record = MaterialRecord::new(MaterialId::from("res_straw"), "Farm F", 80.0, 6.0);
        add_material(dir.path(), record.clone()).unwrap();
        assert!(add_material(dir.path(), record).is_err());

        let store = Store::open(dir.path()).unwrap();
        let materials = store.list_available_materials().unwrap();
        let straw = materials
            .iter()
            .find(|m| m.id == MaterialId::from("res_straw"))
            .unwrap();
        assert_eq!(straw.category, Category::Brown);
        assert!((straw.available_quantity - 6.0).abs() < 1e-9);
    }

    #[test]
    fn adjustment_changes_availability() {
        let dir = seeded_dir();
        adjust(dir.path(), "res_leaves", -1.0).unwrap();
        assert!(adjust(dir.path(), "res_missing", 1.0).is_err());

        let store = Store::open(dir.path()).unwrap();
        let leaves = store.available_quantity(&MaterialId::from("res_leaves")).unwrap();
        assert!((leaves - 2.0).abs() < 1e-9);
    }

    #[test]
    fn thresholds_persist_and_reject_inverted_values() {
        let dir = seeded_dir();
        let wider = CategoryThresholds {
            high_nitrogen: 20.0,
            green: 70.0,
        };
        set_thresholds(dir.path(), wider).unwrap();
        let inverted = CategoryThresholds {
            high_nitrogen: 70.0,
            green: 20.0,
        };
        assert!(set_thresholds(dir.path(), inverted).is_err());

        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.config().thresholds, wider);
    }

    #[test]
    fn negative_adjustment_parses() {
        let cli = Cli::try_parse_from([
            "mix_cli",
            "adjust",
            "--material",
            "res_food",
            "--amount",
            "-0.5",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Adjust { amount, .. } if (amount + 0.5).abs() < 1e-12
        ));
    }

    #[test]
    fn bad_script_reports_path() {
        let dir = seeded_dir();
        let script = dir.path().join("broken.json");
        std::fs::write(&script, "[{ \"op\": \"stir\" }]").unwrap();
        let err = read_script(&script).unwrap_err();
        assert!(format!("{err:#}").contains("parsing script"));
    }
}
