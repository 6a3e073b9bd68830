//! JSON-file material catalog shared between `mix_cli` and `mix_daemon`.
//!
//! A data directory holds `catalog.json` (materials, movements, recipes,
//! piles) and an optional `config.json` (category thresholds, target band).

mod records;
mod seed;
mod store;

pub use records::{
    CatalogData, MaterialRecord, MovementKind, MovementRecord, MovementView, PileRecord,
    RecipeRecord, StoreConfig,
};
pub use seed::sample_materials;
pub use store::Store;

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const CATALOG_FILE: &str = "catalog.json";
pub const CONFIG_FILE: &str = "config.json";

/// Checks cross-references in loaded data.
///
/// Catches mistakes like a duplicated material id, a negative delivered
/// quantity, or a movement pointing at a material that doesn't exist.
pub fn validate_catalog(data: &CatalogData, config: &StoreConfig) -> Result<()> {
    ensure!(
        config.thresholds.is_valid(),
        "category thresholds must satisfy 0 <= high_nitrogen ({}) < green ({})",
        config.thresholds.high_nitrogen,
        config.thresholds.green,
    );
    ensure!(
        config.target.min <= config.target.max,
        "target band min ({}) exceeds max ({})",
        config.target.min,
        config.target.max,
    );

    let mut material_ids = HashSet::new();
    for material in &data.materials {
        ensure!(!material.id.0.is_empty(), "material has empty id");
        ensure!(
            material_ids.insert(&material.id),
            "duplicate material id '{}'",
            material.id
        );
        ensure!(
            material.quantity >= 0.0 && material.quantity.is_finite(),
            "material '{}' has invalid quantity {}",
            material.id,
            material.quantity
        );
        ensure!(
            material.ratio >= 0.0 && material.ratio.is_finite(),
            "material '{}' has invalid ratio {}",
            material.id,
            material.ratio
        );
    }

    for movement in &data.movements {
        ensure!(
            material_ids.contains(&movement.material_id),
            "movement {} references unknown material '{}'",
            movement.id,
            movement.material_id
        );
        ensure!(
            movement.amount.is_finite(),
            "movement {} has non-finite amount",
            movement.id
        );
    }

    for recipe in &data.recipes {
        ensure!(
            material_ids.contains(&recipe.material_id),
            "recipe for '{}' references unknown material '{}'",
            recipe.owner,
            recipe.material_id
        );
        ensure!(
            (0.0..=1.0).contains(&recipe.proportion),
            "recipe for '{}' has proportion {} outside 0..=1",
            recipe.owner,
            recipe.proportion
        );
    }
    Ok(())
}

/// Reads and parses `dir/name`, or returns `T::default()` when the file is absent.
pub(crate) fn read_json_or_default<T: DeserializeOwned + Default>(
    dir: &Path,
    name: &str,
) -> Result<T> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {name}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {name}"))
}

/// Write JSON atomically: write to `.tmp` then rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)?;
    let mut file = std::fs::File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
