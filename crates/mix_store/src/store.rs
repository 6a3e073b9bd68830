use std::path::{Path, PathBuf};

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use mix_core::{
    CatalogError, CategoryThresholds, CommitLine, Material, MaterialCatalog, MaterialId,
    RecipeLine, RecipeOwnerId,
};
use uuid::Uuid;

use crate::records::{
    CatalogData, MaterialRecord, MovementKind, MovementRecord, MovementView, PileRecord,
    RecipeRecord, StoreConfig,
};
use crate::{
    read_json_or_default, sample_materials, validate_catalog, write_json_atomic, CATALOG_FILE,
    CONFIG_FILE,
};

/// Material catalog backed by a data directory, or purely in memory.
///
/// Every write builds the next `CatalogData` on the side, persists it, and
/// only then replaces the current one. A failed write leaves both the file
/// and the in-memory state as they were.
#[derive(Debug)]
pub struct Store {
    dir: Option<PathBuf>,
    data: CatalogData,
    config: StoreConfig,
    index: AHashMap<MaterialId, usize>,
}

impl Store {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;
        let data: CatalogData = read_json_or_default(dir, CATALOG_FILE)?;
        let config: StoreConfig = read_json_or_default(dir, CONFIG_FILE)?;
        validate_catalog(&data, &config)
            .with_context(|| format!("validating {}", dir.display()))?;
        tracing::debug!(
            dir = %dir.display(),
            materials = data.materials.len(),
            movements = data.movements.len(),
            "catalog loaded"
        );
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            index: build_index(&data),
            data,
            config,
        })
    }

    pub fn in_memory(data: CatalogData, config: StoreConfig) -> Result<Self> {
        validate_catalog(&data, &config)?;
        Ok(Self {
            dir: None,
            index: build_index(&data),
            data,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn data(&self) -> &CatalogData {
        &self.data
    }

    pub fn material(&self, id: &MaterialId) -> Option<&MaterialRecord> {
        self.index.get(id).map(|&index| &self.data.materials[index])
    }

    /// Delivered quantity plus every committed movement, floored at zero.
    pub fn available_quantity(&self, id: &MaterialId) -> Option<f64> {
        let material = self.material(id)?;
        let moved: f64 = self
            .data
            .movements
            .iter()
            .filter(|movement| &movement.material_id == id)
            .map(|movement| movement.amount)
            .sum();
        Some((material.quantity + moved).max(0.0))
    }

    pub fn pile(&self, owner: &RecipeOwnerId) -> Option<&PileRecord> {
        self.data.piles.iter().find(|pile| &pile.owner == owner)
    }

    pub fn add_material(&mut self, record: MaterialRecord) -> Result<()> {
        if self.index.contains_key(&record.id) {
            bail!("material '{}' already exists", record.id);
        }
        let id = record.id.clone();
        let mut next = self.data.clone();
        next.materials.push(record);
        self.replace(next)?;
        tracing::info!(material = %id, "material added");
        Ok(())
    }

    /// Adds the sample residues that aren't present yet; returns how many.
    pub fn seed_sample_materials(&mut self) -> Result<usize> {
        let missing: Vec<MaterialRecord> = sample_materials()
            .into_iter()
            .filter(|record| !self.index.contains_key(&record.id))
            .collect();
        let count = missing.len();
        if count > 0 {
            let mut next = self.data.clone();
            next.materials.extend(missing);
            self.replace(next)?;
        }
        tracing::info!(added = count, "sample materials seeded");
        Ok(count)
    }

    /// Records a manual quantity correction with no owning recipe.
    pub fn record_adjustment(&mut self, id: &MaterialId, amount: f64) -> Result<()> {
        if self.material(id).is_none() {
            bail!("material '{id}' not found");
        }
        if !amount.is_finite() {
            bail!("adjustment amount must be finite");
        }
        let mut next = self.data.clone();
        next.movements.push(MovementRecord {
            id: Uuid::new_v4(),
            material_id: id.clone(),
            owner: None,
            amount,
            kind: MovementKind::Adjustment,
            recorded_at: Utc::now(),
        });
        self.replace(next)?;
        tracing::info!(material = %id, amount, "quantity adjusted");
        Ok(())
    }

    /// Movements for one material, oldest first, with the quantity left after each.
    pub fn movement_history(&self, id: &MaterialId) -> Result<Vec<MovementView>> {
        let Some(material) = self.material(id) else {
            bail!("material '{id}' not found");
        };
        let mut movements: Vec<&MovementRecord> = self
            .data
            .movements
            .iter()
            .filter(|movement| &movement.material_id == id)
            .collect();
        movements.sort_by_key(|movement| movement.recorded_at);

        let mut running_total = material.quantity;
        Ok(movements
            .into_iter()
            .map(|movement| {
                running_total += movement.amount;
                MovementView {
                    movement: movement.clone(),
                    running_total,
                }
            })
            .collect())
    }

    pub fn set_thresholds(&mut self, thresholds: CategoryThresholds) -> Result<()> {
        let config = StoreConfig {
            thresholds,
            ..self.config
        };
        validate_catalog(&self.data, &config)?;
        if let Some(dir) = &self.dir {
            write_json_atomic(&dir.join(CONFIG_FILE), &config)?;
        }
        self.config = config;
        tracing::info!(
            high_nitrogen = thresholds.high_nitrogen,
            green = thresholds.green,
            "category thresholds updated"
        );
        Ok(())
    }

    fn to_material(&self, record: &MaterialRecord) -> Material {
        Material {
            id: record.id.clone(),
            name: record.name.clone(),
            ratio: record.ratio,
            total_quantity: record.quantity,
            available_quantity: self.available_quantity(&record.id).unwrap_or(0.0),
            category: self.config.thresholds.classify(record.ratio),
        }
    }

    /// Persists `next` (when backed by a directory) and swaps it in.
    fn replace(&mut self, next: CatalogData) -> Result<()> {
        validate_catalog(&next, &self.config)?;
        if let Some(dir) = &self.dir {
            write_json_atomic(&dir.join(CATALOG_FILE), &next)?;
        }
        self.index = build_index(&next);
        self.data = next;
        Ok(())
    }

    fn pile_stats(&self, lines: &[CommitLine]) -> (f64, f64) {
        let total_volume = lines.iter().map(|line| line.consumed_quantity).sum();
        let blended_ratio = lines
            .iter()
            .map(|line| {
                let ratio = self.material(&line.material_id).map_or(0.0, |m| m.ratio);
                line.mix_proportion * ratio
            })
            .sum();
        (total_volume, blended_ratio)
    }
}

impl MaterialCatalog for Store {
    fn list_available_materials(&self) -> Result<Vec<Material>, CatalogError> {
        Ok(self
            .data
            .materials
            .iter()
            .map(|record| self.to_material(record))
            .collect())
    }

    fn load_existing_recipe(
        &self,
        owner: &RecipeOwnerId,
    ) -> Result<Vec<RecipeLine>, CatalogError> {
        Ok(self
            .data
            .recipes
            .iter()
            .filter(|recipe| &recipe.owner == owner)
            .map(|recipe| RecipeLine {
                material_id: recipe.material_id.clone(),
                proportion: recipe.proportion,
            })
            .collect())
    }

    fn commit_recipe(
        &mut self,
        owner: &RecipeOwnerId,
        lines: &[CommitLine],
    ) -> Result<(), CatalogError> {
        let now = Utc::now();
        let (total_volume, blended_ratio) = self.pile_stats(lines);

        let mut next = self.data.clone();
        next.recipes.retain(|recipe| &recipe.owner != owner);
        next.movements
            .retain(|movement| movement.owner.as_ref() != Some(owner));
        next.piles.retain(|pile| &pile.owner != owner);

        for line in lines {
            next.recipes.push(RecipeRecord {
                owner: owner.clone(),
                material_id: line.material_id.clone(),
                proportion: line.mix_proportion,
                recorded_at: now,
            });
            next.movements.push(MovementRecord {
                id: Uuid::new_v4(),
                material_id: line.material_id.clone(),
                owner: Some(owner.clone()),
                amount: -line.consumed_quantity,
                kind: MovementKind::Recipe,
                recorded_at: now,
            });
        }
        next.piles.push(PileRecord {
            owner: owner.clone(),
            total_volume,
            blended_ratio,
            updated_at: now,
        });

        if let Err(err) = self.replace(next) {
            tracing::warn!(owner = %owner, "recipe commit failed: {err:#}");
            return Err(CatalogError::CommitFailed(format!("{err:#}")));
        }
        tracing::info!(
            owner = %owner,
            lines = lines.len(),
            total_volume,
            blended_ratio,
            "recipe committed"
        );
        Ok(())
    }

    fn previous_consumption(
        &self,
        owner: &RecipeOwnerId,
    ) -> Result<Vec<(MaterialId, f64)>, CatalogError> {
        Ok(self
            .data
            .movements
            .iter()
            .filter(|movement| movement.owner.as_ref() == Some(owner))
            .map(|movement| (movement.material_id.clone(), -movement.amount))
            .collect())
    }
}

fn build_index(data: &CatalogData) -> AHashMap<MaterialId, usize> {
    data.materials
        .iter()
        .enumerate()
        .map(|(index, material)| (material.id.clone(), index))
        .collect()
}
