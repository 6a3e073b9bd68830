//! Shared test fixtures for `mix_core` and downstream crates.
//!
//! `sample_materials()` mirrors the seeded residue set; `MemoryCatalog` is an
//! in-memory `MaterialCatalog` with switches for simulating outages.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    CatalogError, CategoryThresholds, CommitLine, Material, MaterialCatalog, MaterialId,
    RecipeLine, RecipeOwnerId,
};

pub fn material(id: &str, ratio: f64, total: f64, available: f64) -> Material {
    Material {
        id: MaterialId::from(id),
        name: id.to_string(),
        ratio,
        total_quantity: total,
        available_quantity: available,
        category: CategoryThresholds::default().classify(ratio),
    }
}

/// Grass clippings, sawdust, food scraps, fallen leaves, coffee grounds.
pub fn sample_materials() -> Vec<Material> {
    vec![
        material("grass", 17.0, 2.5, 2.5),
        material("sawdust", 325.0, 4.0, 4.0),
        material("food", 12.0, 1.2, 1.2),
        material("leaves", 60.0, 3.0, 3.0),
        material("coffee", 20.0, 0.8, 0.8),
    ]
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    materials: Vec<Material>,
    recipes: HashMap<RecipeOwnerId, Vec<CommitLine>>,
    /// Next `commit_recipe` call fails before writing anything.
    pub fail_next_commit: bool,
    /// Every call fails with `Unavailable`.
    pub unavailable: bool,
}

impl MemoryCatalog {
    /// `materials` are taken as untouched; their `available_quantity` is the
    /// starting point before any recipe is committed.
    pub fn new(materials: Vec<Material>) -> Self {
        Self {
            materials,
            ..Self::default()
        }
    }

    fn check_available(&self) -> Result<(), CatalogError> {
        if self.unavailable {
            Err(CatalogError::Unavailable("catalog offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl MaterialCatalog for MemoryCatalog {
    fn list_available_materials(&self) -> Result<Vec<Material>, CatalogError> {
        self.check_available()?;
        let mut materials = self.materials.clone();
        for lines in self.recipes.values() {
            for line in lines {
                if let Some(material) = materials.iter_mut().find(|m| m.id == line.material_id) {
                    material.available_quantity =
                        (material.available_quantity - line.consumed_quantity).max(0.0);
                }
            }
        }
        Ok(materials)
    }

    fn load_existing_recipe(
        &self,
        owner: &RecipeOwnerId,
    ) -> Result<Vec<RecipeLine>, CatalogError> {
        self.check_available()?;
        Ok(self
            .recipes
            .get(owner)
            .map(|lines| {
                lines
                    .iter()
                    .map(|line| RecipeLine {
                        material_id: line.material_id.clone(),
                        proportion: line.mix_proportion,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn commit_recipe(
        &mut self,
        owner: &RecipeOwnerId,
        lines: &[CommitLine],
    ) -> Result<(), CatalogError> {
        self.check_available()?;
        if self.fail_next_commit {
            self.fail_next_commit = false;
            return Err(CatalogError::CommitFailed("simulated write failure".to_string()));
        }
        self.recipes.insert(owner.clone(), lines.to_vec());
        Ok(())
    }

    fn previous_consumption(
        &self,
        owner: &RecipeOwnerId,
    ) -> Result<Vec<(MaterialId, f64)>, CatalogError> {
        self.check_available()?;
        Ok(self
            .recipes
            .get(owner)
            .map(|lines| {
                lines
                    .iter()
                    .map(|line| (line.material_id.clone(), line.consumed_quantity))
                    .collect()
            })
            .unwrap_or_default())
    }
}
