//! Boundary to the material catalog.
//!
//! Loading a saved recipe and committing a finished mix are the only places
//! the engine touches the outside world. Redistribution never does.

use serde::{Deserialize, Serialize};

use crate::summary::{blended_ratio, total_volume};
use crate::{
    CatalogError, CommitLine, Material, MaterialId, Mix, MixError, RecipeLine, RecipeOwnerId,
    EPSILON,
};

/// Source of materials and sink for committed recipes.
///
/// `commit_recipe` must persist the recipe lines and the matching negative
/// movements together or not at all. Committing again for the same owner
/// replaces that owner's previous recipe and movements.
pub trait MaterialCatalog {
    fn list_available_materials(&self) -> Result<Vec<Material>, CatalogError>;

    /// Empty when the owner has no recipe yet.
    fn load_existing_recipe(&self, owner: &RecipeOwnerId)
        -> Result<Vec<RecipeLine>, CatalogError>;

    fn commit_recipe(
        &mut self,
        owner: &RecipeOwnerId,
        lines: &[CommitLine],
    ) -> Result<(), CatalogError>;

    /// Quantities `owner`'s current recipe already consumed, per material.
    /// A recommit replaces them, so they count as available to that owner.
    fn previous_consumption(
        &self,
        _owner: &RecipeOwnerId,
    ) -> Result<Vec<(MaterialId, f64)>, CatalogError> {
        Ok(Vec::new())
    }
}

/// What a successful commit wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub owner: RecipeOwnerId,
    pub lines: Vec<CommitLine>,
    pub total_volume: f64,
    pub blended_ratio: f64,
}

impl CommitReceipt {
    /// Signed movement per material, as recorded against availability.
    pub fn movements(&self) -> Vec<(MaterialId, f64)> {
        self.lines
            .iter()
            .map(|line| (line.material_id.clone(), -line.consumed_quantity))
            .collect()
    }
}

/// Materials as `owner` sees them: committed availability plus whatever the
/// owner's own current recipe consumed.
pub fn materials_for_owner(
    catalog: &impl MaterialCatalog,
    owner: &RecipeOwnerId,
) -> Result<Vec<Material>, MixError> {
    let mut materials = catalog.list_available_materials()?;
    for (material_id, consumed) in catalog.previous_consumption(owner)? {
        if let Some(material) = materials.iter_mut().find(|m| m.id == material_id) {
            material.available_quantity =
                (material.available_quantity + consumed).min(material.total_quantity);
        }
    }
    Ok(materials)
}

/// Opens a composing session for `owner`, restoring its saved recipe if any.
pub fn load_mix(catalog: &impl MaterialCatalog, owner: &RecipeOwnerId) -> Result<Mix, MixError> {
    let lines = catalog.load_existing_recipe(owner)?;
    if lines.is_empty() {
        return Ok(Mix::new());
    }
    let materials = materials_for_owner(catalog, owner)?;
    Mix::from_recipe(&lines, &materials)
}

/// Builds the commit lines for `mix` against fresh availability figures.
pub fn commit_lines(mix: &Mix, materials: &[Material]) -> Result<Vec<CommitLine>, MixError> {
    mix.entries()
        .iter()
        .map(|entry| {
            let material = materials
                .iter()
                .find(|material| &material.id == entry.id())
                .ok_or_else(|| MixError::NotFound(entry.id().clone()))?;
            let consumed = entry.volume_proportion * material.total_quantity;
            if consumed > material.available_quantity + EPSILON {
                return Err(MixError::QuantityExceeded {
                    material_id: material.id.clone(),
                    requested: consumed,
                    available: material.available_quantity,
                });
            }
            Ok(CommitLine {
                material_id: material.id.clone(),
                mix_proportion: entry.mix_proportion,
                volume_proportion: entry.volume_proportion,
                consumed_quantity: consumed,
            })
        })
        .collect()
}

/// Persists the mix as `owner`'s recipe and deducts consumed quantities.
///
/// Availability is re-read first, so a commit from a stale session that
/// would overdraw a material fails with `QuantityExceeded` and writes
/// nothing. On `CommitFailed` the caller may retry with the same mix.
pub fn commit(
    mix: &Mix,
    owner: &RecipeOwnerId,
    catalog: &mut impl MaterialCatalog,
) -> Result<CommitReceipt, MixError> {
    if mix.is_empty() {
        return Err(MixError::CommitFailed("mix is empty".to_string()));
    }
    let materials = materials_for_owner(catalog, owner)?;
    let lines = commit_lines(mix, &materials)?;
    catalog.commit_recipe(owner, &lines)?;
    Ok(CommitReceipt {
        owner: owner.clone(),
        lines,
        total_volume: total_volume(mix),
        blended_ratio: blended_ratio(mix),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{material, MemoryCatalog};

    fn owner() -> RecipeOwnerId {
        RecipeOwnerId::from("pile_1")
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(vec![
            material("a", 10.0, 100.0, 100.0),
            material("b", 40.0, 50.0, 50.0),
        ])
    }

    fn half_and_half(catalog: &MemoryCatalog) -> Mix {
        let materials = catalog.list_available_materials().unwrap();
        Mix::new()
            .add_material(materials[0].clone())
            .unwrap()
            .add_material(materials[1].clone())
            .unwrap()
            .set_mix_proportion(&MaterialId::from("a"), 0.5)
            .unwrap()
    }

    #[test]
    fn commit_deducts_consumed_volumes() {
        let mut catalog = catalog();
        let mix = half_and_half(&catalog);
        // a: volume 0.5 of 100; b: volume 0.5 of 50
        let receipt = commit(&mix, &owner(), &mut catalog).unwrap();
        let movements = receipt.movements();
        assert!((movements[0].1 + 50.0).abs() < 1e-9);
        assert!((movements[1].1 + 25.0).abs() < 1e-9);

        let after = catalog.list_available_materials().unwrap();
        assert!((after[0].available_quantity - 50.0).abs() < 1e-9);
        assert!((after[1].available_quantity - 25.0).abs() < 1e-9);
    }

    #[test]
    fn recommit_for_same_owner_is_idempotent() {
        let mut catalog = catalog();
        let mix = half_and_half(&catalog);
        commit(&mix, &owner(), &mut catalog).unwrap();
        let mix = half_and_half(&MemoryCatalog::new(vec![
            material("a", 10.0, 100.0, 100.0),
            material("b", 40.0, 50.0, 50.0),
        ]));
        // Owner's previous movements are replaced, so availability is as before.
        commit(&mix, &owner(), &mut catalog).unwrap();
        let after = catalog.list_available_materials().unwrap();
        assert!((after[0].available_quantity - 50.0).abs() < 1e-9);
    }

    #[test]
    fn recommit_may_reuse_owner_consumption() {
        let mut catalog = catalog();
        let mix = half_and_half(&catalog);
        commit(&mix, &owner(), &mut catalog).unwrap();

        // Only 50 of a is left, but 50 of it is this owner's own.
        let materials = materials_for_owner(&catalog, &owner()).unwrap();
        assert!((materials[0].available_quantity - 100.0).abs() < 1e-9);
        let whole_a = Mix::new().add_material(materials[0].clone()).unwrap();
        commit(&whole_a, &owner(), &mut catalog).unwrap();

        let after = catalog.list_available_materials().unwrap();
        assert!(after[0].available_quantity.abs() < 1e-9);
        assert!((after[1].available_quantity - 50.0).abs() < 1e-9);
    }

    #[test]
    fn failed_commit_writes_nothing() {
        let mut catalog = catalog();
        let mix = half_and_half(&catalog);
        catalog.fail_next_commit = true;
        let err = commit(&mix, &owner(), &mut catalog).unwrap_err();
        assert!(matches!(err, MixError::CommitFailed(_)));
        assert!(catalog.load_existing_recipe(&owner()).unwrap().is_empty());
        let after = catalog.list_available_materials().unwrap();
        assert!((after[0].available_quantity - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_mix_commit_fails() {
        let mut catalog = catalog();
        assert!(matches!(
            commit(&Mix::new(), &owner(), &mut catalog),
            Err(MixError::CommitFailed(_))
        ));
    }

    #[test]
    fn stale_session_overdraw_rejected() {
        let mut catalog = catalog();
        let mix = half_and_half(&catalog);
        commit(&mix, &RecipeOwnerId::from("pile_other"), &mut catalog).unwrap();
        commit(&mix, &RecipeOwnerId::from("pile_third"), &mut catalog).unwrap();
        // a now has 0 left; a third pile can't take another 50.
        let err = commit(&mix, &owner(), &mut catalog).unwrap_err();
        assert!(matches!(err, MixError::QuantityExceeded { .. }));
    }

    #[test]
    fn unavailable_catalog_surfaces_error() {
        let mut catalog = catalog();
        let mix = half_and_half(&catalog);
        catalog.unavailable = true;
        assert!(matches!(
            commit(&mix, &owner(), &mut catalog),
            Err(MixError::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn load_mix_restores_saved_recipe() {
        let mut catalog = catalog();
        let mix = half_and_half(&catalog);
        commit(&mix, &owner(), &mut catalog).unwrap();
        let restored = load_mix(&catalog, &owner()).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(restored.entries()[0].is_limitant);
        let sum: f64 = restored.entries().iter().map(|e| e.mix_proportion).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn load_mix_without_recipe_is_empty() {
        let catalog = catalog();
        assert!(load_mix(&catalog, &owner()).unwrap().is_empty());
    }
}
