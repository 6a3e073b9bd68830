//! On-disk record types for `catalog.json` and `config.json`.

use chrono::{DateTime, Utc};
use mix_core::{CategoryThresholds, MaterialId, RecipeOwnerId, TargetBand};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A batch of residue delivered by a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: MaterialId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Carbon:nitrogen ratio.
    pub ratio: f64,
    /// Delivered quantity before any movement.
    pub quantity: f64,
    pub created_at: DateTime<Utc>,
}

impl MaterialRecord {
    /// A batch delivered now, with no description or location.
    pub fn new(id: MaterialId, name: impl Into<String>, ratio: f64, quantity: f64) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            location: None,
            ratio,
            quantity,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Consumption by a committed recipe.
    Recipe,
    /// Manual correction of a batch's quantity.
    Adjustment,
}

/// Signed change to a material's quantity. Negative amounts consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: Uuid,
    pub material_id: MaterialId,
    #[serde(default)]
    pub owner: Option<RecipeOwnerId>,
    pub amount: f64,
    pub kind: MovementKind,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub owner: RecipeOwnerId,
    pub material_id: MaterialId,
    pub proportion: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Pile figures written alongside its recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PileRecord {
    pub owner: RecipeOwnerId,
    pub total_volume: f64,
    pub blended_ratio: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub materials: Vec<MaterialRecord>,
    #[serde(default)]
    pub movements: Vec<MovementRecord>,
    #[serde(default)]
    pub recipes: Vec<RecipeRecord>,
    #[serde(default)]
    pub piles: Vec<PileRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub thresholds: CategoryThresholds,
    #[serde(default)]
    pub target: TargetBand,
}

/// One row of a material's movement history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementView {
    pub movement: MovementRecord,
    /// Quantity left after this movement.
    pub running_total: f64,
}
