//! Type definitions for `mix_core`.
//!
//! Materials come from the catalog and are read-only here. A `Mix` is the
//! in-memory composing state; it never outlives a commit.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(MaterialId);
string_id!(RecipeOwnerId);

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    HighNitrogen,
    Green,
    Brown,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::HighNitrogen, Category::Green, Category::Brown];

    pub fn label(self) -> &'static str {
        match self {
            Category::HighNitrogen => "High Nitrogen",
            Category::Green => "Green",
            Category::Brown => "Brown",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Ratio cut-offs for bucketing materials. Values at or below
/// `high_nitrogen` are high-nitrogen, at or below `green` are green,
/// anything above is brown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryThresholds {
    pub high_nitrogen: f64,
    pub green: f64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            high_nitrogen: 15.0,
            green: 30.0,
        }
    }
}

impl CategoryThresholds {
    pub fn classify(&self, ratio: f64) -> Category {
        if ratio <= self.high_nitrogen {
            Category::HighNitrogen
        } else if ratio <= self.green {
            Category::Green
        } else {
            Category::Brown
        }
    }

    pub fn is_valid(&self) -> bool {
        self.high_nitrogen >= 0.0 && self.high_nitrogen < self.green
    }
}

/// Blended-ratio band considered healthy for a pile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetBand {
    pub min: f64,
    pub max: f64,
}

impl Default for TargetBand {
    fn default() -> Self {
        Self {
            min: 25.0,
            max: 50.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

/// A material as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    /// Carbon:nitrogen ratio; drives both category and blended ratio.
    pub ratio: f64,
    pub total_quantity: f64,
    /// `total_quantity` minus committed consumption.
    pub available_quantity: f64,
    pub category: Category,
}

/// One stored recipe line, as returned by `load_existing_recipe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub material_id: MaterialId,
    pub proportion: f64,
}

/// One line handed to the catalog on commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitLine {
    pub material_id: MaterialId,
    pub mix_proportion: f64,
    pub volume_proportion: f64,
    /// `volume_proportion * total_quantity`; recorded as a negative movement.
    pub consumed_quantity: f64,
}

// ---------------------------------------------------------------------------
// Mix types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixEntry {
    pub material: Material,
    pub volume_proportion: f64,
    pub mix_proportion: f64,
    /// Frozen when a second entry joins; `volume = mix * ratio` from then on.
    pub volume_to_mix_ratio: f64,
    pub is_limitant: bool,
    pub is_locked: bool,
}

impl MixEntry {
    pub fn id(&self) -> &MaterialId {
        &self.material.id
    }

    /// Quantity this entry would draw from the material.
    pub fn volume_used(&self) -> f64 {
        self.volume_proportion * self.material.total_quantity
    }

    pub fn exceeds_available(&self) -> bool {
        self.volume_used() > self.material.available_quantity + crate::EPSILON
    }
}

pub type Entries = SmallVec<[MixEntry; 8]>;

/// Insertion-ordered set of entries. Every operation returns a new value.
///
/// Only serialized; a `Mix` is built through its operations or
/// [`Mix::from_recipe`], never parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mix {
    pub(crate) entries: Entries,
}

impl Mix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[MixEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &MaterialId) -> Option<&MixEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn limitant(&self) -> Option<&MixEntry> {
        self.entries.iter().find(|entry| entry.is_limitant)
    }

    pub(crate) fn position(&self, id: &MaterialId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// The five mutating operations, in a form scripts and request bodies can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MixCommand {
    AddMaterial { material_id: MaterialId },
    RemoveMaterial { material_id: MaterialId },
    SetVolumeProportion { material_id: MaterialId, value: f64 },
    SetMixProportion { material_id: MaterialId, value: f64 },
    SetLimitant { material_id: MaterialId },
}
