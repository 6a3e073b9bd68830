//! Aggregate figures for a mix. Pure functions of the current entries.

use serde::{Deserialize, Serialize};

use crate::{Category, CategoryThresholds, MaterialId, Mix, TargetBand};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub high_nitrogen: f64,
    pub green: f64,
    pub brown: f64,
}

impl CategoryBreakdown {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::HighNitrogen => self.high_nitrogen,
            Category::Green => self.green,
            Category::Brown => self.brown,
        }
    }

    fn add(&mut self, category: Category, share: f64) {
        match category {
            Category::HighNitrogen => self.high_nitrogen += share,
            Category::Green => self.green += share,
            Category::Brown => self.brown += share,
        }
    }
}

/// What to add to bring the blended ratio into the target band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    /// Too rich in nitrogen; add brown material.
    AddCarbon,
    /// Too much carbon; add nitrogen-rich material.
    AddNitrogen,
    Balanced,
}

impl Recommendation {
    pub fn advice(self) -> &'static str {
        match self {
            Recommendation::AddCarbon => {
                "The mix is too rich in nitrogen. Consider adding more brown materials to increase the C:N ratio."
            }
            Recommendation::AddNitrogen => {
                "The mix has too much carbon. Add more nitrogen-rich materials to lower the C:N ratio."
            }
            Recommendation::Balanced => "The C:N ratio is within the target range.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub material_id: MaterialId,
    pub name: String,
    pub category: Category,
    pub mix_proportion: f64,
    pub volume_proportion: f64,
    pub volume_used: f64,
    pub available_quantity: f64,
    pub exceeds_available: bool,
    pub is_limitant: bool,
    pub is_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixSummary {
    pub total_volume: f64,
    pub blended_ratio: f64,
    pub categories: CategoryBreakdown,
    pub lines: Vec<SummaryLine>,
    pub recommendation: Option<Recommendation>,
    pub can_commit: bool,
}

/// `Σ total_quantity × volume_proportion`.
pub fn total_volume(mix: &Mix) -> f64 {
    mix.entries().iter().map(crate::MixEntry::volume_used).sum()
}

/// `Σ mix_proportion × ratio`.
pub fn blended_ratio(mix: &Mix) -> f64 {
    mix.entries()
        .iter()
        .map(|entry| entry.mix_proportion * entry.material.ratio)
        .sum()
}

pub fn category_breakdown(mix: &Mix, thresholds: &CategoryThresholds) -> CategoryBreakdown {
    let mut breakdown = CategoryBreakdown::default();
    for entry in mix.entries() {
        breakdown.add(thresholds.classify(entry.material.ratio), entry.mix_proportion);
    }
    breakdown
}

pub fn recommend(blended_ratio: f64, band: &TargetBand) -> Option<Recommendation> {
    if blended_ratio <= 0.0 {
        None
    } else if blended_ratio < band.min {
        Some(Recommendation::AddCarbon)
    } else if blended_ratio > band.max {
        Some(Recommendation::AddNitrogen)
    } else {
        Some(Recommendation::Balanced)
    }
}

pub fn summarize(mix: &Mix, thresholds: &CategoryThresholds, band: &TargetBand) -> MixSummary {
    let lines: Vec<SummaryLine> = mix
        .entries()
        .iter()
        .map(|entry| SummaryLine {
            material_id: entry.id().clone(),
            name: entry.material.name.clone(),
            category: thresholds.classify(entry.material.ratio),
            mix_proportion: entry.mix_proportion,
            volume_proportion: entry.volume_proportion,
            volume_used: entry.volume_used(),
            available_quantity: entry.material.available_quantity,
            exceeds_available: entry.exceeds_available(),
            is_limitant: entry.is_limitant,
            is_locked: entry.is_locked,
        })
        .collect();
    let ratio = blended_ratio(mix);
    MixSummary {
        total_volume: total_volume(mix),
        blended_ratio: ratio,
        categories: category_breakdown(mix, thresholds),
        can_commit: !lines.is_empty() && lines.iter().all(|line| !line.exceeds_available),
        recommendation: recommend(ratio, band),
        lines,
    }
}
