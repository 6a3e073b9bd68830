//! Mix model transitions.
//!
//! Each operation borrows the current `Mix` and returns a new one, or an
//! error with the original untouched.

use crate::redistribute::{make_sole, redistribute, redistribute_with_pin};
use crate::{Entries, Material, MaterialId, Mix, MixEntry, MixError, RecipeLine, EPSILON};

impl Mix {
    /// Adds a material at zero share; the first material starts as the sole
    /// limitant at full share.
    pub fn add_material(&self, material: Material) -> Result<Mix, MixError> {
        if self.position(&material.id).is_some() {
            return Err(MixError::DuplicateMaterial(material.id));
        }

        let mut entries = self.entries.clone();
        if entries.is_empty() {
            let volume = initial_volume_share(&material);
            entries.push(MixEntry {
                material,
                volume_proportion: volume,
                mix_proportion: 1.0,
                volume_to_mix_ratio: volume,
                is_limitant: true,
                is_locked: false,
            });
            return Ok(Mix { entries });
        }

        if entries.len() == 1 {
            let first = &mut entries[0];
            first.volume_to_mix_ratio = ratio_of(first.volume_proportion, first.mix_proportion);
            first.is_locked = true;
        }
        entries.push(MixEntry {
            material,
            volume_proportion: 0.0,
            mix_proportion: 0.0,
            volume_to_mix_ratio: 1.0,
            is_limitant: false,
            is_locked: true,
        });

        self.finish(redistribute(&entries))
    }

    pub fn remove_material(&self, id: &MaterialId) -> Result<Mix, MixError> {
        let index = self.require(id)?;
        let was_limitant = self.entries[index].is_limitant;

        let mut entries = self.entries.clone();
        entries.remove(index);

        match entries.len() {
            0 => Ok(Mix { entries }),
            1 => {
                make_sole(&mut entries[0]);
                Ok(Mix { entries })
            }
            _ => {
                if was_limitant {
                    entries[0].is_limitant = true;
                }
                self.finish(redistribute(&entries))
            }
        }
    }

    /// Sets the share of total volume an entry contributes.
    ///
    /// On a multi-entry mix the request is converted into a mix share through
    /// the entry's frozen ratio and handed to [`Mix::set_mix_proportion`].
    pub fn set_volume_proportion(&self, id: &MaterialId, value: f64) -> Result<Mix, MixError> {
        let index = self.require(id)?;
        let entry = &self.entries[index];

        let requested = value * entry.material.total_quantity;
        if requested > entry.material.available_quantity + EPSILON {
            return Err(MixError::QuantityExceeded {
                material_id: id.clone(),
                requested,
                available: entry.material.available_quantity,
            });
        }
        check_range(id, value)?;

        if self.entries.len() == 1 {
            let mut entries = self.entries.clone();
            let sole = &mut entries[0];
            sole.volume_proportion = value;
            sole.volume_to_mix_ratio = ratio_of(value, sole.mix_proportion);
            return Ok(Mix { entries });
        }

        // A zero ratio maps every mix share to zero volume; a share above one
        // means the volume can't be reached through the frozen ratio.
        let share = if entry.volume_to_mix_ratio <= EPSILON {
            f64::INFINITY
        } else {
            value / entry.volume_to_mix_ratio
        };
        if share > 1.0 + EPSILON {
            return Err(MixError::OutOfRange {
                material_id: id.clone(),
                value,
            });
        }
        self.set_mix_proportion(id, share.min(1.0))
    }

    /// Sets the blend-weighting share of an entry.
    ///
    /// The limitant drives everything else. In a two-entry mix the other
    /// entry is fully derived and rejects direct edits; with three or more,
    /// a non-limitant entry may take up to whatever the limitant leaves.
    pub fn set_mix_proportion(&self, id: &MaterialId, value: f64) -> Result<Mix, MixError> {
        let index = self.require(id)?;
        check_range(id, value)?;

        if self.entries.len() == 1 {
            return Ok(Mix {
                entries: redistribute(&self.entries),
            });
        }

        let mut entries = self.entries.clone();
        if entries[index].is_limitant {
            set_driven(&mut entries[index], value);
            return self.finish(redistribute(&entries));
        }

        if entries.len() == 2 {
            return Err(MixError::Locked(id.clone()));
        }

        let remaining = self
            .limitant()
            .map_or(0.0, |limitant| 1.0 - limitant.mix_proportion);
        if value > remaining + EPSILON {
            return Err(MixError::InsufficientRemainingProportion {
                material_id: id.clone(),
                requested: value,
                remaining,
            });
        }

        set_driven(&mut entries[index], value.min(remaining));
        self.finish(redistribute_with_pin(&entries, Some(index)))
    }

    /// Moves the limitant flag and rebalances around the new limitant.
    /// A mix with one entry (or none) is returned unchanged.
    pub fn set_limitant(&self, id: &MaterialId) -> Result<Mix, MixError> {
        let index = self.require(id)?;
        if self.entries.len() <= 1 {
            return Ok(self.clone());
        }

        let mut entries = self.entries.clone();
        for (position, entry) in entries.iter_mut().enumerate() {
            entry.is_limitant = position == index;
        }
        self.finish(redistribute(&entries))
    }

    /// Rebuilds a mix from stored recipe lines. The first line becomes the
    /// limitant; shares are rebalanced once so they sum to one.
    pub fn from_recipe(lines: &[RecipeLine], materials: &[Material]) -> Result<Mix, MixError> {
        let mut entries = Entries::new();
        for (position, line) in lines.iter().enumerate() {
            let material = materials
                .iter()
                .find(|material| material.id == line.material_id)
                .cloned()
                .ok_or_else(|| MixError::NotFound(line.material_id.clone()))?;
            if entries.iter().any(|entry: &MixEntry| entry.id() == &line.material_id) {
                return Err(MixError::DuplicateMaterial(line.material_id.clone()));
            }
            let proportion = line.proportion.clamp(0.0, 1.0);
            entries.push(MixEntry {
                material,
                volume_proportion: proportion,
                mix_proportion: proportion,
                volume_to_mix_ratio: 1.0,
                is_limitant: position == 0,
                is_locked: lines.len() > 1,
            });
        }
        Ok(Mix {
            entries: redistribute(&entries),
        })
    }

    fn require(&self, id: &MaterialId) -> Result<usize, MixError> {
        self.position(id)
            .ok_or_else(|| MixError::NotFound(id.clone()))
    }

    /// Accepts a redistributed entry set unless it pushes any entry's volume
    /// past what its material has available.
    fn finish(&self, entries: Entries) -> Result<Mix, MixError> {
        for entry in &entries {
            let previous = self
                .get(entry.id())
                .map_or(0.0, |before| before.volume_proportion);
            let grew = entry.volume_proportion > previous + EPSILON;
            if grew && entry.exceeds_available() {
                return Err(MixError::QuantityExceeded {
                    material_id: entry.id().clone(),
                    requested: entry.volume_used(),
                    available: entry.material.available_quantity,
                });
            }
        }
        Ok(Mix { entries })
    }
}

fn check_range(id: &MaterialId, value: f64) -> Result<(), MixError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MixError::OutOfRange {
            material_id: id.clone(),
            value,
        })
    }
}

fn set_driven(entry: &mut MixEntry, mix_proportion: f64) {
    entry.mix_proportion = mix_proportion;
    entry.volume_proportion = (mix_proportion * entry.volume_to_mix_ratio).clamp(0.0, 1.0);
}

fn ratio_of(volume: f64, mix: f64) -> f64 {
    if mix <= EPSILON {
        1.0
    } else {
        volume / mix
    }
}

/// Full share when the material is untouched, otherwise whatever fraction of
/// the total is still available.
///
/// Keeps the first entry within `volume_used <= available_quantity` from the
/// start. Starting a partially consumed material at a full share would put
/// the mix over its availability before the user touched anything, and
/// `can_commit` would be false with no edit to blame.
fn initial_volume_share(material: &Material) -> f64 {
    if material.total_quantity <= EPSILON {
        return 1.0;
    }
    (material.available_quantity / material.total_quantity).clamp(0.0, 1.0)
}
