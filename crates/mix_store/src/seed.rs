use mix_core::MaterialId;

use crate::records::MaterialRecord;

fn residue(
    id: &str,
    name: &str,
    description: &str,
    location: &str,
    ratio: f64,
    quantity: f64,
) -> MaterialRecord {
    MaterialRecord {
        description: Some(description.to_string()),
        location: Some(location.to_string()),
        ..MaterialRecord::new(MaterialId::from(id), name, ratio, quantity)
    }
}

/// Five residue batches covering every category.
pub fn sample_materials() -> Vec<MaterialRecord> {
    vec![
        residue("res_grass", "Local Farm A", "Fresh grass clippings", "North Field", 17.0, 2.5),
        residue("res_sawdust", "Wood Mill B", "Sawdust", "Storage Unit 1", 325.0, 4.0),
        residue("res_food", "Restaurant C", "Food scraps", "Kitchen Waste Bin", 12.0, 1.2),
        residue("res_leaves", "Garden Center D", "Fallen leaves", "Compost Area", 60.0, 3.0),
        residue("res_coffee", "Coffee Shop E", "Coffee grounds", "Waste Collection", 20.0, 0.8),
    ]
}
