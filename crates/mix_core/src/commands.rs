use crate::{Material, MaterialId, Mix, MixCommand, MixError};

/// Applies one command to `mix`. `materials` resolves the id carried by
/// `AddMaterial`; other commands only look at the mix itself.
pub fn apply_command(
    mix: &Mix,
    command: &MixCommand,
    materials: &[Material],
) -> Result<Mix, MixError> {
    match command {
        MixCommand::AddMaterial { material_id } => {
            let material = find_material(materials, material_id)?;
            mix.add_material(material.clone())
        }
        MixCommand::RemoveMaterial { material_id } => mix.remove_material(material_id),
        MixCommand::SetVolumeProportion { material_id, value } => {
            mix.set_volume_proportion(material_id, *value)
        }
        MixCommand::SetMixProportion { material_id, value } => {
            mix.set_mix_proportion(material_id, *value)
        }
        MixCommand::SetLimitant { material_id } => mix.set_limitant(material_id),
    }
}

/// Applies commands in order, stopping at the first failure.
pub fn apply_commands(
    mix: &Mix,
    commands: &[MixCommand],
    materials: &[Material],
) -> Result<Mix, MixError> {
    commands
        .iter()
        .try_fold(mix.clone(), |current, command| {
            apply_command(&current, command, materials)
        })
}

fn find_material<'a>(
    materials: &'a [Material],
    material_id: &MaterialId,
) -> Result<&'a Material, MixError> {
    materials
        .iter()
        .find(|material| &material.id == material_id)
        .ok_or_else(|| MixError::NotFound(material_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::sample_materials;

    #[test]
    fn commands_parse_from_tagged_json() {
        let json = r#"[
            {"op": "add_material", "material_id": "grass"},
            {"op": "add_material", "material_id": "sawdust"},
            {"op": "set_mix_proportion", "material_id": "grass", "value": 0.8}
        ]"#;
        let commands: Vec<MixCommand> = serde_json::from_str(json).unwrap();
        let mix = apply_commands(&Mix::new(), &commands, &sample_materials()).unwrap();
        let sawdust = mix.get(&MaterialId::from("sawdust")).unwrap();
        assert!((sawdust.mix_proportion - 0.2).abs() < 1e-12);
    }

    #[test]
    fn add_unknown_material_is_not_found() {
        let command = MixCommand::AddMaterial {
            material_id: MaterialId::from("unobtainium"),
        };
        assert_eq!(
            apply_command(&Mix::new(), &command, &sample_materials()),
            Err(MixError::NotFound(MaterialId::from("unobtainium")))
        );
    }

    #[test]
    fn failure_midway_keeps_nothing() {
        let commands = vec![
            MixCommand::AddMaterial {
                material_id: MaterialId::from("grass"),
            },
            MixCommand::AddMaterial {
                material_id: MaterialId::from("grass"),
            },
        ];
        let start = Mix::new();
        assert!(apply_commands(&start, &commands, &sample_materials()).is_err());
        assert!(start.is_empty());
    }
}
