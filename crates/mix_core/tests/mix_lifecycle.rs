//! End-to-end composing sessions against an in-memory catalog, plus a
//! randomized walk that checks the mix invariants after every step.

use mix_core::test_fixtures::{make_rng, material, sample_materials, MemoryCatalog};
use mix_core::{
    apply_command, commit, load_mix, summarize, CategoryThresholds, MaterialCatalog, MaterialId,
    Mix, MixCommand, MixError, RecipeOwnerId, TargetBand,
};
use rand::seq::SliceRandom;
use rand::Rng;

fn mid(id: &str) -> MaterialId {
    MaterialId::from(id)
}

fn assert_invariants(mix: &Mix) {
    if mix.is_empty() {
        return;
    }
    let sum: f64 = mix.entries().iter().map(|e| e.mix_proportion).sum();
    assert!((sum - 1.0).abs() < 1e-9, "mix shares sum to {sum}");

    let limitants = mix.entries().iter().filter(|e| e.is_limitant).count();
    assert_eq!(limitants, 1, "expected exactly one limitant");

    for entry in mix.entries() {
        assert!(
            (0.0..=1.0).contains(&entry.mix_proportion),
            "{} mix share {}",
            entry.id(),
            entry.mix_proportion
        );
        assert!(
            (0.0..=1.0).contains(&entry.volume_proportion),
            "{} volume share {}",
            entry.id(),
            entry.volume_proportion
        );
    }

    if mix.len() == 1 {
        let sole = &mix.entries()[0];
        assert!(sole.is_limitant && !sole.is_locked);
    }
}

#[test]
fn two_material_scenario_blends_to_22() {
    let a = material("a", 10.0, 100.0, 100.0);
    let b = material("b", 40.0, 50.0, 50.0);

    let mix = Mix::new().add_material(a).unwrap();
    assert!((mix.entries()[0].mix_proportion - 1.0).abs() < 1e-12);
    assert!((mix.entries()[0].volume_proportion - 1.0).abs() < 1e-12);

    let mix = mix.add_material(b).unwrap();
    assert!(mix.get(&mid("a")).unwrap().is_limitant);
    assert!(mix.get(&mid("b")).unwrap().mix_proportion.abs() < 1e-12);

    let mix = mix.set_mix_proportion(&mid("a"), 0.6).unwrap();
    assert!((mix.get(&mid("b")).unwrap().mix_proportion - 0.4).abs() < 1e-12);

    let summary = summarize(&mix, &CategoryThresholds::default(), &TargetBand::default());
    assert!((summary.blended_ratio - 22.0).abs() < 1e-9);
}

#[test]
fn three_material_scenario_scales_non_limitants() {
    let mix = Mix::new()
        .add_material(material("a", 10.0, 100.0, 100.0))
        .and_then(|m| m.add_material(material("b", 40.0, 100.0, 100.0)))
        .and_then(|m| m.add_material(material("c", 25.0, 100.0, 100.0)))
        .and_then(|m| m.set_mix_proportion(&mid("a"), 0.5))
        .unwrap();
    // b and c were both at zero, so they split 0.5 evenly; move to 0.3/0.2.
    let mix = mix.set_mix_proportion(&mid("c"), 0.2).unwrap();
    assert!((mix.get(&mid("b")).unwrap().mix_proportion - 0.3).abs() < 1e-12);

    let mix = mix.set_mix_proportion(&mid("a"), 0.6).unwrap();
    let b = mix.get(&mid("b")).unwrap().mix_proportion;
    let c = mix.get(&mid("c")).unwrap().mix_proportion;
    assert!((b - 0.24).abs() < 1e-9);
    assert!((c - 0.16).abs() < 1e-9);
    assert!((b + c - 0.4).abs() < 1e-12);
}

#[test]
fn commit_scenario_leaves_expected_availability() {
    let mut catalog = MemoryCatalog::new(vec![
        material("a", 10.0, 100.0, 100.0),
        material("b", 40.0, 50.0, 50.0),
    ]);
    let owner = RecipeOwnerId::from("pile_7");
    let materials = catalog.list_available_materials().unwrap();

    let mix = Mix::new();
    let mix = apply_command(&mix, &MixCommand::AddMaterial { material_id: mid("a") }, &materials)
        .unwrap();
    let mix = apply_command(&mix, &MixCommand::AddMaterial { material_id: mid("b") }, &materials)
        .unwrap();
    let mix = apply_command(
        &mix,
        &MixCommand::SetVolumeProportion {
            material_id: mid("a"),
            value: 0.5,
        },
        &materials,
    )
    .unwrap();
    assert!((mix.get(&mid("b")).unwrap().volume_proportion - 0.5).abs() < 1e-12);

    let receipt = commit(&mix, &owner, &mut catalog).unwrap();
    assert_eq!(
        receipt
            .movements()
            .iter()
            .map(|(id, amount)| (id.0.as_str(), amount.round() as i64))
            .collect::<Vec<_>>(),
        vec![("a", -50), ("b", -25)]
    );

    let after = catalog.list_available_materials().unwrap();
    assert!((after[0].available_quantity - 50.0).abs() < 1e-9);
    assert!((after[1].available_quantity - 25.0).abs() < 1e-9);

    // Reopening the session restores the same shares.
    let restored = load_mix(&catalog, &owner).unwrap();
    assert!((restored.get(&mid("a")).unwrap().mix_proportion - 0.5).abs() < 1e-9);
    assert!((restored.get(&mid("b")).unwrap().mix_proportion - 0.5).abs() < 1e-9);
}

#[test]
fn quantity_exceeded_leaves_mix_unchanged() {
    let mix = Mix::new()
        .add_material(material("a", 10.0, 100.0, 100.0))
        .and_then(|m| m.add_material(material("b", 40.0, 50.0, 20.0)))
        .unwrap();
    let before = mix.clone();
    let result = mix.set_volume_proportion(&mid("b"), 0.6);
    assert!(matches!(result, Err(MixError::QuantityExceeded { .. })));
    assert_eq!(mix, before);
}

#[test]
fn removing_all_but_one_resets_survivor() {
    let mix = sample_materials()
        .into_iter()
        .try_fold(Mix::new(), |mix, material| mix.add_material(material))
        .unwrap();
    let mix = ["grass", "sawdust", "food", "leaves"]
        .iter()
        .try_fold(mix, |mix, id| mix.remove_material(&mid(id)))
        .unwrap();
    let survivor = &mix.entries()[0];
    assert_eq!(survivor.id(), &mid("coffee"));
    assert!((survivor.mix_proportion - 1.0).abs() < 1e-12);
    assert!(survivor.is_limitant);
    assert!(!survivor.is_locked);
}

fn pick_present(in_mix: &[MaterialId], rng: &mut impl Rng) -> MaterialId {
    in_mix.choose(rng).cloned().unwrap_or_else(|| mid("grass"))
}

fn random_command(mix: &Mix, rng: &mut impl Rng) -> MixCommand {
    let ids = ["grass", "sawdust", "food", "leaves", "coffee"];
    let in_mix: Vec<MaterialId> = mix.entries().iter().map(|e| e.id().clone()).collect();
    match rng.gen_range(0..5) {
        0 => MixCommand::AddMaterial {
            material_id: mid(ids.choose(rng).copied().unwrap_or("grass")),
        },
        1 => MixCommand::RemoveMaterial {
            material_id: pick_present(&in_mix, rng),
        },
        2 => MixCommand::SetVolumeProportion {
            material_id: pick_present(&in_mix, rng),
            value: rng.gen_range(-0.1..1.1),
        },
        3 => MixCommand::SetMixProportion {
            material_id: pick_present(&in_mix, rng),
            value: rng.gen_range(-0.1..1.1),
        },
        _ => MixCommand::SetLimitant {
            material_id: pick_present(&in_mix, rng),
        },
    }
}

#[test]
fn random_walk_preserves_invariants() {
    let mut rng = make_rng();
    let materials = sample_materials();
    let mut mix = Mix::new();
    let mut applied = 0;

    for _ in 0..2_000 {
        let command = random_command(&mix, &mut rng);
        match apply_command(&mix, &command, &materials) {
            Ok(next) => {
                assert_invariants(&next);
                mix = next;
                applied += 1;
            }
            Err(_) => assert_invariants(&mix),
        }
    }
    assert!(applied > 100, "only {applied} commands applied");
}
