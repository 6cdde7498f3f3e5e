/// Scene loading and registry integration tests against the RON
/// fixtures under tests/fixtures/.

use scene_engine::core::registry::{RegistryError, SceneRegistry};
use scene_engine::schema::scene::{SceneDefinition, TextSpec, ValidationError};
use std::path::Path;

fn load(name: &str) -> SceneDefinition {
    let path = format!("tests/fixtures/{}.ron", name);
    SceneDefinition::load_from_ron(Path::new(&path)).unwrap()
}

#[test]
fn fixtures_parse_and_validate() {
    let ambush = load("goblin_ambush");
    assert_eq!(ambush.id, "goblin_ambush");
    assert_eq!(ambush.title.as_deref(), Some("Goblin Ambush"));
    assert!(ambush.has_tag("combat"));
    assert!(ambush.validate().is_ok());

    let mill = load("haunted_mill");
    assert!(mill.validate().is_ok());
    assert_eq!(mill.nodes["aftermath"].delay, 2.0);
}

#[test]
fn fixture_defaults_apply() {
    let ambush = load("goblin_ambush");
    let start = &ambush.nodes["start"];

    // Unannotated choices hide themselves when gated; the bribe
    // choice opts into disabled display instead.
    assert!(start.choices[0].hidden);
    assert!(!start.choices[2].hidden);
    assert!(start.choices[2].disabled_text.is_some());

    assert_eq!(start.delay, 0.0);
    assert!(!start.is_ending);
    assert!(matches!(
        &ambush.nodes["end_flee"].text,
        TextSpec::Pool(pool) if pool.len() == 2
    ));
}

#[test]
fn broken_fixture_reports_dangling_goto() {
    let broken = load("broken_bridge");
    let problems = broken.problems();
    assert_eq!(problems.len(), 1);
    assert!(matches!(
        &problems[0],
        ValidationError::DanglingGoto { target, .. } if target == "other_side"
    ));
}

#[test]
fn registry_refuses_broken_fixture() {
    let registry = SceneRegistry::new();
    assert!(matches!(
        registry.register(load("broken_bridge")),
        Err(RegistryError::Validation(_))
    ));
    assert!(registry.is_empty());
}

#[test]
fn registry_round_trip_with_fixtures() {
    let registry = SceneRegistry::new();
    registry.register(load("goblin_ambush")).unwrap();
    registry.register(load("haunted_mill")).unwrap();
    registry.register(load("mill_dream")).unwrap();
    assert_eq!(registry.len(), 3);

    let spooky = registry.by_tag("spooky");
    assert_eq!(spooky.len(), 2);

    // Lookups share one immutable definition.
    let a = registry.lookup("goblin_ambush").unwrap();
    let b = registry.lookup("goblin_ambush").unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));

    assert!(registry.unregister("mill_dream"));
    assert!(matches!(
        registry.lookup("mill_dream"),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn hot_reload_replaces_definition() {
    let registry = SceneRegistry::new();
    registry.register(load("goblin_ambush")).unwrap();

    let mut updated = load("goblin_ambush");
    updated.title = Some("Goblin Ambush, Revised".to_string());
    assert!(matches!(
        registry.register(updated.clone()),
        Err(RegistryError::Duplicate(_))
    ));

    registry.unregister("goblin_ambush");
    registry.register(updated).unwrap();
    let def = registry.lookup("goblin_ambush").unwrap();
    assert_eq!(def.title.as_deref(), Some("Goblin Ambush, Revised"));
}
