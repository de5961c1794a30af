//! Structural-change behavior: migrations, interning, swap-with-last.

use colonnade::prelude::*;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Default, Debug, Clone, PartialEq)]
struct Name(String);

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Frozen;

#[test]
fn test_add_then_remove_returns_to_original_archetype() {
    let mut world = World::new();
    let entity = world.spawn().unwrap();
    world.insert(entity, Position { x: 3.0, y: 4.0 }).unwrap();
    let original = world.archetype_of(entity).unwrap();

    world.insert(entity, Velocity { x: 1.0, y: 1.0 }).unwrap();
    assert_ne!(world.archetype_of(entity).unwrap(), original);

    world.remove_component::<Velocity>(entity).unwrap();
    assert_eq!(world.archetype_of(entity).unwrap(), original);
    // the retained component kept its value through both migrations
    assert_eq!(
        world.get::<Position>(entity),
        Some(&Position { x: 3.0, y: 4.0 })
    );
}

#[test]
fn test_adding_present_kind_is_noop() {
    let mut world = World::new();
    let entity = world.spawn().unwrap();
    world.insert(entity, Position { x: 9.0, y: 9.0 }).unwrap();
    let archetype = world.archetype_of(entity).unwrap();
    let chunk_count = world.chunk_count();

    let slot = world.add_component::<Position>(entity).unwrap();
    assert_eq!(*slot, Position { x: 9.0, y: 9.0 });

    assert_eq!(world.archetype_of(entity).unwrap(), archetype);
    assert_eq!(world.chunk_count(), chunk_count);
}

#[test]
fn test_removing_absent_kind_is_noop() {
    let mut world = World::new();
    let entity = world.spawn().unwrap();
    world.insert(entity, Position::default()).unwrap();
    let archetype = world.archetype_of(entity).unwrap();

    world.remove_component::<Velocity>(entity).unwrap();
    assert_eq!(world.archetype_of(entity).unwrap(), archetype);
}

#[test]
fn test_interning_is_path_independent() {
    let mut world = World::new();

    let first = world.spawn().unwrap();
    world.insert(first, Position::default()).unwrap();
    world.insert(first, Velocity::default()).unwrap();

    let second = world.spawn().unwrap();
    world.insert(second, Velocity::default()).unwrap();
    world.insert(second, Position::default()).unwrap();

    // add A then B and add B then A resolve to the same interned archetype
    assert_eq!(
        world.archetype_of(first).unwrap(),
        world.archetype_of(second).unwrap()
    );
}

#[test]
fn test_swap_with_last_updates_displaced_record() {
    let mut world = World::new();
    let mut spawned = Vec::new();
    for i in 0..3 {
        let entity = world.spawn().unwrap();
        world
            .insert(
                entity,
                Position {
                    x: i as f32,
                    y: 0.0,
                },
            )
            .unwrap();
        spawned.push(entity);
    }

    // removing the first entity swaps the last one into its slot
    world.despawn(spawned[0]).unwrap();

    assert_eq!(world.get::<Position>(spawned[1]).unwrap().x, 1.0);
    assert_eq!(world.get::<Position>(spawned[2]).unwrap().x, 2.0);
    assert!(!world.is_alive(spawned[0]));
}

#[test]
fn test_heap_values_survive_migration() {
    let mut world = World::new();
    let entity = world.spawn().unwrap();
    world.insert(entity, Name("persephone".to_string())).unwrap();
    world.insert(entity, Position { x: 1.0, y: 1.0 }).unwrap();
    world.insert(entity, Velocity { x: 2.0, y: 2.0 }).unwrap();
    world.remove_component::<Position>(entity).unwrap();

    assert_eq!(world.get::<Name>(entity).unwrap().0, "persephone");
    assert_eq!(
        world.get::<Velocity>(entity),
        Some(&Velocity { x: 2.0, y: 2.0 })
    );
    assert!(world.get::<Position>(entity).is_none());
}

#[test]
fn test_removing_last_component_keeps_entity_alive() {
    let mut world = World::new();
    let entity = world.spawn().unwrap();
    world.insert(entity, Position::default()).unwrap();
    world.remove_component::<Position>(entity).unwrap();

    assert!(world.is_alive(entity));
    let identity = world.archetype_of(entity).unwrap();
    assert!(world.archetype(identity).unwrap().ids().is_empty());
}

#[test]
fn test_zero_sized_components() {
    let mut world = World::new();
    let entity = world.spawn().unwrap();
    world.insert(entity, Frozen).unwrap();
    world.insert(entity, Position { x: 5.0, y: 5.0 }).unwrap();

    assert!(world.has_component::<Frozen>(entity));
    assert_eq!(world.get::<Position>(entity).unwrap().x, 5.0);

    world.remove_component::<Frozen>(entity).unwrap();
    assert!(!world.has_component::<Frozen>(entity));
    assert_eq!(world.get::<Position>(entity).unwrap().x, 5.0);
}

#[test]
fn test_failed_structural_op_leaves_entity_intact() {
    let mut world = World::new();
    let live = world.spawn().unwrap();
    world.insert(live, Position { x: 8.0, y: 8.0 }).unwrap();

    let dead = world.spawn().unwrap();
    world.despawn(dead).unwrap();

    assert!(world.add_component::<Velocity>(dead).is_err());
    assert!(world.remove_component::<Position>(dead).is_err());

    // the failing calls touched no storage shared with the live entity
    assert_eq!(world.get::<Position>(live), Some(&Position { x: 8.0, y: 8.0 }));
    assert!(world.is_alive(live));
}
