//! Tests for agent state and the registry.

use super::*;
use crate::error::Error;
use crate::memory::{EpisodicMemory, NewEvent, RetentionPolicy};
use crate::spatial::{RoomDef, RoomTable, SpatialWorld, Tile};
use std::sync::Arc;

fn world() -> Arc<SpatialWorld> {
    let rooms = RoomTable::new(
        vec![RoomDef::rect("kitchen", Tile::new(0, 0), Tile::new(4, 4))],
        4,
    )
    .unwrap();
    Arc::new(SpatialWorld::new(rooms))
}

fn agent(id: &str, tile: Tile, world: &Arc<SpatialWorld>) -> AgentState {
    AgentState::new(id, tile, 0, EpisodicMemory::default(), Arc::clone(world))
}

#[test]
fn test_new_agent_is_idle() {
    let world = world();
    let state = agent("a1", Tile::new(1, 1), &world);

    assert_eq!(state.status(), AgentStatus::Idle);
    assert!(state.pending().is_none());
    assert_eq!(state.position().room.as_deref(), Some("kitchen"));
}

#[test]
fn test_snapshot_round_trip() {
    // Arrange
    let world = world();
    let mut state = agent("a1", Tile::new(1, 1), &world);
    state
        .memory_mut()
        .add_event(NewEvent::new(3, "kitchen", "saw a lamp", 4))
        .unwrap();
    state
        .tracker_mut()
        .update_position(Tile::new(7, 7), None, 3)
        .unwrap();
    let snapshot = state.snapshot();
    state.release();

    // Act
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: AgentSnapshot = serde_json::from_str(&json).unwrap();
    let restored = AgentState::from_snapshot(parsed, 10, RetentionPolicy::LowestSalience, Arc::clone(&world));

    // Assert
    assert_eq!(restored.snapshot(), snapshot);
    assert_eq!(restored.position().room, None);
    assert_eq!(world.occupancy().tile_of("a1"), Some(Tile::new(7, 7)));
}

#[test]
fn test_registry_rejects_duplicates_without_side_effects() {
    let world = world();
    let registry = AgentRegistry::new();
    registry
        .insert_with("a1", || agent("a1", Tile::new(1, 1), &world))
        .unwrap();

    let again = registry.insert_with("a1", || agent("a1", Tile::new(3, 3), &world));

    assert!(matches!(again, Err(Error::AgentExists(id)) if id == "a1"));
    assert_eq!(world.occupancy().tile_of("a1"), Some(Tile::new(1, 1)));
}

#[test]
fn test_registry_lookup_and_removal() {
    let world = world();
    let registry = AgentRegistry::new();
    for id in ["b", "a", "c"] {
        registry
            .insert_with(id, || agent(id, Tile::new(0, 0), &world))
            .unwrap();
    }

    assert_eq!(registry.ids(), vec!["a", "b", "c"]);
    assert!(registry.get("b").is_ok());
    assert!(registry.remove("b").is_ok());
    assert!(matches!(registry.get("b"), Err(Error::AgentNotFound(_))));
    assert!(matches!(registry.remove("b"), Err(Error::AgentNotFound(_))));
    assert_eq!(registry.len(), 2);
}
