//! End-to-end simulation ticks through the public API.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use simstate_core::{
    ActionOutcome, AgentAction, AgentStatus, Coordinator, DecisionError, DecisionMaker,
    DecisionRequest, Error, JsonFileStore, PersistenceStatus, Perception, RoomDef, SimConfig,
    StateStore, Tile,
};

/// Walks one tile east every tick.
struct EastWalker;

#[async_trait]
impl DecisionMaker for EastWalker {
    async fn decide(&self, request: &DecisionRequest) -> Result<AgentAction, DecisionError> {
        let here = request.position.tile;
        Ok(AgentAction::Move {
            to: Tile::new(here.x + 1, here.y),
        })
    }
}

fn town() -> SimConfig {
    let mut config = SimConfig::default();
    config.spatial.rooms = vec![
        RoomDef::rect("west", Tile::new(0, 0), Tile::new(9, 9))
            .connected_to(["east"])
            .with_exit(),
        RoomDef::rect("east", Tile::new(10, 0), Tile::new(19, 9)),
    ];
    config
}

async fn tick(coordinator: &Coordinator, agents: &[String], now: i64) -> usize {
    let batch = agents
        .iter()
        .map(|id| (id.clone(), Perception::at(now).with_focus("walk")))
        .collect();
    let proposals = coordinator.plan_batch(batch, None).await;

    let outcomes = proposals
        .into_iter()
        .filter_map(|proposal| {
            let plan_id = proposal.plan_id?;
            let AgentAction::Move { to } = proposal.action else {
                return None;
            };
            let outcome = ActionOutcome::new(plan_id, now, format!("walked to ({}, {})", to.x, to.y), 3)
                .moved_to(to)
                .with_tags(["walk"]);
            Some((proposal.agent_id, outcome))
        })
        .collect();

    coordinator
        .confirm_batch(outcomes)
        .await
        .into_iter()
        .filter(|r| r.result.is_ok())
        .count()
}

#[tokio::test]
async fn test_agents_walk_across_rooms_and_reload() {
    // Arrange
    let dir = tempdir().unwrap();
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let coordinator = Coordinator::builder(town(), Arc::new(EastWalker))
        .store(Arc::clone(&store))
        .build()
        .unwrap();
    let agents: Vec<String> = (0..5).map(|i| format!("agent-{i}")).collect();
    for (row, id) in agents.iter().enumerate() {
        coordinator
            .register_agent(id, Tile::new(7, row as i32), 0)
            .unwrap();
    }

    // Act
    for now in 1..=4 {
        assert_eq!(tick(&coordinator, &agents, now).await, agents.len());
    }

    // Assert
    for id in &agents {
        let position = coordinator.position(id).unwrap();
        assert_eq!(position.tile.x, 11);
        assert_eq!(position.room.as_deref(), Some("east"));
        assert_eq!(coordinator.status(id).unwrap(), AgentStatus::Idle);
        assert_eq!(coordinator.relevant_memories(id, "walk", 10, 1).unwrap().len(), 4);
    }

    let reloaded = Coordinator::builder(town(), Arc::new(EastWalker))
        .store(store)
        .build()
        .unwrap();
    assert_eq!(reloaded.load_all().await.unwrap(), agents.len());
    assert_eq!(reloaded.position("agent-3").unwrap().tile, Tile::new(11, 3));
    let walked = reloaded.relevant_memories("agent-3", "walked", 10, 1).unwrap();
    assert_eq!(walked[0].description(), "walked to (11, 3)");
}

#[tokio::test]
async fn test_unconnected_room_blocks_movement_options() {
    let mut config = town();
    config.spatial.rooms.push(RoomDef::rect("vault", Tile::new(20, 0), Tile::new(25, 5)));
    let coordinator = Coordinator::builder(config, Arc::new(EastWalker)).build().unwrap();
    coordinator.register_agent("a1", Tile::new(19, 2), 0).unwrap();

    let options = coordinator.movement_options("a1", 2).unwrap();

    assert!(options.iter().all(|tile| tile.x < 20));
    assert!(options.contains(&Tile::new(18, 2)));
}

#[tokio::test]
async fn test_concurrent_plans_allow_one_in_flight() {
    // Arrange
    struct Counting(AtomicUsize);

    #[async_trait]
    impl DecisionMaker for Counting {
        async fn decide(&self, _request: &DecisionRequest) -> Result<AgentAction, DecisionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(AgentAction::Observe)
        }
    }

    let decider = Arc::new(Counting(AtomicUsize::new(0)));
    let coordinator = Arc::new(
        Coordinator::builder(town(), decider.clone())
            .build()
            .unwrap(),
    );
    coordinator.register_agent("a1", Tile::new(1, 1), 0).unwrap();

    // Act
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.plan("a1", Perception::at(1), None).await })
        })
        .collect();
    let mut accepted = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(proposal) => accepted.push(proposal),
            Err(Error::ActionInFlight { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Assert
    assert_eq!(accepted.len(), 1);
    assert_eq!(decider.0.load(Ordering::SeqCst), 1);
    let ack = coordinator
        .confirm(
            "a1",
            ActionOutcome::new(accepted[0].plan_id.unwrap(), 2, "looked around", 2),
        )
        .await
        .unwrap();
    assert_eq!(ack.persistence, PersistenceStatus::Skipped);
}
