//! Tests for config module

#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::memory::RetentionPolicy;
    use crate::spatial::{DistanceMetric, RoomShape, Tile};

    // ========================================================================
    // Defaults
    // ========================================================================

    #[test]
    fn test_config_default_values() {
        // Arrange & Act
        let config = SimConfig::default();

        // Assert
        assert_eq!(config.cache.capacity, 4096);
        assert_eq!(config.memory.capacity, 1_000);
        assert_eq!(config.memory.retention, RetentionPolicy::LowestSalience);
        assert_eq!(config.spatial.metric, DistanceMetric::Chebyshev);
        assert_eq!(config.coordinator.decision_timeout_ms, 5_000);
        assert_eq!(config.persistence.backend, PersistenceBackend::Memory);
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_proximity_ttl_zero_disables_expiry() {
        let mut config = CacheConfig::default();
        assert_eq!(config.proximity_ttl(), Some(std::time::Duration::from_secs(2)));

        config.proximity_ttl_ms = 0;

        assert_eq!(config.proximity_ttl(), None);
    }

    #[test]
    fn test_coordinator_retry_mapping() {
        let config = CoordinatorConfig {
            decision_retries: 4,
            retry_initial_delay_ms: 10,
            retry_max_delay_ms: 50,
            ..CoordinatorConfig::default()
        };

        let retry = config.retry();

        assert_eq!(retry.max_retries, 4);
        assert_eq!(retry.initial_delay.as_millis(), 10);
        assert_eq!(retry.max_delay.as_millis(), 50);
    }

    #[test]
    fn test_persistence_retry_mapping() {
        let config = PersistenceConfig {
            save_retries: 3,
            retry_initial_delay_ms: 5,
            retry_max_delay_ms: 40,
            ..PersistenceConfig::default()
        };

        let retry = config.retry();

        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.initial_delay.as_millis(), 5);
        assert_eq!(retry.max_delay.as_millis(), 40);
        assert_eq!(PersistenceConfig::default().retry().max_retries, 2);
    }

    // ========================================================================
    // TOML
    // ========================================================================

    #[test]
    fn test_config_from_toml_minimal() {
        // Arrange
        let toml_str = r#"
            [memory]
            capacity = 50
            retention = "oldest_first"
        "#;

        // Act
        let config = SimConfig::from_toml(toml_str).expect("parse");

        // Assert
        assert_eq!(config.memory.capacity, 50);
        assert_eq!(config.memory.retention, RetentionPolicy::OldestFirst);
        assert_eq!(config.coordinator.context_limit, 10);
    }

    #[test]
    fn test_config_from_toml_with_rooms() {
        // Arrange
        let toml_str = r#"
            [spatial]
            metric = "euclidean"

            [[spatial.rooms]]
            name = "kitchen"
            connections = ["hall"]
            shape = { kind = "rect", min = { x = 0, y = 0 }, max = { x = 4, y = 4 } }

            [[spatial.rooms]]
            name = "hall"
            exits_outside = true
            shape = { kind = "rect", min = { x = 5, y = 0 }, max = { x = 9, y = 4 } }
        "#;

        // Act
        let config = SimConfig::from_toml(toml_str).expect("parse");

        // Assert
        assert_eq!(config.spatial.metric, DistanceMetric::Euclidean);
        assert_eq!(config.spatial.rooms.len(), 2);
        assert_eq!(
            config.spatial.rooms[0].shape,
            RoomShape::Rect {
                min: Tile::new(0, 0),
                max: Tile::new(4, 4)
            }
        );
        assert!(config.spatial.rooms[1].exits_outside);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml_invalid_policy() {
        let result = SimConfig::from_toml("[memory]\nretention = \"random\"");

        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_config_validate_zero_timeout() {
        let mut config = SimConfig::default();
        config.coordinator.decision_timeout_ms = 0;

        let err = config.validate().unwrap_err();

        assert!(err.to_string().contains("coordinator.decision_timeout_ms"));
    }

    #[test]
    fn test_config_validate_min_salience_range() {
        let mut config = SimConfig::default();
        config.coordinator.context_min_salience = 11;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "coordinator.context_min_salience"
        ));
    }

    #[test]
    fn test_config_validate_invalid_log_level() {
        let mut config = SimConfig::default();
        config.logging.level = "loud".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_bad_room_table() {
        let config = SimConfig::from_toml(
            r#"
            [[spatial.rooms]]
            name = "kitchen"
            connections = ["nowhere"]
            shape = { kind = "rect", min = { x = 0, y = 0 }, max = { x = 4, y = 4 } }
            "#,
        )
        .expect("parse");

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "spatial.rooms"
        ));
    }

    #[test]
    fn test_config_validate_json_backend_needs_dir() {
        let mut config = SimConfig::default();
        config.persistence.backend = PersistenceBackend::JsonFile;
        config.persistence.data_dir = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_persistence_retry_delays() {
        let mut config = SimConfig::default();
        config.persistence.retry_initial_delay_ms = 1_000;
        config.persistence.retry_max_delay_ms = 10;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "persistence.retry_initial_delay_ms"
        ));
    }

    // ========================================================================
    // Layering
    // ========================================================================

    #[test]
    fn test_config_layering_env_over_file_over_defaults() {
        figment::Jail::expect_with(|jail| {
            // Arrange
            jail.create_file(
                "simstate.toml",
                r#"
                [coordinator]
                decision_timeout_ms = 750
                context_limit = 3

                [server]
                port = 9000
                "#,
            )?;
            jail.set_env("SIMSTATE_COORDINATOR__DECISION_TIMEOUT_MS", "250");

            // Act
            let config = SimConfig::load().expect("load");

            // Assert
            assert_eq!(config.coordinator.decision_timeout_ms, 250);
            assert_eq!(config.coordinator.context_limit, 3);
            assert_eq!(config.server.port, 9000);
            assert_eq!(config.memory.capacity, 1_000);
            Ok(())
        });
    }

    #[test]
    fn test_config_missing_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = SimConfig::load_from_path("absent.toml").expect("load");
            assert_eq!(config, SimConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_config_roundtrip() {
        // Arrange
        let mut config = SimConfig::default();
        config.memory.capacity = 77;
        config.spatial.rooms.push(crate::spatial::RoomDef::rect(
            "hall",
            Tile::new(0, 0),
            Tile::new(3, 3),
        ));

        // Act
        let toml_str = config.to_toml().expect("serialize");
        let parsed = SimConfig::from_toml(&toml_str).expect("parse");

        // Assert
        assert_eq!(parsed, config);
    }
}
