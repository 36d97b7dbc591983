// src/tests/config.rs
use crate::config_loader::{load_config, SafeTravelsConfig};
use crate::errors::SafeTravelsError;
use figment::Jail;

#[test]
fn defaults_are_valid() {
    let config = SafeTravelsConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.review.max_revisions, 3);
    assert_eq!(config.call_timeout().as_millis(), 10_000);
    assert!(!config.risk.hotspots.is_empty());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    Jail::expect_with(|_jail| {
        let config = load_config(Some("does-not-exist.toml")).unwrap();
        assert_eq!(config, SafeTravelsConfig::default());
        Ok(())
    });
}

#[test]
fn toml_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "safetravels.toml",
            r#"
            log_level = "debug"

            [planner]
            safety_weight = 0.5
            time_weight = 0.3
            distance_weight = 0.2

            [collaborators]
            timeout_ms = 2500

            [[risk.hotspots]]
            name = "Port Yard"
            bounds = { min_lat = 33.7, max_lat = 33.8, min_lon = -118.3, max_lon = -118.2 }
            "#,
        )?;

        let config = load_config(None).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.planner.safety_weight, 0.5);
        assert_eq!(config.call_timeout().as_millis(), 2500);
        assert_eq!(config.risk.hotspots.len(), 1);
        assert_eq!(config.risk.hotspots[0].multiplier, 1.5);
        // untouched sections keep their defaults
        assert_eq!(config.review.max_revisions, 3);
        Ok(())
    });
}

#[test]
fn environment_wins_over_file() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[review]\nmax_revisions = 4\n")?;
        jail.set_env("SAFETRAVELS_REVIEW__MAX_REVISIONS", "5");
        jail.set_env("SAFETRAVELS_STORAGE__DB_PATH", "/tmp/st-db");

        let config = load_config(Some("custom.toml")).unwrap();
        assert_eq!(config.review.max_revisions, 5);
        assert_eq!(config.storage.db_path, "/tmp/st-db");
        Ok(())
    });
}

#[test]
fn unbalanced_weights_are_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "safetravels.toml",
            "[planner]\nsafety_weight = 0.9\ntime_weight = 0.25\ndistance_weight = 0.15\n",
        )?;
        let err = load_config(None).unwrap_err();
        assert!(matches!(err, SafeTravelsError::Config { .. }));
        assert!(err.to_string().contains("sum to 1.0"));
        Ok(())
    });
}

#[test]
fn invalid_sections_are_rejected() {
    let mut config = SafeTravelsConfig::default();
    config.scanner.segment_miles = 0.0;
    assert!(config.validate().is_err());

    let mut config = SafeTravelsConfig::default();
    config.review.critic_min_confidence = 0.99;
    assert!(config.validate().is_err());

    let mut config = SafeTravelsConfig::default();
    config.collaborators.retrieval_k = 0;
    assert!(config.validate().is_err());

    let mut config = SafeTravelsConfig::default();
    config.risk.hotspots[0].multiplier = 0.0;
    assert!(config.validate().is_err());
}

#[test]
fn malformed_values_surface_as_config_errors() {
    Jail::expect_with(|jail| {
        jail.create_file("safetravels.toml", "[review]\nmax_revisions = \"many\"\n")?;
        let err = load_config(None).unwrap_err();
        assert!(matches!(err, SafeTravelsError::Config { .. }));
        Ok(())
    });
}
