//! # CLI and Configuration Tests
//!
//! Commands run against a temporary process store.

use std::path::PathBuf;
use stepwise::cli::{
    Output, cmd_convert, cmd_init, cmd_inspect, cmd_list, cmd_migrate, cmd_modes, cmd_run,
};
use stepwise::{Config, ModeConfig, RuleKind};
use stepwise_core::storage::load_path;
use stepwise_core::{KindRegistry, StepwiseError, StorageStrategy};
use tempfile::TempDir;

const QUIET: Output = Output {
    json: false,
    verbose: false,
};

fn config_in(dir: &TempDir) -> Config {
    Config {
        store: dir.path().join("processes"),
        ..Config::default()
    }
}

fn fast_mode() -> ModeConfig {
    ModeConfig {
        name: "Fast".to_string(),
        rule: RuleKind::Blacklist,
        types: vec!["delay".to_string(), "timeout".to_string()],
    }
}

const LEGACY_V1: &str = r#"{
  "Process": {
    "Name": "Old Drill",
    "Chapters": [
      {
        "Name": "Only",
        "FirstStep": {
          "$id": "a",
          "Name": "First",
          "Transitions": [
            { "Name": "next", "TargetStep": { "$id": "b", "Name": "Second", "Transitions": [
              { "Name": "again", "Conditions": [
                { "Type": "signal", "Name": "again", "Properties": { "signal": "again", "consume": true, "optional": false } }
              ], "TargetStep": { "$ref": "a" } },
              { "Name": "end", "TargetStep": null, "Conditions": [
                { "Type": "timeout", "Name": "wait", "Properties": { "milliseconds": 200 } }
              ] }
            ] } }
          ]
        }
      }
    ]
  }
}"#;

// =============================================================================
// CONFIGURATION
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn full_document_parses() {
        let config = Config::from_toml_str(
            r#"
            store = "flows"
            storage = "split-by-chapter"
            default_mode = "Fast"
            tick_ms = 50
            max_ticks = 200

            [[modes]]
            name = "Fast"
            rule = "blacklist"
            types = ["delay", "timeout"]

            [[modes]]
            name = "Strict"
            rule = "whitelist"
            types = ["signal"]
            "#,
        )
        .expect("parse");

        assert_eq!(config.store, PathBuf::from("flows"));
        assert_eq!(config.storage, StorageStrategy::SplitByChapter);
        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.max_ticks, 200);
        assert_eq!(config.modes.len(), 2);
        assert_eq!(config.modes[0], fast_mode());

        let modes = config.mode_collection().expect("modes");
        assert_eq!(modes.current().name(), "Fast");
        assert_eq!(modes.modes().len(), 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("colour = \"blue\"").is_err());
        assert!(Config::from_toml_str("storage = \"zip\"").is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let config = Config::from_toml_str("store = \"flows\"\nmax_ticks = 5")
            .expect("parse")
            .with_overrides(|key| match key {
                "STEPWISE_STORE" => Some("/tmp/elsewhere".to_string()),
                "STEPWISE_MAX_TICKS" => Some("42".to_string()),
                _ => None,
            })
            .expect("overrides");

        assert_eq!(config.store, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(config.max_ticks, 42);
        assert_eq!(config.default_mode, "Default");
    }

    #[test]
    fn bad_override_is_an_error() {
        let result = Config::default().with_overrides(|key| {
            (key == "STEPWISE_MAX_TICKS").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(StepwiseError::DeserializationError(_))));
    }

    #[test]
    fn unknown_default_mode_fails_on_use() {
        let config = Config {
            default_mode: "Turbo".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.mode_collection(),
            Err(StepwiseError::UnknownMode(_))
        ));
    }

    #[test]
    fn redefining_default_mode_is_rejected() {
        let config = Config {
            modes: vec![ModeConfig {
                name: "Default".to_string(),
                rule: RuleKind::Whitelist,
                types: Vec::new(),
            }],
            ..Config::default()
        };
        assert!(matches!(
            config.mode_collection(),
            Err(StepwiseError::InvalidMode(_))
        ));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("stepwise.toml");
        std::fs::write(&path, "tick_ms = 25\n").expect("write");

        let config = Config::load(Some(path.as_path())).expect("load");
        assert_eq!(config.tick_ms, 25);
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = TempDir::new().expect("tempdir");
        let result = Config::load(Some(dir.path().join("absent.toml").as_path()));
        assert!(matches!(result, Err(StepwiseError::IoError(_))));
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

mod commands {
    use super::*;

    #[test]
    fn init_then_list_and_inspect() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);

        let path = cmd_init(&config, QUIET, "Safety Briefing", false).expect("init");
        assert!(path.is_file());
        assert_eq!(cmd_list(&config, QUIET).expect("list"), vec!["safety-briefing"]);

        let metrics = cmd_inspect(&config, QUIET, "Safety Briefing", true).expect("inspect");
        assert_eq!(metrics.chapter_count, 3);
        assert_eq!(metrics.nested_chapter_count, 1);
        assert_eq!(metrics.step_count, 4);
        assert!(metrics.has_loops());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);

        cmd_init(&config, QUIET, "Drill", false).expect("init");
        assert!(cmd_init(&config, QUIET, "Drill", false).is_err());
        cmd_init(&config, QUIET, "Drill", true).expect("forced init");
    }

    #[test]
    fn run_sample_to_completion() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);
        cmd_init(&config, QUIET, "Drill", false).expect("init");

        let outcome = cmd_run(&config, QUIET, "Drill", &[], false).expect("run");
        assert!(outcome.completed);
        assert_eq!(
            outcome.visited_steps,
            vec!["Welcome", "Inspect", "Check gloves", "Goodbye"]
        );
    }

    #[test]
    fn retry_signal_walks_the_loop_once() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);
        cmd_init(&config, QUIET, "Drill", false).expect("init");

        let outcome =
            cmd_run(&config, QUIET, "Drill", &["retry".to_string()], false).expect("run");
        assert!(outcome.completed);
        assert_eq!(
            outcome.visited_steps,
            vec![
                "Welcome",
                "Inspect",
                "Check gloves",
                "Welcome",
                "Inspect",
                "Check gloves",
                "Goodbye"
            ]
        );
    }

    #[test]
    fn fast_mode_needs_fewer_ticks() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = config_in(&dir);
        config.modes.push(fast_mode());
        cmd_init(&config, QUIET, "Drill", false).expect("init");

        let normal = cmd_run(&config, QUIET, "Drill", &[], false).expect("run");
        config.default_mode = "Fast".to_string();
        let fast = cmd_run(&config, QUIET, "Drill", &[], false).expect("run");

        assert!(normal.completed && fast.completed);
        assert!(fast.ticks < normal.ticks);
        assert_eq!(fast.visited_steps, normal.visited_steps);
    }

    #[test]
    fn tick_budget_leaves_run_incomplete() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = config_in(&dir);
        config.max_ticks = 2;
        cmd_init(&config, QUIET, "Drill", false).expect("init");

        let outcome = cmd_run(&config, QUIET, "Drill", &[], false).expect("run");
        assert!(!outcome.completed);
        assert_eq!(outcome.ticks, 2);
    }

    #[test]
    fn fast_forward_completes_without_ticks() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);
        cmd_init(&config, QUIET, "Drill", false).expect("init");

        let outcome = cmd_run(&config, QUIET, "Drill", &[], true).expect("run");
        assert!(outcome.completed);
        assert_eq!(outcome.ticks, 0);
        assert_eq!(outcome.visited_steps.last().map(String::as_str), Some("Goodbye"));
    }

    #[test]
    fn run_missing_process_fails() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);
        assert!(cmd_run(&config, QUIET, "Nope", &[], false).is_err());
    }

    #[test]
    fn convert_to_split_and_back() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);
        cmd_init(&config, QUIET, "Drill", false).expect("init");

        cmd_convert(&config, QUIET, "Drill", StorageStrategy::SplitByChapter).expect("convert");
        let store = config.store.clone();
        assert!(store.join("drill.manifest.json").is_file());
        assert!(store.join("drill.chapter-0.json").is_file());
        assert!(store.join("drill.chapter-1.json").is_file());
        assert_eq!(cmd_list(&config, QUIET).expect("list"), vec!["drill"]);

        let split = cmd_run(&config, QUIET, "Drill", &[], false).expect("run split");
        assert!(split.completed);

        cmd_convert(&config, QUIET, "Drill", StorageStrategy::SingleFile).expect("convert back");
        assert!(!store.join("drill.manifest.json").exists());
        assert!(!store.join("drill.chapter-0.json").exists());
    }

    #[test]
    fn convert_keeps_the_stored_file_name() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);
        std::fs::create_dir_all(&config.store).expect("mkdir");
        std::fs::write(config.store.join("legacy.json"), LEGACY_V1).expect("write");

        let path = cmd_convert(&config, QUIET, "legacy", StorageStrategy::SplitByChapter)
            .expect("convert");
        assert_eq!(path, config.store.join("legacy.json"));
        assert!(config.store.join("legacy.manifest.json").is_file());
        assert!(!config.store.join("old-drill.json").exists());
        assert_eq!(cmd_list(&config, QUIET).expect("list"), vec!["legacy"]);
    }

    #[test]
    fn verbose_run_drains_the_journal() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_in(&dir);
        cmd_init(&config, QUIET, "Drill", false).expect("init");

        let verbose = Output {
            json: false,
            verbose: true,
        };
        let outcome = cmd_run(&config, verbose, "Drill", &[], false).expect("run");
        assert!(outcome.completed);
        assert!(!outcome.visited_steps.is_empty());
    }

    #[test]
    fn migrate_legacy_document() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("old.json");
        let output = dir.path().join("new.json");
        std::fs::write(&input, LEGACY_V1).expect("write");

        let version = cmd_migrate(QUIET, &input, &output).expect("migrate");
        assert_eq!(version, 1);

        let text = std::fs::read_to_string(&output).expect("read");
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["$serializerVersion"], 4);
        assert_eq!(value["Steps"].as_array().map(Vec::len), Some(2));

        let process = load_path(&output, &KindRegistry::default()).expect("load");
        assert_eq!(process.name(), "Old Drill");
    }

    #[test]
    fn migrate_rejects_missing_input() {
        let dir = TempDir::new().expect("tempdir");
        let result = cmd_migrate(QUIET, &dir.path().join("absent.json"), &dir.path().join("out.json"));
        assert!(matches!(result, Err(StepwiseError::IoError(_))));
    }

    #[test]
    fn modes_lists_configured_modes() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = config_in(&dir);
        config.modes.push(fast_mode());
        cmd_modes(&config, QUIET).expect("modes");
        cmd_modes(&config, Output { json: true, verbose: false }).expect("modes json");
    }
}
