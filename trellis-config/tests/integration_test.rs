//! Integration tests for trellis-config

use trellis_config::*;
use trellis_core::{Dispatcher, Resource, TieBreak};

#[test]
fn test_environment_overrides_feed_dispatcher() {
    let manager = ConfigManager::new();
    manager
        .load_env_from([
            ("TRELLIS_DISPATCH__BASE_PATH", "/api/"),
            ("TRELLIS_DISPATCH__TIE_BREAK", "declaration_order"),
            ("TRELLIS_DISPATCH__DEFAULT_MAX_RESULTS", "10"),
        ])
        .unwrap();

    let config = load_dispatch_config(&manager).unwrap();
    assert_eq!(config.tie_break, TieBreak::DeclarationOrder);
    assert_eq!(config.default_max_results, 10);

    let dispatcher = Dispatcher::from_config(
        Resource::root("root").with_child(Resource::new("item")),
        config,
    )
    .unwrap();
    assert!(dispatcher.tree().match_path("/api/items/").is_some());
}

#[test]
fn test_dotenv_style_file() {
    let path = std::env::temp_dir().join(format!("trellis-it-{}.env", std::process::id()));
    std::fs::write(&path, "DISPATCH__MAX_RESULTS_CAP=75\nLOGGING__LEVEL=warn\n").unwrap();

    let manager = ConfigManager::new();
    manager
        .load_file(&path.to_string_lossy(), FileFormat::Env)
        .unwrap();
    let config: TrellisConfig = manager.load_validated().unwrap();
    assert_eq!(config.dispatch.max_results_cap, 75);

    std::fs::remove_file(path).ok();
}
