use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use gesture_nav::config::GestureNavConfig;
use gesture_nav::profile::{DeviceClass, Facing};
use gesture_nav::NavigationCommand;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "GESTURE_NAV_CONFIG",
        "GESTURE_NAV_DEVICE",
        "GESTURE_NAV_CLASSIFIER",
        "GESTURE_NAV_SCRIPT",
        "GESTURE_NAV_LABELS",
        "GESTURE_NAV_DEVICE_CLASS",
        "GESTURE_NAV_COOLDOWN_MS",
        "GESTURE_NAV_CONFIDENCE",
        "GESTURE_NAV_STEPS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = GestureNavConfig::load().expect("load defaults");
    assert_eq!(cfg.device, "stub://front_camera");
    assert_eq!(cfg.classifier.name, "scripted");
    assert_eq!(cfg.guide_steps, 5);
    assert_eq!(cfg.ready_timeout, Duration::from_secs(10));
    assert_eq!(
        cfg.bindings.command_for("Thumb_Up"),
        Some(NavigationCommand::Next)
    );
    assert!(cfg.overlay_path.is_none());
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "device": "/dev/video2",
        "classifier": {
            "name": "scripted",
            "script_path": "/etc/gesture-nav/script.json"
        },
        "environment": {
            "viewport_width": 1920,
            "viewport_height": 1080,
            "platform": "linux"
        },
        "profile": {
            "cooldown_ms": 1200,
            "facing": "environment"
        },
        "bindings": {
            "Pointing_Up": "next",
            "Victory": "previous"
        },
        "guide": { "steps": 12 },
        "ready_timeout_ms": 4000,
        "overlay_path": "overlay.png"
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("GESTURE_NAV_CONFIG", file.path());
    std::env::set_var("GESTURE_NAV_DEVICE", "stub://bench_camera");
    std::env::set_var("GESTURE_NAV_CONFIDENCE", "0.8");
    std::env::set_var("GESTURE_NAV_DEVICE_CLASS", "mobile");

    let cfg = GestureNavConfig::load().expect("load config");

    assert_eq!(cfg.device, "stub://bench_camera");
    assert_eq!(
        cfg.classifier.script_path.as_deref(),
        Some(std::path::Path::new("/etc/gesture-nav/script.json"))
    );
    assert_eq!(cfg.environment.viewport_width, 1920);
    assert_eq!(cfg.profile.cooldown_ms, Some(1200));
    assert_eq!(cfg.profile.confidence_threshold, Some(0.8));
    assert_eq!(cfg.profile.device_class, Some(DeviceClass::Constrained));
    assert_eq!(cfg.profile.facing, Some(Facing::Environment));
    assert_eq!(
        cfg.bindings.command_for("Victory"),
        Some(NavigationCommand::Previous)
    );
    assert_eq!(cfg.bindings.command_for("Thumb_Up"), None);
    assert_eq!(cfg.guide_steps, 12);
    assert_eq!(cfg.ready_timeout, Duration::from_millis(4000));

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
device = "stub://kiosk"

[classifier]
name = "scripted"

[profile]
device_class = "unconstrained"
confidence_threshold = 0.65

[guide]
steps = 3
"#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("GESTURE_NAV_CONFIG", file.path());
    std::env::set_var("GESTURE_NAV_STEPS", "7");

    let cfg = GestureNavConfig::load().expect("load config");
    assert_eq!(cfg.device, "stub://kiosk");
    assert_eq!(cfg.profile.device_class, Some(DeviceClass::Unconstrained));
    assert_eq!(cfg.profile.confidence_threshold, Some(0.65));
    assert_eq!(cfg.guide_steps, 7);

    clear_env();
}

#[test]
fn rejects_invalid_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("GESTURE_NAV_COOLDOWN_MS", "soon");
    assert!(GestureNavConfig::load().is_err());
    clear_env();

    std::env::set_var("GESTURE_NAV_CONFIDENCE", "1.5");
    let err = GestureNavConfig::load().unwrap_err();
    assert!(err.to_string().contains("outside"));
    clear_env();

    std::env::set_var("GESTURE_NAV_STEPS", "0");
    assert!(GestureNavConfig::load().is_err());
    clear_env();

    std::env::set_var("GESTURE_NAV_CLASSIFIER", "tract");
    let err = GestureNavConfig::load().unwrap_err();
    assert!(err.to_string().contains("model_path"));
    clear_env();
}

#[test]
fn rejects_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ \"device\": 42 }").expect("write config");
    std::env::set_var("GESTURE_NAV_CONFIG", file.path());

    let err = GestureNavConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
