use std::path::PathBuf;

use ytdl_frontend::settings::backup_path;
use ytdl_frontend::{Backend, BackendSupport, Preset, PresetStore, Settings};

#[test]
fn settings_round_trip_with_user_presets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let mut store = PresetStore::default();
    store
        .add(
            Preset::new(Some("Small"), Some("18"), None)
                .with_backends(BackendSupport::YT_DLP)
                .with_extra_args(["--no-part"]),
        )
        .unwrap();

    let settings = Settings {
        backend: Backend::YoutubeDl,
        output_dir: Some(PathBuf::from("/tmp/videos")),
        subtitles: true,
        selected_preset: Some("Small".into()),
        custom_presets: store.into_user_presets(),
        ..Settings::default()
    };
    settings.save_to(&path).unwrap();

    let loaded = Settings::load_from(&path);
    assert_eq!(loaded, settings);

    let store = PresetStore::new(loaded.custom_presets);
    let small = store.find("small").unwrap();
    assert!(!small.is_predefined);
    assert!(!small.supports(Backend::YoutubeDl));
    assert_eq!(small.to_args(), vec!["-f", "18", "--no-part"]);
}

#[test]
fn unreadable_settings_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    assert_eq!(Settings::load_from(&path), Settings::default());

    std::fs::write(&path, "{ not json").unwrap();
    assert_eq!(Settings::load_from(&path), Settings::default());
}

#[test]
fn unparsable_settings_are_kept_aside_before_saving() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let broken = r#"{"custom_presets":[{"name":"Mine","format_arg":"18"}],"backend":"yt-dlp",}"#;
    std::fs::write(&path, broken).unwrap();

    let mut settings = Settings::load_from(&path);
    assert_eq!(settings, Settings::default());
    let backup = backup_path(&path);
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), broken);

    settings.custom_presets.push(Preset::new(Some("New"), Some("22"), None));
    settings.save_to(&path).unwrap();

    // the user's file survives the save untouched
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), broken);
    assert_eq!(Settings::load_from(&path).custom_presets.len(), 1);
}

#[test]
fn saved_json_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let settings = Settings {
        custom_presets: vec![Preset::new(Some("Audio"), None, Some("m4a"))],
        ..Settings::default()
    };
    settings.save_to(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["backend"], "yt-dlp");
    assert_eq!(json["custom_presets"][0]["container_arg"], "m4a");
    assert_eq!(json["custom_presets"][0]["supported_backends"][1], "yt-dlp");
}
