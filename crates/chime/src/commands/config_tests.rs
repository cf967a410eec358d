// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chime_core::ServiceEndpoints;
use tempfile::TempDir;

fn configured() -> Config {
    let mut config = Config::default();
    config.session.token = "tok-secret".into();
    config.session.email = "me@example.com".into();
    config.session.profile_id = "me-1".into();
    config.session.device_channel = Some("device-me".into());
    config.session.endpoints = Some(ServiceEndpoints {
        websocket: "https://push.example.com".into(),
        ..Default::default()
    });
    config
}

#[test]
fn test_check_summarizes_session() {
    let summary = check(&configured()).unwrap();
    assert_eq!(
        summary,
        "session: me@example.com (me-1)\npush: https://push.example.com\nchannels: 1"
    );
}

#[test]
fn test_check_rejects_incomplete_config() {
    assert!(check(&Config::default()).is_err());
}

#[test]
fn test_render_redacts_token() {
    let shown = render(&configured()).unwrap();
    assert!(shown.contains("<redacted>"));
    assert!(!shown.contains("tok-secret"));
    assert!(shown.contains("me@example.com"));
}

#[test]
fn test_render_round_trips_other_fields() {
    let config = configured();
    let parsed: Config = toml::from_str(&render(&config).unwrap()).unwrap();
    assert_eq!(parsed.session.email, config.session.email);
    assert_eq!(parsed.queue, config.queue);
}

#[test]
fn test_init_writes_defaults_once() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("chime").join("chime.toml");

    init(&path, false).unwrap();
    assert_eq!(Config::load(&path).unwrap(), Config::default());

    let err = init(&path, false).unwrap_err();
    assert!(err.to_string().contains("--force"));

    init(&path, true).unwrap();
}

#[test]
fn test_run_check_on_written_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("chime.toml");
    configured().save(&path).unwrap();

    run(&path, ConfigCommand::Check).unwrap();
    run(&path, ConfigCommand::Show).unwrap();
}
