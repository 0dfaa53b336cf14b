// tests/config.rs

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use sequencer::config::{load_and_validate, load_from_path};
use sequencer::errors::SequencerError;
use sequencer::{build_registry, CallArgs, ParamValue, WatcherKind};
use sequencer_test_utils::{init_tracing, SequenceDir};
use tempfile::NamedTempFile;

type TestResult = Result<(), Box<dyn Error>>;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create config file");
    file.write_all(contents.as_bytes())
        .expect("failed to write config file");
    file
}

fn expect_config_error(contents: &str, needle: &str) {
    let file = config_file(contents);
    let err = load_and_validate(file.path()).expect_err("invalid config");
    match err {
        SequencerError::ConfigError(msg) => {
            assert!(msg.contains(needle), "expected {needle:?} in {msg:?}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn full_config_is_validated_and_rebased() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let config_path = dir.path().join("Sequencer.toml");
    std::fs::write(
        &config_path,
        r#"
[config]
auto_reload = true
watcher = "standalone"
poll_interval_ms = 20

[sequences]
paths = ["sequences", "extra/one.rhai"]

[context]
address = "192.168.0.10"
retries = 3
gains = [0.5, 1.5]
"#,
    )?;

    let cfg = load_and_validate(&config_path)?;

    assert!(cfg.config.auto_reload);
    assert_eq!(cfg.config.watcher, Some(WatcherKind::Polling));
    assert_eq!(cfg.config.poll_interval, Duration::from_millis(20));
    assert_eq!(
        cfg.sequence_paths,
        vec![dir.path().join("sequences"), dir.path().join("extra/one.rhai")]
    );
    assert_eq!(
        cfg.context.get("address"),
        Some(&ParamValue::Str("192.168.0.10".into()))
    );
    assert_eq!(cfg.context.get("retries"), Some(&ParamValue::Int(3)));
    assert_eq!(
        cfg.context.get("gains"),
        Some(&ParamValue::FloatList(vec![0.5, 1.5]))
    );
    Ok(())
}

#[test]
fn minimal_config_uses_defaults() -> TestResult {
    init_tracing();
    let file = config_file("[sequences]\npaths = [\"seqs\"]\n");
    let cfg = load_and_validate(file.path())?;

    assert!(!cfg.config.auto_reload);
    assert_eq!(cfg.config.watcher, None);
    assert_eq!(cfg.config.poll_interval, Duration::from_millis(50));
    assert!(cfg.context.is_empty());
    Ok(())
}

#[test]
fn invalid_configs_are_rejected() {
    init_tracing();
    expect_config_error("[config]\nauto_reload = true\n", "at least one");
    expect_config_error("[sequences]\npaths = [\"\"]\n", "empty entry");
    expect_config_error(
        "[config]\npoll_interval_ms = 0\n[sequences]\npaths = [\"s\"]\n",
        "poll_interval_ms",
    );
    expect_config_error(
        "[config]\nwatcher = \"telepathy\"\n[sequences]\npaths = [\"s\"]\n",
        "invalid watcher",
    );
    expect_config_error(
        "[sequences]\npaths = [\"s\"]\n[context]\nnested = { a = 1 }\n",
        "[context].nested",
    );
}

#[test]
fn unknown_sections_fail_to_parse() {
    init_tracing();
    let file = config_file("[sequences]\npaths = [\"s\"]\n[tasks]\nx = 1\n");
    let err = load_from_path(file.path()).expect_err("unknown section");
    assert!(matches!(err, SequencerError::TomlError(_)), "got {err:?}");
}

#[test]
fn registry_is_built_from_config() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let sequences = dir.subdir("sequences");
    std::fs::write(
        sequences.join("device.rhai"),
        "fn describe() { get_context(\"name\") + \"@\" + get_context(\"port\") }\n",
    )?;
    let config_path = dir.path().join("Sequencer.toml");
    std::fs::write(
        &config_path,
        "[sequences]\npaths = [\"sequences\"]\n\n[context]\nname = \"bench\"\nport = 8080\n",
    )?;

    let cfg = load_and_validate(&config_path)?;
    let registry = build_registry(&cfg)?;

    assert_eq!(registry.modules(), vec!["device".to_string()]);
    let described = registry.execute("describe", CallArgs::new())?.into_string()?;
    assert_eq!(described, "bench@8080");
    Ok(())
}
