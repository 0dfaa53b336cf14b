// tests/scenarios.rs

use std::error::Error;
use std::time::Duration;

use sequencer::errors::SequencerError;
use sequencer::watch::{FileWatcher, PollingWatcher};
use sequencer::{CallArgs, ParamValue, SequenceRegistry};
use sequencer_test_utils::{append, await_queue_size, init_tracing, ScriptBuilder, SequenceDir};

type TestResult = Result<(), Box<dyn Error>>;

fn identity_module(body: &str) -> ScriptBuilder {
    ScriptBuilder::new()
        .param_default("identity", "value", "0")
        .function(&format!("fn identity(value) {{ {body} }}"))
}

fn combine_module() -> ScriptBuilder {
    ScriptBuilder::new()
        .requires(&["a"])
        .function("fn combine() { identity(1) }")
}

#[test]
fn identity_combine_and_reload_observe_new_behaviour() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let a = dir.write_script("a", &identity_module("value"));
    let b = dir.write_script("b", &combine_module());

    let registry = SequenceRegistry::new();
    registry.load([&a], true)?;
    assert_eq!(
        registry
            .execute("identity", CallArgs::new().arg(42_i64))?
            .as_int()?,
        42
    );

    registry.load([&b], true)?;
    assert_eq!(registry.execute("combine", CallArgs::new())?.as_int()?, 1);

    dir.write_script("a", &identity_module("value + 1"));
    registry.reload_modules(["a"], true)?;

    assert_eq!(registry.execute("combine", CallArgs::new())?.as_int()?, 2);
    assert_eq!(
        registry
            .execute("identity", CallArgs::new().arg(42_i64))?
            .as_int()?,
        43
    );
    Ok(())
}

#[test]
fn invalid_list_default_on_reload_keeps_previous_version() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let script = |default: &str| {
        ScriptBuilder::new()
            .param_default("print_list", "val", default)
            .function("fn print_list(val) { print(val); val.len() }")
    };
    dir.write_script("lists", &script("[1]"));

    let registry = SequenceRegistry::new();
    registry.load([dir.file("lists")], true)?;
    assert_eq!(registry.execute("print_list", CallArgs::new())?.as_int()?, 1);

    dir.write_script("lists", &script("[]"));
    let err = registry
        .reload_modules(["lists"], true)
        .expect_err("empty list default must be rejected");
    assert!(
        matches!(err, SequencerError::EmptyListDefault { ref sequence, ref param }
            if sequence == "print_list" && param == "val"),
        "unexpected error: {err:?}"
    );

    // The previous version is still registered and callable.
    let descriptor = registry.descriptor("print_list").expect("still loaded");
    assert_eq!(descriptor.params[0].default, ParamValue::IntList(vec![1]));
    assert_eq!(registry.execute("print_list", CallArgs::new())?.as_int()?, 1);

    dir.write_script("lists", &script("[1, 2, 3]"));
    registry.reload_modules(["lists"], true)?;
    assert_eq!(registry.execute("print_list", CallArgs::new())?.as_int()?, 3);
    Ok(())
}

#[test]
fn two_modified_files_drain_as_two_distinct_paths() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let first = dir.write("first", "fn one() { 1 }\n");
    let second = dir.write("second", "fn two() { 2 }\n");

    let mut watcher = PollingWatcher::with_interval(Duration::from_millis(10));
    watcher.add_watch(&[first.clone(), second.clone()])?;
    watcher.run()?;
    let queue = watcher.modified_files_queue();

    for i in 0..3 {
        append(&first, &format!("// edit {i}\n"));
        append(&second, &format!("// edit {i}\n"));
        std::thread::sleep(Duration::from_millis(25));
    }

    assert!(await_queue_size(&queue, 2, Duration::from_secs(5)));
    // Give the watcher a few more passes to (not) add duplicates.
    std::thread::sleep(Duration::from_millis(50));

    let mut drained = queue.drain();
    drained.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(drained, expected);
    assert!(queue.is_empty());

    watcher.stop()?;
    Ok(())
}
