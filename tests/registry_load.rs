// tests/registry_load.rs

use std::error::Error;

use sequencer::errors::SequencerError;
use sequencer::{CallArgs, ParamType, ParamValue, SequenceRegistry};
use sequencer_test_utils::{init_tracing, ScriptBuilder, SequenceDir};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn every_public_function_is_a_sequence_without_provides() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write_script(
        "motors",
        &ScriptBuilder::new()
            .function("fn start() { 1 }")
            .function("fn stop() { 0 }")
            .function("private fn helper() { 2 }"),
    );

    let registry = SequenceRegistry::new();
    registry.load([&path], true)?;

    assert_eq!(registry.modules(), vec!["motors".to_string()]);
    assert_eq!(registry.sequences(), vec!["start".to_string(), "stop".to_string()]);
    assert_eq!(
        registry.provides().get("motors"),
        Some(&vec!["start".to_string(), "stop".to_string()])
    );
    assert_eq!(registry.file_paths().get("motors"), Some(&path));
    assert!(!registry.has_sequence("helper"));
    Ok(())
}

#[test]
fn declared_provides_limits_the_exported_sequences() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write_script(
        "spi",
        &ScriptBuilder::new()
            .provides(&["spi_write"])
            .param_default("spi_write", "data", "0")
            .function("fn spi_write(data) { checksum(data) }")
            .function("fn checksum(data) { data * 2 }"),
    );

    let registry = SequenceRegistry::new();
    registry.load([&path], true)?;

    assert_eq!(registry.sequences(), vec!["spi_write".to_string()]);
    let result = registry.execute("spi_write", CallArgs::new().arg(21_i64))?;
    assert_eq!(result.as_int()?, 42);
    Ok(())
}

#[test]
fn descriptors_carry_types_and_defaults() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write_script(
        "config_seq",
        &ScriptBuilder::new()
            .param_default("configure", "gain", "3")
            .param_default("configure", "offset", "0.5")
            .param_default("configure", "enabled", "true")
            .param_default("configure", "label", "\"sensor\"")
            .param_default("configure", "channels", "[1, 2]")
            .param_default("configure", "tags", "[\"a\", \"b\"]")
            .function("fn configure(gain, offset, enabled, label, channels, tags) { gain }"),
    );

    let registry = SequenceRegistry::new();
    registry.load([&path], true)?;

    let descriptor = registry.descriptor("configure").expect("configure is loaded");
    assert_eq!(descriptor.module, "config_seq");

    let kinds: Vec<(String, ParamType)> = descriptor
        .params
        .iter()
        .map(|p| (p.name.clone(), p.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("gain".to_string(), ParamType::Int),
            ("offset".to_string(), ParamType::Float),
            ("enabled".to_string(), ParamType::Bool),
            ("label".to_string(), ParamType::Str),
            ("channels".to_string(), ParamType::IntList),
            ("tags".to_string(), ParamType::StrList),
        ]
    );

    let channels = descriptor.param("channels").expect("channels param");
    assert_eq!(channels.default, ParamValue::IntList(vec![1, 2]));
    assert_eq!(channels.value, channels.default);
    Ok(())
}

#[test]
fn parameter_without_default_is_rejected() {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write_script(
        "incomplete",
        &ScriptBuilder::new()
            .param_default("move_to", "x", "0")
            .function("fn move_to(x, y) { x + y }"),
    );

    let registry = SequenceRegistry::new();
    let err = registry.load([&path], true).expect_err("missing default");
    match err {
        SequencerError::MissingDefault { sequence, param } => {
            assert_eq!(sequence, "move_to");
            assert_eq!(param, "y");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(registry.modules().is_empty());
}

#[test]
fn invalid_list_defaults_are_rejected() {
    init_tracing();
    let cases = [
        ("[]", "empty"),
        ("[[1], [2]]", "nested"),
        ("[1, \"two\"]", "mixed"),
    ];

    for (literal, label) in cases {
        let dir = SequenceDir::new();
        let path = dir.write_script(
            "lists",
            &ScriptBuilder::new()
                .param_default("scan", "points", literal)
                .function("fn scan(points) { points.len() }"),
        );

        let err = SequenceRegistry::new()
            .load([&path], true)
            .expect_err("invalid list default");
        let matched = match label {
            "empty" => matches!(err, SequencerError::EmptyListDefault { .. }),
            "nested" => matches!(err, SequencerError::NestedListDefault { .. }),
            _ => matches!(err, SequencerError::MixedListDefault { .. }),
        };
        assert!(matched, "{label} list gave {err:?}");
    }
}

#[test]
fn unsupported_default_type_is_rejected() {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write_script(
        "maps",
        &ScriptBuilder::new()
            .param_default("apply", "settings", "#{ speed: 1 }")
            .function("fn apply(settings) { settings }"),
    );

    let err = SequenceRegistry::new()
        .load([&path], true)
        .expect_err("map defaults are not supported");
    assert!(
        matches!(err, SequencerError::UnsupportedDefault { ref param, .. } if param == "settings"),
        "got {err:?}"
    );
}

#[test]
fn provided_sequence_must_be_implemented() {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write_script(
        "ghosts",
        &ScriptBuilder::new()
            .provides(&["real", "ghost"])
            .function("fn real() { 1 }"),
    );

    let err = SequenceRegistry::new()
        .load([&path], true)
        .expect_err("ghost is not implemented");
    assert!(
        matches!(err, SequencerError::MissingImplementation { ref sequence, .. } if sequence == "ghost"),
        "got {err:?}"
    );
}

#[test]
fn duplicate_sequence_keeps_the_first_provider() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let first = dir.write("first", "fn common() { 1 }\n");
    let second = dir.write("second", "fn common() { 2 }\n");

    let registry = SequenceRegistry::new();
    registry.load([&first], true)?;
    let err = registry.load([&second], true).expect_err("duplicate sequence");
    match err {
        SequencerError::DuplicateSequence {
            module,
            sequence,
            existing,
        } => {
            assert_eq!(module, "second");
            assert_eq!(sequence, "common");
            assert_eq!(existing, "first");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(registry.modules(), vec!["first".to_string()]);
    assert_eq!(registry.execute("common", CallArgs::new())?.as_int()?, 1);
    Ok(())
}

#[test]
fn loading_the_same_module_twice_is_rejected() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write("once", "fn once() { 1 }\n");

    let registry = SequenceRegistry::new();
    registry.load([&path], true)?;
    let err = registry.load([&path], true).expect_err("already loaded");
    assert!(matches!(err, SequencerError::DuplicateModule { .. }), "got {err:?}");
    Ok(())
}

#[test]
fn overloaded_function_names_are_ambiguous() {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write(
        "overloads",
        "fn pulse() { 1 }\nfn pulse(width) { width }\n",
    );

    let err = SequenceRegistry::new()
        .load([&path], true)
        .expect_err("overloads cannot be dispatched by name");
    assert!(
        matches!(err, SequencerError::AmbiguousSequence { ref sequence, .. } if sequence == "pulse"),
        "got {err:?}"
    );
}

#[test]
fn malformed_provides_declaration_is_rejected() {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write("bad_provides", "let provides = \"run\";\nfn run() { 1 }\n");

    let err = SequenceRegistry::new()
        .load([&path], true)
        .expect_err("provides must be an array");
    assert!(
        matches!(err, SequencerError::InvalidDeclaration { field: "provides", .. }),
        "got {err:?}"
    );
}

#[test]
fn directories_expand_to_their_script_files() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let nested = dir.subdir("sequences");
    std::fs::write(nested.join("alpha.rhai"), "fn alpha() { 1 }\n")?;
    std::fs::write(nested.join("beta.rhai"), "fn beta() { 2 }\n")?;
    std::fs::write(nested.join("notes.txt"), "not a script\n")?;

    let registry = SequenceRegistry::with_paths([&nested])?;

    assert_eq!(registry.modules(), vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(registry.execute("beta", CallArgs::new())?.as_int()?, 2);
    Ok(())
}

#[test]
fn missing_paths_are_reported_by_kind() {
    init_tracing();
    let dir = SequenceDir::new();
    let registry = SequenceRegistry::new();

    let err = registry
        .load([dir.path().join("no_such_dir")], true)
        .expect_err("missing directory");
    assert!(matches!(err, SequencerError::DirectoryNotFound { .. }), "got {err:?}");

    let err = registry
        .load([dir.path().join("seqs.d")], true)
        .expect_err("missing dotted directory");
    assert!(
        matches!(err, SequencerError::DirectoryNotFound { ref path } if path.ends_with("seqs.d")),
        "got {err:?}"
    );

    let err = registry
        .load([dir.file("no_such_file")], true)
        .expect_err("missing file");
    assert!(matches!(err, SequencerError::FileNotFound { .. }), "got {err:?}");
}

#[test]
fn script_problems_are_classified() {
    init_tracing();
    let dir = SequenceDir::new();
    let registry = SequenceRegistry::new();

    let syntax = dir.write("syntax", "fn broken( {\n");
    let err = registry.load([&syntax], true).expect_err("syntax error");
    assert!(matches!(err, SequencerError::Syntax { .. }), "got {err:?}");

    let import = dir.write("importer", "import \"does_not_exist\" as missing;\nfn run() { 1 }\n");
    let err = registry.load([&import], true).expect_err("import error");
    assert!(matches!(err, SequencerError::Import { .. }), "got {err:?}");

    let runtime = dir.write("thrower", "throw \"boom\";\nfn run() { 1 }\n");
    let err = registry.load([&runtime], true).expect_err("top-level error");
    assert!(matches!(err, SequencerError::ModuleExecution { .. }), "got {err:?}");

    assert!(registry.modules().is_empty());
}

#[test]
fn sequences_call_into_imported_script_modules() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    dir.write("helpers", "fn double(x) { x * 2 }\n");
    let base = dir.write("base", "fn offset() { 21 }\n");
    let user = dir.write_script(
        "user",
        &ScriptBuilder::new()
            .requires(&["base"])
            .function("import \"helpers\" as h;")
            .function("fn run() { h::double(offset()) }"),
    );

    let registry = SequenceRegistry::new();
    registry.load([&base, &user], true)?;

    // The alias survives the engine rebuild done by resolve.
    assert_eq!(registry.execute("run", CallArgs::new())?.as_int()?, 42);
    assert_eq!(registry.provides().get("user"), Some(&vec!["run".to_string()]));
    Ok(())
}

#[test]
fn batch_load_stops_at_the_first_failing_file() {
    init_tracing();
    let dir = SequenceDir::new();
    let good = dir.write("good", "fn good() { 1 }\n");
    let bad = dir.write("bad", "fn bad( {\n");
    let never = dir.write("never", "fn never() { 1 }\n");

    let registry = SequenceRegistry::new();
    let err = registry
        .load([&good, &bad, &never], true)
        .expect_err("bad has a syntax error");
    assert!(matches!(err, SequencerError::Syntax { .. }), "got {err:?}");

    assert_eq!(registry.modules(), vec!["good".to_string()]);
}

#[test]
fn unload_removes_module_and_sequences() -> TestResult {
    init_tracing();
    let dir = SequenceDir::new();
    let path = dir.write("temp", "fn temp() { 1 }\n");

    let registry = SequenceRegistry::new();
    registry.load([&path], true)?;
    registry.unload("temp")?;

    assert!(registry.modules().is_empty());
    let err = registry.execute("temp", CallArgs::new()).expect_err("unloaded");
    assert!(matches!(err, SequencerError::MissingSequence(ref name) if name == "temp"));

    let err = registry.unload("temp").expect_err("already unloaded");
    assert!(matches!(err, SequencerError::ModuleNotLoaded { .. }), "got {err:?}");
    Ok(())
}
