// tests/call_args.rs

use proptest::prelude::*;
use rhai::Dynamic;
use sequencer::errors::SequencerError;
use sequencer::{CallArgs, ParamDescriptor, ParamValue};

fn int_param(name: &str, default: i64) -> ParamDescriptor {
    let default = ParamValue::Int(default);
    ParamDescriptor {
        name: name.to_string(),
        kind: default.kind(),
        value: default.clone(),
        default,
    }
}

fn ints(values: &[Dynamic]) -> Vec<i64> {
    values
        .iter()
        .map(|v| v.as_int().expect("int argument"))
        .collect()
}

#[test]
fn positional_then_keyword_then_defaults() {
    let params = [int_param("x", 1), int_param("y", 2), int_param("z", 3)];

    let bound = CallArgs::new()
        .arg(10_i64)
        .kwarg("z", 30_i64)
        .bind("move_to", &params)
        .expect("valid arguments");

    assert_eq!(ints(&bound), vec![10, 2, 30]);
}

#[test]
fn too_many_positional_arguments() {
    let params = [int_param("x", 1)];
    let err = CallArgs::new()
        .arg(1_i64)
        .arg(2_i64)
        .bind("move_to", &params)
        .expect_err("one parameter only");
    assert!(matches!(err, SequencerError::InvalidArguments { .. }), "got {err:?}");
}

#[test]
fn unknown_and_duplicate_keywords() {
    let params = [int_param("x", 1), int_param("y", 2)];

    let err = CallArgs::new()
        .kwarg("speed", 5_i64)
        .bind("move_to", &params)
        .expect_err("no such parameter");
    assert!(
        err.to_string().contains("unexpected keyword argument 'speed'"),
        "{err}"
    );

    let err = CallArgs::new()
        .arg(1_i64)
        .kwarg("x", 5_i64)
        .bind("move_to", &params)
        .expect_err("x given twice");
    assert!(
        err.to_string().contains("multiple values for argument 'x'"),
        "{err}"
    );
}

#[test]
fn from_positional_vec() {
    let args = CallArgs::from(vec![Dynamic::from(4_i64), Dynamic::from(5_i64)]);
    assert_eq!(args.len(), 2);
    assert!(args.keywords().is_empty());
    assert!(CallArgs::new().is_empty());
}

proptest! {
    #[test]
    fn bound_arguments_always_cover_every_parameter(
        defaults in proptest::collection::vec(any::<i64>(), 0..6),
        given in proptest::collection::vec(any::<i64>(), 0..6),
    ) {
        let params: Vec<ParamDescriptor> = defaults
            .iter()
            .enumerate()
            .map(|(i, d)| int_param(&format!("p{i}"), *d))
            .collect();
        let given: Vec<i64> = given.into_iter().take(params.len()).collect();

        let mut args = CallArgs::new();
        for value in &given {
            args = args.arg(*value);
        }
        let bound = args.bind("generated", &params).expect("never too many arguments");

        let mut expected = given.clone();
        expected.extend(defaults.iter().skip(given.len()));
        prop_assert_eq!(ints(&bound), expected);
    }
}
