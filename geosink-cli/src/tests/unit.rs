//! Focused unit tests covering command configuration and execution.

use super::helpers::{
    CONSUMERS, MemoryRegistryBuilder, POINT_FEATURE, Workspace, insert_invocation,
    layers_invocation, run_captured,
};
use super::*;
use rstest::{fixture, rstest};
use serde_json::json;
use std::time::Duration;

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

#[rstest]
fn layers_requires_a_config_path() {
    let err = LayersConfig::try_from(LayersArgs::default()).expect_err("missing config");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_CONFIG);
            assert_eq!(env, ENV_LAYERS_CONFIG);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case(None, Some("/default/edits/wells"), Some("feature.json"), ARG_CONFIG)]
#[case(Some("consumers.json"), None, Some("feature.json"), ARG_TARGET)]
#[case(Some("consumers.json"), Some("/default/edits/wells"), None, ARG_FEATURE)]
fn insert_requires_every_input(
    #[case] config: Option<&str>,
    #[case] target: Option<&str>,
    #[case] feature: Option<&str>,
    #[case] expected: &'static str,
) {
    let args = InsertArgs {
        config: config.map(Into::into),
        target: target.map(str::to_owned),
        feature: feature.map(Into::into),
        ..InsertArgs::default()
    };
    let err = InsertConfig::try_from(args).expect_err("missing input");
    match err {
        CliError::MissingArgument { field, .. } => assert_eq!(field, expected),
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case(None, Duration::from_secs(1))]
#[case(Some(250), Duration::from_millis(250))]
fn insert_deadline_defaults_to_one_second(#[case] deadline_ms: Option<u64>, #[case] expected: Duration) {
    let args = InsertArgs {
        config: Some("consumers.json".into()),
        deadline_ms,
        target: Some("/default/edits/wells".to_owned()),
        feature: Some("feature.json".into()),
    };
    let config = InsertConfig::try_from(args).expect("complete arguments");
    assert_eq!(config.deadline, expected);
}

#[rstest]
fn layers_prints_every_consumer_sorted(workspace: Workspace) {
    let builder = MemoryRegistryBuilder::default();
    let config = workspace.write("consumers.json", CONSUMERS);
    let (outcome, output) = run_captured(&layers_invocation(config), &builder);
    outcome.expect("layers succeeds");
    let printed: serde_json::Value = serde_json::from_str(&output).expect("json output");
    assert_eq!(
        printed,
        json!({
            "edits": [
                { "name": "roads", "geom_type": "linestring", "srid": 3857 },
                { "name": "wells", "geom_type": "point", "srid": 4326 },
            ]
        })
    );
    assert_eq!(builder.factory.cleanup_calls(), 1);
}

#[rstest]
fn insert_routes_the_feature_and_prints_an_empty_object(workspace: Workspace) {
    let builder = MemoryRegistryBuilder::default();
    let config = workspace.write("consumers.json", CONSUMERS);
    let feature = workspace.write("feature.json", POINT_FEATURE);
    let (outcome, output) = run_captured(
        &insert_invocation(config, "/default/edits/wells", feature),
        &builder,
    );
    outcome.expect("insert succeeds");
    assert_eq!(output, "{}\n");
    assert_eq!(builder.factory.cleanup_calls(), 1);
    assert_eq!(builder.factory.init_calls(), 1);
}

#[rstest]
#[case("/default/audit/wells", 404)]
#[case("/city/edits/wells", 404)]
#[case("/default/edits/rivers", 404)]
#[case("/default/edits/roads", 422)]
#[case("/default/edits", 400)]
fn rejected_inserts_report_their_status(
    workspace: Workspace,
    #[case] target: &str,
    #[case] expected: u16,
) {
    let builder = MemoryRegistryBuilder::default();
    let config = workspace.write("consumers.json", CONSUMERS);
    let feature = workspace.write("feature.json", POINT_FEATURE);
    let (outcome, output) = run_captured(&insert_invocation(config, target, feature), &builder);
    match outcome {
        Err(CliError::Ingest { status, .. }) => assert_eq!(status, expected),
        other => panic!("expected an ingestion failure, found {other:?}"),
    }
    assert!(output.is_empty());
    assert_eq!(builder.factory.cleanup_calls(), 1);
}

#[rstest]
fn failed_resolution_still_cleans_up(workspace: Workspace) {
    let builder = MemoryRegistryBuilder::default();
    let config = workspace.write(
        "consumers.json",
        r#"{ "consumers": [
            { "name": "edits", "type": "memory", "layers": [] },
            { "name": "audit", "type": "postgis" }
        ] }"#,
    );
    let (outcome, _) = run_captured(&layers_invocation(config), &builder);
    let err = outcome.expect_err("unknown type must fail");
    assert!(matches!(err, CliError::Resolve(_)));
    assert_eq!(
        err.to_string(),
        "register: consumer (audit) failed: no consumers registered by the name: postgis, \
         known consumers: memory"
    );
    assert_eq!(builder.factory.init_calls(), 1);
    assert_eq!(builder.factory.cleanup_calls(), 1);
    assert!(builder.factory.live().is_empty());
}

#[rstest]
fn missing_config_files_are_reported(workspace: Workspace) {
    let builder = MemoryRegistryBuilder::default();
    let (outcome, _) = run_captured(&layers_invocation(workspace.path("absent.json")), &builder);
    match outcome {
        Err(CliError::MissingSourceFile { field, .. }) => assert_eq!(field, ARG_CONFIG),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
    assert_eq!(builder.factory.cleanup_calls(), 1);
}

#[rstest]
fn malformed_config_files_are_reported(workspace: Workspace) {
    let builder = MemoryRegistryBuilder::default();
    let config = workspace.write("consumers.json", "{ \"consumers\": [");
    let (outcome, _) = run_captured(&layers_invocation(config), &builder);
    assert!(matches!(outcome, Err(CliError::ParseConsumers { .. })));
}

#[rstest]
fn empty_configurations_list_nothing(workspace: Workspace) {
    let builder = MemoryRegistryBuilder::default();
    let config = workspace.write("consumers.json", "{}");
    let (outcome, output) = run_captured(&layers_invocation(config), &builder);
    outcome.expect("empty configuration is valid");
    assert_eq!(output, "{}\n");
}
