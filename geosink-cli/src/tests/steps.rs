//! Behaviour-driven step definitions driving the CLI command scenarios.

use super::helpers::{
    MemoryRegistryBuilder, POINT_FEATURE, Workspace, insert_invocation, layers_invocation,
    run_captured,
};
use super::*;
use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

/// Aggregates command scenario state so each step only needs a single world
/// argument.
struct CommandWorld {
    workspace: Workspace,
    builder: MemoryRegistryBuilder,
    config: RefCell<Option<Utf8PathBuf>>,
    feature: RefCell<Option<Utf8PathBuf>>,
    outcome: RefCell<Option<Result<(), CliError>>>,
    output: RefCell<String>,
}

impl CommandWorld {
    fn new() -> Self {
        Self {
            workspace: Workspace::new(),
            builder: MemoryRegistryBuilder::default(),
            config: RefCell::new(None),
            feature: RefCell::new(None),
            outcome: RefCell::new(None),
            output: RefCell::new(String::new()),
        }
    }

    fn config(&self) -> Utf8PathBuf {
        self.config.borrow().clone().expect("configuration written")
    }

    fn run(&self, invocation: &Invocation) {
        let (outcome, output) = run_captured(invocation, &self.builder);
        *self.outcome.borrow_mut() = Some(outcome);
        *self.output.borrow_mut() = output;
    }
}

#[fixture]
fn world() -> CommandWorld {
    CommandWorld::new()
}

fn unquote(text: &str) -> &str {
    text.trim_matches('"')
}

#[given("a configuration with the consumer {name}")]
fn configuration_with_consumer(world: &CommandWorld, name: String) {
    let contents = serde_json::json!({
        "consumers": [{
            "name": unquote(&name),
            "type": "memory",
            "layers": [
                { "name": "wells", "geom_type": "point", "srid": 4326 },
                { "name": "roads", "geom_type": "linestring" },
            ],
        }],
    });
    let path = world
        .workspace
        .write("consumers.json", &contents.to_string());
    *world.config.borrow_mut() = Some(path);
}

#[given("a point feature file")]
fn point_feature_file(world: &CommandWorld) {
    let path = world.workspace.write("feature.json", POINT_FEATURE);
    *world.feature.borrow_mut() = Some(path);
}

#[when("the layers command runs")]
fn run_layers_command(world: &CommandWorld) {
    world.run(&layers_invocation(world.config()));
}

#[when("the insert command targets {target}")]
fn run_insert_command(world: &CommandWorld, target: String) {
    let feature = world.feature.borrow().clone().expect("feature written");
    world.run(&insert_invocation(world.config(), unquote(&target), feature));
}

#[then("the command succeeds")]
fn command_succeeds(world: &CommandWorld) {
    let outcome = world.outcome.borrow();
    match outcome.as_ref() {
        Some(Ok(())) => {}
        other => panic!("expected success, found {other:?}"),
    }
}

#[then("the command fails with status {status}")]
fn command_fails_with_status(world: &CommandWorld, status: u16) {
    let outcome = world.outcome.borrow();
    match outcome.as_ref() {
        Some(Err(CliError::Ingest { status: actual, .. })) => assert_eq!(*actual, status),
        other => panic!("expected an ingestion failure, found {other:?}"),
    }
}

#[then("the output lists the layers {layers} for {consumer}")]
fn output_lists_layers(world: &CommandWorld, layers: String, consumer: String) {
    let printed: serde_json::Value =
        serde_json::from_str(&world.output.borrow()).expect("json output");
    let names: Vec<&str> = printed
        .get(unquote(&consumer))
        .and_then(serde_json::Value::as_array)
        .expect("consumer listed")
        .iter()
        .filter_map(|layer| layer.get("name").and_then(serde_json::Value::as_str))
        .collect();
    let expected: Vec<&str> = unquote(&layers).split(',').collect();
    assert_eq!(names, expected);
}

#[then("the output is an empty object")]
fn output_is_empty_object(world: &CommandWorld) {
    assert_eq!(world.output.borrow().trim_end(), "{}");
}

#[then("the backend was cleaned up once")]
fn cleaned_up_once(world: &CommandWorld) {
    assert_eq!(world.builder.factory.cleanup_calls(), 1);
}

macro_rules! register_command_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/cli_commands.feature", name = $scenario_title)]
        fn $fn_name(world: CommandWorld) {
            let _ = world;
        }
    };
}

register_command_scenario!(listing_layers, "listing the layers of a configured consumer");
register_command_scenario!(inserting_a_feature, "inserting a feature through the ingestion path");
register_command_scenario!(
    inserting_into_unknown_consumers,
    "inserting into a consumer that is not configured"
);
