// Copyright 2026 Modelshelf Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use jsonschema::JSONSchema;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("catalog.jsonl")
}

fn shelf_cmd_with_env(config_root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("modelshelf"));
    cmd.env("XDG_CONFIG_HOME", config_root);
    cmd.env("HOME", config_root);
    cmd.env("APPDATA", config_root);
    cmd.env_remove("MODELSHELF_LOG");
    cmd
}

fn global_config_path(config_root: &Path) -> PathBuf {
    let base = if cfg!(target_os = "macos") {
        config_root.join("Library").join("Application Support")
    } else {
        config_root.to_path_buf()
    };
    base.join("modelshelf").join("modelshelf.toml")
}

fn load_schema() -> JSONSchema {
    let schema_text = include_str!("../schemas/response.schema.json");
    let schema_json: Value = serde_json::from_str(schema_text).expect("schema json");
    JSONSchema::options()
        .compile(&schema_json)
        .expect("compile schema")
}

fn assert_schema(schema: &JSONSchema, value: &Value) {
    if let Err(errors) = schema.validate(value) {
        let msgs: Vec<String> = errors.map(|e| e.to_string()).collect();
        panic!("schema validation failed:\n{}", msgs.join("\n"));
    }
}

/// A temp config root plus a temp store directory holding the fixture
/// catalog.
struct Shelf {
    config: TempDir,
    root: TempDir,
    schema: JSONSchema,
}

impl Shelf {
    fn empty() -> Self {
        let shelf = Self {
            config: TempDir::new().expect("config tempdir"),
            root: TempDir::new().expect("tempdir"),
            schema: load_schema(),
        };
        shelf.cmd().args(["init", "."]).assert().success();
        shelf
    }

    fn seeded() -> Self {
        let shelf = Self::empty();
        let fixture = fixture_path();
        let import = shelf.json(&["import", fixture.to_string_lossy().as_ref(), "--json"]);
        assert_eq!(import["diagnostics"]["models"], 6);
        assert_eq!(import["diagnostics"]["saved_searches"], 1);
        shelf
    }

    fn cmd(&self) -> Command {
        let mut cmd = shelf_cmd_with_env(self.config.path());
        cmd.current_dir(self.root.path());
        cmd
    }

    /// Runs a `--json` command, checks it exits cleanly and matches the
    /// response schema.
    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).output().expect("run command");
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let value: Value = serde_json::from_slice(&output.stdout).expect("parse json");
        assert_schema(&self.schema, &value);
        value
    }
}

fn result_paths(value: &Value) -> BTreeSet<String> {
    value["results"]
        .as_array()
        .expect("results array")
        .iter()
        .filter_map(|item| item["file_path"].as_str())
        .map(str::to_string)
        .collect()
}

#[test]
fn free_text_search_ranks_and_highlights() {
    let shelf = Shelf::seeded();
    let value = shelf.json(&["search", "gear", "--json"]);
    assert_eq!(value["ok"], true);
    assert_eq!(value["query"]["free_text"], "gear");
    assert_eq!(value["stats"]["total_count"], 3);
    assert_eq!(
        result_paths(&value),
        BTreeSet::from([
            "/parts/spur_gear.stl".to_string(),
            "/parts/wall_bracket.obj".to_string(),
            "/parts/gear_box.3mf".to_string(),
        ])
    );
    let spur = value["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["file_path"] == "/parts/spur_gear.stl")
        .expect("spur gear result");
    assert_eq!(spur["highlights"]["title"], "Spur <mark>gear</mark>");
    assert!(value.get("next_offset").is_none());
}

#[test]
fn predicates_narrow_and_echo_filters() {
    let shelf = Shelf::seeded();

    let tagged = shelf.json(&["search", "tag=hardware", "--json"]);
    assert_eq!(tagged["query"]["free_text"], "");
    assert_eq!(tagged["query"]["filters"]["tags_include"][0], "hardware");
    assert_eq!(
        result_paths(&tagged),
        BTreeSet::from([
            "/parts/wall_bracket.obj".to_string(),
            "/decor/coat_hook.stl".to_string(),
        ])
    );

    let outside = shelf.json(&["search", "gear !inProject", "--json"]);
    assert_eq!(outside["stats"]["total_count"], 0);
    assert_eq!(outside["query"]["filters"]["in_project"], false);

    let filtered = shelf.json(&[
        "search",
        "tag!=vase",
        "--filter",
        "format=stl",
        "--filter",
        "min_rating=4",
        "--json",
    ]);
    assert_eq!(
        result_paths(&filtered),
        BTreeSet::from([
            "/parts/spur_gear.stl".to_string(),
            "/decor/coat_hook.stl".to_string(),
        ])
    );
}

#[test]
fn paging_reports_next_offset() {
    let shelf = Shelf::seeded();
    let first = shelf.json(&["search", "LAT>=30", "--limit", "4", "--json"]);
    assert_eq!(first["stats"]["total_count"], 6);
    assert_eq!(first["stats"]["returned"], 4);
    assert_eq!(first["next_offset"], 4);

    let second = shelf.json(&["search", "LAT>=30", "--limit", "4", "--offset", "4", "--json"]);
    assert_eq!(second["stats"]["total_count"], 6);
    assert_eq!(second["stats"]["returned"], 2);
    assert!(second.get("next_offset").is_none());
    assert!(result_paths(&first).is_disjoint(&result_paths(&second)));
}

#[test]
fn empty_intent_returns_empty_page_without_history() {
    let shelf = Shelf::seeded();
    let value = shelf.json(&["search", "AND OR", "--json"]);
    assert_eq!(value["ok"], true);
    assert_eq!(value["stats"]["total_count"], 0);
    assert_eq!(value["results"], serde_json::json!([]));

    let history = shelf.json(&["history", "--json"]);
    assert_eq!(history["results"], serde_json::json!([]));

    shelf.json(&["search", "hook", "--json"]);
    let history = shelf.json(&["history", "--json"]);
    assert_eq!(history["results"][0]["query"], "hook");
    assert_eq!(history["results"][0]["result_count"], 1);
}

#[test]
fn punctuation_never_fails_a_search() {
    let shelf = Shelf::seeded();
    for query in ["gear\"", "(vase", "hook*", "?"] {
        let value = shelf.json(&["search", query, "--json"]);
        assert_eq!(value["ok"], true, "query {query:?}");
    }
}

#[test]
fn unknown_filter_is_a_json_error() {
    let shelf = Shelf::seeded();
    let value = shelf.json(&["search", "gear", "--filter", "colour=red", "--json"]);
    assert_eq!(value["ok"], false);
    assert_eq!(value["error"]["code"], "unknown_filter");
    assert!(value["error"]["hint"].as_str().unwrap().contains("min_rating"));

    shelf
        .cmd()
        .args(["search", "gear", "--filter", "colour=red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown filter: colour"));
}

#[test]
fn saved_search_lifecycle() {
    let shelf = Shelf::seeded();

    let imported = shelf.json(&["search", "--saved", "lathe gears", "--json"]);
    assert_eq!(imported["query"]["saved"], "lathe gears");
    assert_eq!(
        result_paths(&imported),
        BTreeSet::from(["/parts/spur_gear.stl".to_string()])
    );

    let saved = shelf.json(&["save", "hooks", "hook", "--filter", "category=Hardware", "--json"]);
    let id = saved["results"][0]["id"].as_i64().expect("saved id");

    let listed = shelf.json(&["saved", "--json"]);
    let names: Vec<&str> = listed["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert!(names.contains(&"hooks"));
    assert!(names.contains(&"lathe gears"));

    let id_arg = id.to_string();
    let removed = shelf.json(&["unsave", &id_arg, "--json"]);
    assert_eq!(removed["ok"], true);
    assert_eq!(removed["diagnostics"]["deleted"], true);
    let again = shelf.json(&["unsave", &id_arg, "--json"]);
    assert_eq!(again["ok"], true);
    assert_eq!(again["diagnostics"]["deleted"], false);
    assert!(again.get("actions").is_none_or(Value::is_null));
    shelf
        .cmd()
        .args(["unsave", &id_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("No saved search {id}")));

    let missing = shelf.json(&["search", "--saved", "hooks", "--json"]);
    assert_eq!(missing["error"]["code"], "not_found");
}

#[test]
fn suggestions_and_views() {
    let shelf = Shelf::seeded();
    let value = shelf.json(&["suggest", "sp", "--json"]);
    assert_eq!(
        value["results"],
        serde_json::json!(["spiral_vase.stl", "spur_gear.stl", "Spiral vase", "Spur gear"])
    );
    let short = shelf.json(&["suggest", "s", "--json"]);
    assert_eq!(short["results"], serde_json::json!([]));

    shelf.json(&["view", "/decor/drawer_knob.step", "--json"]);
    let recent = shelf.json(&["search", "LAT>=1", "--json"]);
    assert!(!result_paths(&recent).contains("/decor/drawer_knob.step"));
    assert_eq!(recent["stats"]["total_count"], 5);

    let missing = shelf.json(&["view", "/nope.stl", "--json"]);
    assert_eq!(missing["ok"], false);
}

#[test]
fn maintenance_commands() {
    let shelf = Shelf::seeded();

    let stats = shelf.json(&["stats", "--json"]);
    assert_eq!(stats["stats"]["model_count"], 6);
    assert_eq!(stats["diagnostics"]["metadata_count"], 5);
    assert_eq!(stats["diagnostics"]["project_count"], 2);

    let doctor = shelf.json(&["doctor", "--json"]);
    assert_eq!(doctor["diagnostics"]["integrity"], "ok");
    assert_eq!(doctor["diagnostics"]["consistency"]["models_fts_count"], 6);
    assert!(doctor.get("actions").is_none());

    let reindex = shelf.json(&["reindex", "--json"]);
    assert_eq!(reindex["diagnostics"]["metadata_fts_count"], 5);

    shelf.json(&["search", "vase", "--json"]);
    let cleared = shelf.json(&["clear-history", "--older-than-days", "30", "--json"]);
    assert_eq!(cleared["diagnostics"]["removed"], 0);
    let history = shelf.json(&["history", "--json"]);
    assert_eq!(history["results"][0]["query"], "vase");
}

#[test]
fn export_import_roundtrip() {
    let shelf = Shelf::seeded();
    let export_path = shelf.root.path().join("export.jsonl");
    let export = shelf.json(&[
        "export",
        "--out",
        export_path.to_string_lossy().as_ref(),
        "--json",
    ]);
    assert_eq!(export["diagnostics"]["models"], 6);
    assert_eq!(export["diagnostics"]["saved_searches"], 1);

    let other = Shelf::empty();
    let import = other.json(&["import", export_path.to_string_lossy().as_ref(), "--json"]);
    assert_eq!(import["stats"]["model_count"], 6);

    let before = shelf.json(&["search", "hardware OR knob", "--json"]);
    let after = other.json(&["search", "hardware OR knob", "--json"]);
    assert_eq!(result_paths(&before), result_paths(&after));
    assert_eq!(before["stats"]["total_count"], 3);
}

#[test]
fn config_limits_apply() {
    let shelf = Shelf::seeded();
    let config_path = global_config_path(shelf.config.path());
    fs::create_dir_all(config_path.parent().expect("config parent")).expect("config dir");
    fs::write(
        &config_path,
        "store_path = \"modelshelf.db\"\ndefault_limit = 2\nmax_limit = 3\nrecord_history = false\n",
    )
    .expect("write config");

    let value = shelf.json(&["search", "LAT>=0", "--json"]);
    assert_eq!(value["query"]["limit"], 2);
    assert_eq!(value["stats"]["returned"], 2);

    let clamped = shelf.json(&["search", "LAT>=0", "--limit", "50", "--json"]);
    assert_eq!(clamped["query"]["limit"], 3);

    let history = shelf.json(&["history", "--json"]);
    assert_eq!(history["results"], serde_json::json!([]));
}

#[test]
fn missing_store_is_reported() {
    let config = TempDir::new().expect("config tempdir");
    let root = TempDir::new().expect("tempdir");
    shelf_cmd_with_env(config.path())
        .current_dir(root.path())
        .args(["stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("modelshelf init"));
}

#[test]
fn completions_are_generated() {
    let config = TempDir::new().expect("config tempdir");
    shelf_cmd_with_env(config.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("modelshelf"));
}
