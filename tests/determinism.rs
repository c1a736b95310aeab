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

use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

fn shelf_cmd(config_root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("modelshelf"));
    cmd.env("XDG_CONFIG_HOME", config_root);
    cmd.env("HOME", config_root);
    cmd.env("APPDATA", config_root);
    cmd
}

fn normalize_json(mut value: Value) -> Value {
    if let Some(stats) = value.get_mut("stats")
        && let Some(obj) = stats.as_object_mut()
    {
        obj.insert("took_ms".to_string(), json!(0));
    }
    value
}

fn run_json(cmd: &mut Command, cwd: &Path) -> Value {
    let output = cmd.current_dir(cwd).output().expect("run command");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("parse json")
}

fn assert_repeatable(args: &[&str], runs: usize, config_root: &Path, cwd: &Path) {
    let mut baseline: Option<Value> = None;
    for _ in 0..runs {
        let mut cmd = shelf_cmd(config_root);
        cmd.args(args);
        let json = normalize_json(run_json(&mut cmd, cwd));
        if let Some(ref expected) = baseline {
            assert_eq!(&json, expected, "args {args:?}");
        } else {
            baseline = Some(json);
        }
    }
}

#[test]
fn deterministic_outputs() {
    let config = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("catalog.jsonl");

    let mut cmd = shelf_cmd(config.path());
    cmd.args(["init", "."]);
    assert!(cmd.current_dir(root).output().unwrap().status.success());

    let mut cmd = shelf_cmd(config.path());
    cmd.args(["import", fixture.to_string_lossy().as_ref()]);
    assert!(cmd.current_dir(root).output().unwrap().status.success());

    assert_repeatable(&["search", "gear OR hook", "--json"], 10, config.path(), root);
    assert_repeatable(
        &["search", "LAT>=30", "--limit", "3", "--offset", "3", "--json"],
        10,
        config.path(),
        root,
    );
    assert_repeatable(&["search", "(wall", "--json"], 5, config.path(), root);
    assert_repeatable(&["suggest", "ha", "--json"], 10, config.path(), root);
}
