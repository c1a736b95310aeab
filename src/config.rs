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
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: PathBuf,
    pub default_limit: usize,
    pub max_limit: usize,
    pub history_limit: usize,
    pub suggestion_limit: usize,
    pub record_history: bool,
    pub highlight_open: String,
    pub highlight_close: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("modelshelf.db"),
            default_limit: 100,
            max_limit: 1000,
            history_limit: 50,
            suggestion_limit: 10,
            record_history: true,
            highlight_open: "<mark>".to_string(),
            highlight_close: "</mark>".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Applies the configured default and ceiling to a requested page size.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigCtx {
    pub root: PathBuf,
    pub config: Config,
}

impl ConfigCtx {
    pub fn load_from_cwd() -> Result<Self> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::locate(load_global_config()?, &cwd)
    }

    /// Finds the directory holding `config.store_path`, starting at `start`.
    pub fn locate(config: Config, start: &Path) -> Result<Self> {
        let root = find_store_root(start, &config.store_path)
            .ok_or_else(|| anyhow::anyhow!("store not found; run `modelshelf init` first"))?;
        Ok(Self { root, config })
    }

    pub fn store_path(&self) -> PathBuf {
        if self.config.store_path.is_absolute() {
            self.config.store_path.clone()
        } else {
            self.root.join(&self.config.store_path)
        }
    }
}

/// Platform config directory, resolved through `var` so callers choose
/// where environment values come from.
fn config_dir_with(var: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let base = if cfg!(target_os = "windows") {
        var("APPDATA").map(PathBuf::from).or_else(|| {
            var("USERPROFILE").map(|profile| PathBuf::from(profile).join("AppData").join("Roaming"))
        })
    } else if cfg!(target_os = "macos") {
        var("HOME").map(|home| PathBuf::from(home).join("Library").join("Application Support"))
    } else {
        var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(".config")))
    };
    base.map(|dir| dir.join("modelshelf").join("modelshelf.toml"))
}

pub fn global_config_path() -> Option<PathBuf> {
    config_dir_with(|key| std::env::var(key).ok())
}

pub fn load_global_config() -> Result<Config> {
    match global_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => Ok(Config::default()),
    }
}

pub fn find_store_root(start: &Path, store_path: &Path) -> Option<PathBuf> {
    if store_path.is_absolute() {
        return store_path
            .exists()
            .then(|| store_path.parent().unwrap_or(store_path).to_path_buf());
    }
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|dir| dir.join(store_path).exists())
        .map(Path::to_path_buf)
}

pub fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut config: Config = toml::from_str(&text).context("parse modelshelf.toml")?;
    if config.max_limit == 0 {
        config.max_limit = Config::default().max_limit;
    }
    config.default_limit = config.default_limit.min(config.max_limit);
    Ok(config)
}
