// Copyright 2026 Agrimatch Authors
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

//! Settings are layered: built-in defaults, then the global
//! `agrimatch/agrimatch.toml` in the platform config dir, then an optional
//! `agrimatch.toml` next to the store that can only tune browsing.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::matcher::SortKey;

pub const CONFIG_FILE: &str = "agrimatch.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub store_path: PathBuf,
    pub default_sort: SortKey,
    pub max_results: usize,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("agrimatch.db"),
            default_sort: SortKey::Relevance,
            max_results: 100,
            log_filter: "agrimatch=warn".to_string(),
        }
    }
}

/// Keys accepted in the global file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GlobalLayer {
    store_path: Option<PathBuf>,
    log_filter: Option<String>,
    default_sort: Option<String>,
    max_results: Option<usize>,
}

/// Keys accepted next to a store. Moving the store or changing the log
/// filter from inside it would be circular, so only browse defaults live here.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BrowseLayer {
    default_sort: Option<String>,
    max_results: Option<usize>,
}

impl Config {
    fn apply_global(mut self, layer: GlobalLayer) -> Result<Self> {
        if let Some(path) = layer.store_path {
            self.store_path = path;
        }
        if let Some(filter) = layer.log_filter {
            self.log_filter = filter;
        }
        self.apply_browse(BrowseLayer {
            default_sort: layer.default_sort,
            max_results: layer.max_results,
        })
    }

    fn apply_browse(mut self, layer: BrowseLayer) -> Result<Self> {
        if let Some(sort) = layer.default_sort {
            self.default_sort = SortKey::parse(&sort).context("default_sort")?;
        }
        match layer.max_results {
            Some(0) => anyhow::bail!("max_results must be at least 1"),
            Some(max) => self.max_results = max,
            None => {}
        }
        Ok(self)
    }
}

/// A located store plus the settings in effect for it.
#[derive(Debug, Clone)]
pub struct StoreCtx {
    pub store_path: PathBuf,
    pub config: Config,
}

impl StoreCtx {
    pub fn discover_from_cwd() -> Result<Self> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::discover(&cwd)
    }

    pub fn discover(start: &Path) -> Result<Self> {
        let global = load_global_config()?;
        let (root, store_path) = locate_store(start, &global.store_path)
            .ok_or_else(|| anyhow::anyhow!("store not found; run `agrimatch init` first"))?;
        let local_path = root.join(CONFIG_FILE);
        let config = match read_layer::<BrowseLayer>(&local_path)? {
            Some(layer) => {
                tracing::debug!(path = %local_path.display(), "applying store settings");
                global
                    .apply_browse(layer)
                    .with_context(|| format!("invalid {}", local_path.display()))?
            }
            None => global,
        };
        Ok(Self { store_path, config })
    }
}

fn config_dir() -> Option<PathBuf> {
    let var = |key: &str| std::env::var_os(key).map(PathBuf::from);
    if cfg!(target_os = "windows") {
        var("APPDATA").or_else(|| var("USERPROFILE").map(|p| p.join("AppData").join("Roaming")))
    } else if cfg!(target_os = "macos") {
        var("HOME").map(|home| home.join("Library").join("Application Support"))
    } else {
        var("XDG_CONFIG_HOME").or_else(|| var("HOME").map(|home| home.join(".config")))
    }
}

pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("agrimatch").join(CONFIG_FILE))
}

pub fn load_global_config() -> Result<Config> {
    let layer = match global_config_path() {
        Some(path) => read_layer::<GlobalLayer>(&path)?
            .map(|layer| (path, layer)),
        None => None,
    };
    match layer {
        Some((path, layer)) => Config::default()
            .apply_global(layer)
            .with_context(|| format!("invalid {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn read_layer<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&text)
        .map(Some)
        .with_context(|| format!("parse {}", path.display()))
}

/// Walks up from `start` to the nearest directory holding the store.
/// Returns that directory and the store file inside it.
fn locate_store(start: &Path, store_path: &Path) -> Option<(PathBuf, PathBuf)> {
    if store_path.is_absolute() {
        let root = store_path.parent().unwrap_or(store_path).to_path_buf();
        return store_path
            .exists()
            .then(|| (root, store_path.to_path_buf()));
    }
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start.ancestors().find_map(|dir| {
        let candidate = dir.join(store_path);
        candidate
            .exists()
            .then(|| (dir.to_path_buf(), candidate))
    })
}
