//! `fes params`: the TOML parameter store from `[store].path`.

use std::collections::BTreeMap;

use fes_config::{Config, FileStore};
use fes_core::SessionParams;
use fes_core::gateway::params;
use fes_traits::ParamStore;
use serde_json::json;

pub struct ParamsView {
    pub path: String,
    pub stored: BTreeMap<String, u16>,
    pub effective: SessionParams,
}

pub fn show(cfg: &Config) -> eyre::Result<ParamsView> {
    let store = FileStore::open(&cfg.store.path)?;
    let defaults = SessionParams::from(&cfg.session);
    Ok(ParamsView {
        path: store.path().display().to_string(),
        stored: store.entries().clone(),
        effective: params::load(&store, &defaults),
    })
}

/// Erase the store. Returns how many keys were removed.
pub fn reset(cfg: &Config) -> eyre::Result<usize> {
    let mut store = FileStore::open(&cfg.store.path)?;
    let removed = store.entries().len();
    store
        .clear()
        .map_err(|e| eyre::eyre!("clearing {}: {e}", cfg.store.path))?;
    Ok(removed)
}

impl ParamsView {
    pub fn to_json(&self) -> serde_json::Value {
        let effective: BTreeMap<_, _> = params::entries(&self.effective).into_iter().collect();
        json!({ "path": self.path, "stored": self.stored, "effective": effective })
    }

    pub fn render_text(&self) -> String {
        let mut out = vec![format!("store: {}", self.path)];
        for (key, value) in params::entries(&self.effective) {
            let origin = if self.stored.contains_key(key) {
                "stored"
            } else {
                "default"
            };
            out.push(format!("{key} = {value} ({origin})"));
        }
        // captured values that are not session parameters
        for key in [params::KEY_BODY_WEIGHT, params::KEY_MESE] {
            if let Some(v) = self.stored.get(key) {
                out.push(format!("{key} = {v} (stored)"));
            }
        }
        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_at(dir: &tempfile::TempDir) -> Config {
        let mut cfg = Config::default();
        cfg.store.path = dir.path().join("params.toml").display().to_string();
        cfg
    }

    #[test]
    fn missing_store_shows_defaults() {
        let dir = tempdir().unwrap();
        let view = show(&config_at(&dir)).unwrap();
        assert!(view.stored.is_empty());
        assert_eq!(view.effective, SessionParams::default());
        assert!(view.render_text().contains("hold_ms = 2000 (default)"));
    }

    #[test]
    fn stored_values_override_and_reset_clears() {
        let dir = tempdir().unwrap();
        let cfg = config_at(&dir);
        std::fs::write(&cfg.store.path, "hold_ms = 900\nmese = 15\n").unwrap();

        let view = show(&cfg).unwrap();
        assert_eq!(view.effective.hold_ms, 900);
        let text = view.render_text();
        assert!(text.contains("hold_ms = 900 (stored)"));
        assert!(text.contains("mese = 15 (stored)"));
        assert_eq!(view.to_json()["effective"]["hold_ms"], 900);

        assert_eq!(reset(&cfg).unwrap(), 2);
        assert!(show(&cfg).unwrap().stored.is_empty());
    }
}
