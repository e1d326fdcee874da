//! Persisted user settings and template resolution.
//!
//! Grounded on `original_source/src/termcap/config/{paths,defaults,manager}.py`:
//! a platform config directory holding a `config.toml` and a `templates/`
//! subdirectory of custom SVGs, with one template shipped in the binary
//! itself so rendering works before the user installs anything.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use termsnap_lib::{Error, Result};

const BUILTIN_DEFAULT_TEMPLATE: &str = include_str!("templates/default.svg");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralSettings {
    pub default_template: String,
    pub default_geometry: String,
    pub default_min_duration: u64,
    pub default_max_duration: u64,
    pub default_loop_delay: u64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        GeneralSettings {
            default_template: "default".to_owned(),
            default_geometry: "82x19".to_owned(),
            default_min_duration: 17,
            default_max_duration: 3000,
            default_loop_delay: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TemplateSettings {
    pub custom_templates_enabled: bool,
    pub builtin_templates_enabled: bool,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        TemplateSettings {
            custom_templates_enabled: true,
            builtin_templates_enabled: true,
        }
    }
}

/// The full, persisted configuration. Deserialized leniently: a config file
/// missing a table or key falls back to that field's default rather than
/// failing to load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub templates: TemplateSettings,
}

/// Owns the on-disk configuration directory and the user's persisted
/// settings, and resolves template names to content.
pub struct ConfigManager {
    settings: Settings,
    templates_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Resolves the platform config directory (creating it and the
    /// `templates/` subdirectory if necessary) and loads `config.toml`,
    /// writing out the defaults on first run.
    pub fn load() -> Result<Self> {
        let project_dirs = ProjectDirs::from("", "rexwzh", "termcap")
            .ok_or_else(|| Error::InvalidTemplate("could not resolve a config directory for this platform".into()))?;

        let config_dir = project_dirs.config_dir().to_path_buf();
        let config_file = config_dir.join("config.toml");
        let templates_dir = config_dir.join("templates");
        Self::from_paths(config_file, templates_dir)
    }

    /// Loads (or initializes) settings rooted at an explicit config file and
    /// templates directory. Split out from [`ConfigManager::load`] so tests
    /// can exercise persistence without touching the real platform config
    /// directory.
    fn from_paths(config_file: PathBuf, templates_dir: PathBuf) -> Result<Self> {
        if let Some(parent) = config_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&templates_dir)?;

        let settings = if config_file.exists() {
            let text = fs::read_to_string(&config_file)?;
            toml::from_str(&text).unwrap_or_default()
        } else {
            Settings::default()
        };

        let mut manager = ConfigManager {
            settings,
            templates_dir,
            config_file,
        };
        manager.save()?;
        Ok(manager)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Serializes the current settings to `config.toml`.
    pub fn save(&self) -> Result<()> {
        let text = toml::to_string_pretty(&self.settings)
            .map_err(|e| Error::InvalidTemplate(e.to_string()))?;
        fs::write(&self.config_file, text)?;
        Ok(())
    }

    /// Resets the in-memory and on-disk settings to their defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.settings = Settings::default();
        self.save()
    }

    /// The content of a named template. A custom template in `templates/`
    /// shadows a built-in of the same name when both are enabled.
    pub fn template_content(&self, name: &str) -> Result<String> {
        if self.settings.templates.custom_templates_enabled {
            let path = self.templates_dir.join(format!("{name}.svg"));
            if path.exists() {
                return Ok(fs::read_to_string(path)?);
            }
        }

        if self.settings.templates.builtin_templates_enabled && name == "default" {
            return Ok(BUILTIN_DEFAULT_TEMPLATE.to_owned());
        }

        Err(Error::TemplateNotFound(name.to_owned()))
    }

    /// Names of every template currently resolvable, built-in and custom. A
    /// custom template shadows a built-in of the same name into a single
    /// entry rather than listing it twice.
    pub fn available_templates(&self) -> Vec<String> {
        let mut names = std::collections::BTreeSet::new();
        if self.settings.templates.builtin_templates_enabled {
            names.insert("default".to_owned());
        }
        if self.settings.templates.custom_templates_enabled {
            if let Ok(entries) = fs::read_dir(&self.templates_dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("svg") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            names.insert(stem.to_owned());
                        }
                    }
                }
            }
        }
        names.into_iter().collect()
    }

    /// Copies `source_path` into the templates directory under `name`.
    pub fn install_template(&self, name: &str, source_path: &std::path::Path) -> Result<()> {
        let dest = self.templates_dir.join(format!("{name}.svg"));
        fs::copy(source_path, dest)?;
        Ok(())
    }

    /// Deletes a custom template. Built-in templates cannot be removed.
    pub fn remove_template(&self, name: &str) -> Result<()> {
        let path = self.templates_dir.join(format!("{name}.svg"));
        if !path.exists() {
            return Err(Error::TemplateNotFound(name.to_owned()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// A flattened `section.key -> value` view, for `config get`/`show`.
    pub fn as_map(&self) -> Result<BTreeMap<String, String>> {
        let value = toml::Value::try_from(&self.settings)
            .map_err(|e| Error::InvalidTemplate(e.to_string()))?;
        let mut map = BTreeMap::new();
        if let toml::Value::Table(sections) = value {
            for (section, table) in sections {
                if let toml::Value::Table(table) = table {
                    for (key, value) in table {
                        map.insert(format!("{section}.{key}"), value.to_string());
                    }
                }
            }
        }
        Ok(map)
    }
}
