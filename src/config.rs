use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The version-controlled calendar directory
    pub base_dir: String,

    /// Plain-text event source consumed by the renderer
    pub event_file: String,

    /// Birthday reference file opened by `-b`
    pub birthday_file: String,

    /// Genealogy birthday file opened by `-t`
    pub genealogy_file: String,

    /// Fixed stream-editor rules that normalize the event file's date tokens
    pub rules_file: String,

    /// Directory for rendered pages, relative to base_dir
    pub output_dir: String,

    /// Exported iCalendar document, relative to base_dir
    pub ics_file: String,

    /// Calendar display name (X-WR-CALNAME)
    pub calendar_name: String,

    /// Suffix appended to exported event UIDs
    pub owner: String,

    /// IANA timezone for exported events
    pub timezone: String,

    /// Commit message used on every publish
    pub commit_message: String,

    /// External command configuration
    pub commands: Commands,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Commands {
    pub pcal: String,
    pub sed: String,
    pub open: String,
    pub git: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: "~/cal".to_string(),
            event_file: "calendar.txt".to_string(),
            birthday_file: "birthdays.txt".to_string(),
            genealogy_file: "genealogy.txt".to_string(),
            rules_file: "pcal.sed".to_string(),
            output_dir: "html".to_string(),
            ics_file: "calendar.ics".to_string(),
            calendar_name: "calendar".to_string(),
            owner: "calpage".to_string(),
            timezone: "Europe/Zurich".to_string(),
            commit_message: "update calendar".to_string(),
            commands: Commands::default(),
        }
    }
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            pcal: "pcal".to_string(),
            sed: "sed".to_string(),
            open: "xdg-open".to_string(),
            git: "git".to_string(),
        }
    }
}

impl Config {
    /// The calendar directory with `~` expanded
    pub fn base_dir(&self) -> PathBuf {
        expand_path(&self.base_dir)
    }

    pub fn event_path(&self) -> PathBuf {
        self.base_dir().join(&self.event_file)
    }

    pub fn birthday_path(&self) -> PathBuf {
        self.base_dir().join(&self.birthday_file)
    }

    pub fn genealogy_path(&self) -> PathBuf {
        self.base_dir().join(&self.genealogy_file)
    }

    pub fn rules_path(&self) -> PathBuf {
        self.base_dir().join(&self.rules_file)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.base_dir().join(&self.output_dir)
    }

    pub fn ics_path(&self) -> PathBuf {
        self.base_dir().join(&self.ics_file)
    }
}

/// Get the config file path (~/.config/calpage/config.toml)
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("calpage");
    Ok(config_dir.join("config.toml"))
}

/// Load config from ~/.config/calpage/config.toml.
///
/// Every field has a default, so a missing file just yields the defaults.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;

    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

    Ok(config)
}

/// Expand ~ in paths to the home directory
pub fn expand_path(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
