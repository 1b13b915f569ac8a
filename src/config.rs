use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::ConfigError;
use crate::sequence::DEFAULT_TARGET_PERCENTAGE;

/// How the participant signals a match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Space bar only
    #[default]
    #[strum(serialize = "spacebar")]
    Space,
    /// Mouse click only
    #[strum(serialize = "mouse click")]
    Mouse,
    /// Space bar or mouse click
    #[strum(serialize = "spacebar or mouse click")]
    Both,
}

impl ResponseMode {
    pub fn allows_keyboard(self) -> bool {
        !matches!(self, ResponseMode::Mouse)
    }

    pub fn allows_pointer(self) -> bool {
        !matches!(self, ResponseMode::Space)
    }
}

/// Size of the stimulus digit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FontSize {
    Small,
    #[default]
    Normal,
    Large,
    ExtraLarge,
}

impl FontSize {
    /// Terminal cells per glyph column; rows use half of that, rounded up.
    pub fn scale(self) -> u16 {
        match self {
            FontSize::Small => 1,
            FontSize::Normal => 2,
            FontSize::Large => 3,
            FontSize::ExtraLarge => 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralSettings {
    pub skip_instructions: bool,
    pub skip_practice: bool,
    pub font_size: FontSize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NBackSettings {
    pub n_level: u8,
    pub number_of_trials: usize,
    pub number_of_practice_trials: usize,
    /// Comma separated digits, empty means generated
    pub custom_sequence: String,
    pub custom_practice_sequence: String,
    #[serde(rename = "displayDuration")]
    pub display_duration_ms: u64,
    #[serde(rename = "interStimulusInterval")]
    pub inter_stimulus_interval_ms: u64,
    #[serde(rename = "responseKey")]
    pub response_mode: ResponseMode,
    pub target_percentage: u32,
}

impl Default for NBackSettings {
    fn default() -> Self {
        Self {
            n_level: 2,
            number_of_trials: 50,
            number_of_practice_trials: 10,
            custom_sequence: String::new(),
            custom_practice_sequence: String::new(),
            display_duration_ms: 500,
            inter_stimulus_interval_ms: 2000,
            response_mode: ResponseMode::Space,
            target_percentage: DEFAULT_TARGET_PERCENTAGE,
        }
    }
}

impl NBackSettings {
    pub fn n_level(&self) -> usize {
        self.n_level as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakSettings {
    #[serde(rename = "enableBreaks")]
    pub enabled: bool,
    /// Trials between breaks
    #[serde(rename = "breakFrequency")]
    pub frequency: usize,
    #[serde(rename = "breakDuration")]
    pub duration_secs: u64,
}

impl Default for BreakSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: 25,
            duration_secs: 30,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PhotoDiodePosition {
    #[default]
    Off,
    TopLeft,
    TopRight,
    Customize,
}

/// Placement of the signal patch, in terminal cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoDiodeSettings {
    #[serde(rename = "usePhotoDiode")]
    pub position: PhotoDiodePosition,
    pub photo_diode_left: Option<u16>,
    pub photo_diode_top: Option<u16>,
    pub photo_diode_width: Option<u16>,
    pub photo_diode_height: Option<u16>,
    /// Outline the patch so its placement can be checked by eye
    pub test_photo_diode: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NextStepSettings {
    #[serde(rename = "linkToNextPage")]
    pub enabled: bool,
    pub title: String,
    pub description: String,
    /// May contain `{participantName}`
    pub link: String,
    pub link_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub general_settings: GeneralSettings,
    #[serde(rename = "nBackSettings")]
    pub nback: NBackSettings,
    #[serde(rename = "breakSettings")]
    pub breaks: BreakSettings,
    #[serde(rename = "photoDiodeSettings")]
    pub photo_diode: PhotoDiodeSettings,
    #[serde(rename = "nextStepSettings")]
    pub next_step: NextStepSettings,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nb = &self.nback;
        if !(1..=4).contains(&nb.n_level) {
            return Err(ConfigError::NLevel(nb.n_level));
        }
        if nb.number_of_trials == 0 {
            return Err(ConfigError::Zero("numberOfTrials"));
        }
        if nb.number_of_practice_trials == 0 {
            return Err(ConfigError::Zero("numberOfPracticeTrials"));
        }
        if nb.display_duration_ms == 0 {
            return Err(ConfigError::Zero("displayDuration"));
        }
        if nb.inter_stimulus_interval_ms == 0 {
            return Err(ConfigError::Zero("interStimulusInterval"));
        }
        if nb.target_percentage > 100 {
            return Err(ConfigError::TargetPercentage(nb.target_percentage));
        }
        if self.breaks.enabled {
            if self.breaks.frequency == 0 {
                return Err(ConfigError::Zero("breakFrequency"));
            }
            if self.breaks.duration_secs == 0 {
                return Err(ConfigError::Zero("breakDuration"));
            }
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "nback") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("nback_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Config::default(),
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config file");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
