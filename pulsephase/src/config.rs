//! INI configuration file.
//!
//! Settings live in `~/.config/pulsephase/config.ini`:
//!
//! ```ini
//! [tempo]
//! program = tempo
//! nspan = 960
//! ncoef = 12
//! maxha = 8
//! site = 7
//! frequency = 1400
//! verify = true
//! max_attempts = 8
//!
//! [predictor]
//! backend = polyco
//! flexibility = 0
//! precision = 1e-10
//!
//! [chebyshev]
//! segment_days = 1
//! ncoeff_time = 12
//! ncoeff_freq = 2
//! phase_buffer = 0.01
//!
//! [append]
//! must_match = true
//! chronological = false
//! max_overlap = 30
//! max_frequency_difference = 0.1
//!
//! [logging]
//! level = info
//! file =
//! ```
//!
//! Missing keys take their defaults. Individual keys are addressed as
//! `section.key` through [`ConfigKey`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::predictor::PredictorKind;
use crate::segment::{DEFAULT_FLEXIBILITY, DEFAULT_PHASE_BUFFER};
use crate::solver::DEFAULT_PRECISION;

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulsephase")
        .join("config.ini")
}

/// `[tempo]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoSection {
    pub program: PathBuf,
    /// Working directory; resolved at run time when unset.
    pub scratch_dir: Option<PathBuf>,
    pub nspan: u32,
    pub ncoef: u32,
    pub maxha: u32,
    pub site: String,
    pub frequency: f64,
    pub verify: bool,
    pub max_attempts: u32,
}

impl Default for TempoSection {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tempo"),
            scratch_dir: None,
            nspan: 960,
            ncoef: 12,
            maxha: 8,
            site: "7".to_string(),
            frequency: 1400.0,
            verify: true,
            max_attempts: 8,
        }
    }
}

/// `[predictor]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorSection {
    pub backend: PredictorKind,
    pub flexibility: f64,
    pub precision: f64,
}

impl Default for PredictorSection {
    fn default() -> Self {
        Self {
            backend: PredictorKind::Polyco,
            flexibility: DEFAULT_FLEXIBILITY,
            precision: DEFAULT_PRECISION,
        }
    }
}

/// `[chebyshev]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ChebyshevSection {
    pub segment_days: f64,
    pub ncoeff_time: usize,
    pub ncoeff_freq: usize,
    pub phase_buffer: f64,
}

impl Default for ChebyshevSection {
    fn default() -> Self {
        Self {
            segment_days: 1.0,
            ncoeff_time: 12,
            ncoeff_freq: 2,
            phase_buffer: DEFAULT_PHASE_BUFFER,
        }
    }
}

/// `[append]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendSection {
    pub must_match: bool,
    pub chronological: bool,
    /// Seconds by which appended data may precede the end of existing data.
    pub max_overlap: f64,
    /// MHz
    pub max_frequency_difference: f64,
}

impl Default for AppendSection {
    fn default() -> Self {
        Self {
            must_match: true,
            chronological: false,
            max_overlap: 30.0,
            max_frequency_difference: 0.1,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSection {
    /// Filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub tempo: TempoSection,
    pub predictor: PredictorSection,
    pub chebyshev: ChebyshevSection,
    pub append: AppendSection,
    pub logging: LoggingSection,
}

impl ConfigFile {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Render as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Save to the default location, creating parent directories.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }
}

/// A single `section.key` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    TempoProgram,
    TempoScratchDir,
    TempoNspan,
    TempoNcoef,
    TempoMaxha,
    TempoSite,
    TempoFrequency,
    TempoVerify,
    TempoMaxAttempts,
    PredictorBackend,
    PredictorFlexibility,
    PredictorPrecision,
    ChebyshevSegmentDays,
    ChebyshevNcoeffTime,
    ChebyshevNcoeffFreq,
    ChebyshevPhaseBuffer,
    AppendMustMatch,
    AppendChronological,
    AppendMaxOverlap,
    AppendMaxFrequencyDifference,
    LoggingLevel,
    LoggingFile,
}

fn parse_value<T: FromStr>(key: ConfigKey, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.name(),
        value: value.to_string(),
    })
}

fn parse_bool(key: ConfigKey, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.name(),
            value: value.to_string(),
        }),
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

impl ConfigKey {
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            TempoProgram,
            TempoScratchDir,
            TempoNspan,
            TempoNcoef,
            TempoMaxha,
            TempoSite,
            TempoFrequency,
            TempoVerify,
            TempoMaxAttempts,
            PredictorBackend,
            PredictorFlexibility,
            PredictorPrecision,
            ChebyshevSegmentDays,
            ChebyshevNcoeffTime,
            ChebyshevNcoeffFreq,
            ChebyshevPhaseBuffer,
            AppendMustMatch,
            AppendChronological,
            AppendMaxOverlap,
            AppendMaxFrequencyDifference,
            LoggingLevel,
            LoggingFile,
        ]
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            TempoProgram | TempoScratchDir | TempoNspan | TempoNcoef | TempoMaxha | TempoSite
            | TempoFrequency | TempoVerify | TempoMaxAttempts => "tempo",
            PredictorBackend | PredictorFlexibility | PredictorPrecision => "predictor",
            ChebyshevSegmentDays | ChebyshevNcoeffTime | ChebyshevNcoeffFreq
            | ChebyshevPhaseBuffer => "chebyshev",
            AppendMustMatch | AppendChronological | AppendMaxOverlap
            | AppendMaxFrequencyDifference => "append",
            LoggingLevel | LoggingFile => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            TempoProgram => "program",
            TempoScratchDir => "scratch_dir",
            TempoNspan => "nspan",
            TempoNcoef => "ncoef",
            TempoMaxha => "maxha",
            TempoSite => "site",
            TempoFrequency => "frequency",
            TempoVerify => "verify",
            TempoMaxAttempts => "max_attempts",
            PredictorBackend => "backend",
            PredictorFlexibility => "flexibility",
            PredictorPrecision => "precision",
            ChebyshevSegmentDays => "segment_days",
            ChebyshevNcoeffTime => "ncoeff_time",
            ChebyshevNcoeffFreq => "ncoeff_freq",
            ChebyshevPhaseBuffer => "phase_buffer",
            AppendMustMatch => "must_match",
            AppendChronological => "chronological",
            AppendMaxOverlap => "max_overlap",
            AppendMaxFrequencyDifference => "max_frequency_difference",
            LoggingLevel => "level",
            LoggingFile => "file",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value rendered as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        match self {
            TempoProgram => config.tempo.program.display().to_string(),
            TempoScratchDir => path(&config.tempo.scratch_dir),
            TempoNspan => config.tempo.nspan.to_string(),
            TempoNcoef => config.tempo.ncoef.to_string(),
            TempoMaxha => config.tempo.maxha.to_string(),
            TempoSite => config.tempo.site.clone(),
            TempoFrequency => config.tempo.frequency.to_string(),
            TempoVerify => config.tempo.verify.to_string(),
            TempoMaxAttempts => config.tempo.max_attempts.to_string(),
            PredictorBackend => config.predictor.backend.to_string(),
            PredictorFlexibility => config.predictor.flexibility.to_string(),
            PredictorPrecision => config.predictor.precision.to_string(),
            ChebyshevSegmentDays => config.chebyshev.segment_days.to_string(),
            ChebyshevNcoeffTime => config.chebyshev.ncoeff_time.to_string(),
            ChebyshevNcoeffFreq => config.chebyshev.ncoeff_freq.to_string(),
            ChebyshevPhaseBuffer => config.chebyshev.phase_buffer.to_string(),
            AppendMustMatch => config.append.must_match.to_string(),
            AppendChronological => config.append.chronological.to_string(),
            AppendMaxOverlap => config.append.max_overlap.to_string(),
            AppendMaxFrequencyDifference => config.append.max_frequency_difference.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingFile => path(&config.logging.file),
        }
    }

    /// Parse and store `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let key = *self;
        match self {
            TempoProgram => config.tempo.program = PathBuf::from(value.trim()),
            TempoScratchDir => config.tempo.scratch_dir = optional_path(value),
            TempoNspan => config.tempo.nspan = parse_value(key, value)?,
            TempoNcoef => config.tempo.ncoef = parse_value(key, value)?,
            TempoMaxha => config.tempo.maxha = parse_value(key, value)?,
            TempoSite => config.tempo.site = value.trim().to_string(),
            TempoFrequency => config.tempo.frequency = parse_value(key, value)?,
            TempoVerify => config.tempo.verify = parse_bool(key, value)?,
            TempoMaxAttempts => config.tempo.max_attempts = parse_value(key, value)?,
            PredictorBackend => {
                config.predictor.backend = match value.trim().to_ascii_lowercase().as_str() {
                    "polyco" | "tempo" => PredictorKind::Polyco,
                    "chebyshev" | "tempo2" => PredictorKind::Chebyshev,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: key.name(),
                            value: value.to_string(),
                        })
                    }
                }
            }
            PredictorFlexibility => config.predictor.flexibility = parse_value(key, value)?,
            PredictorPrecision => config.predictor.precision = parse_value(key, value)?,
            ChebyshevSegmentDays => config.chebyshev.segment_days = parse_value(key, value)?,
            ChebyshevNcoeffTime => config.chebyshev.ncoeff_time = parse_value(key, value)?,
            ChebyshevNcoeffFreq => config.chebyshev.ncoeff_freq = parse_value(key, value)?,
            ChebyshevPhaseBuffer => config.chebyshev.phase_buffer = parse_value(key, value)?,
            AppendMustMatch => config.append.must_match = parse_bool(key, value)?,
            AppendChronological => config.append.chronological = parse_bool(key, value)?,
            AppendMaxOverlap => config.append.max_overlap = parse_value(key, value)?,
            AppendMaxFrequencyDifference => {
                config.append.max_frequency_difference = parse_value(key, value)?
            }
            LoggingLevel => config.logging.level = value.trim().to_string(),
            LoggingFile => config.logging.file = optional_path(value),
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .find(|key| key.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
