use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::navigation::{GestureBindings, NavigationCommand};
use crate::profile::{self, DeviceClass, EnvironmentSignals, ProfileOverrides};

const DEFAULT_DEVICE: &str = "stub://front_camera";
const DEFAULT_CLASSIFIER: &str = "scripted";
const DEFAULT_MODEL_INPUT: u32 = 224;
const DEFAULT_GUIDE_STEPS: usize = 5;
const DEFAULT_READY_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize, Default)]
struct GestureNavConfigFile {
    device: Option<String>,
    classifier: Option<ClassifierConfigFile>,
    environment: Option<EnvironmentSignals>,
    profile: Option<ProfileOverrides>,
    bindings: Option<BTreeMap<String, NavigationCommand>>,
    guide: Option<GuideConfigFile>,
    ready_timeout_ms: Option<u64>,
    overlay_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    name: Option<String>,
    script_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    labels: Option<Vec<String>>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct GuideConfigFile {
    steps: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct GestureNavConfig {
    pub device: String,
    pub classifier: ClassifierSettings,
    pub environment: EnvironmentSignals,
    pub profile: ProfileOverrides,
    pub bindings: GestureBindings,
    pub guide_steps: usize,
    pub ready_timeout: Duration,
    pub overlay_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub name: String,
    pub script_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub labels: Vec<String>,
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for GestureNavConfig {
    fn default() -> Self {
        // Defaults always validate.
        Self::from_file(GestureNavConfigFile::default())
    }
}

impl GestureNavConfig {
    /// Load from the file named by `GESTURE_NAV_CONFIG`, if any.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("GESTURE_NAV_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file. Environment overrides still apply.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GestureNavConfigFile) -> Self {
        let device = file.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string());
        let classifier_file = file.classifier.unwrap_or_default();
        let classifier = ClassifierSettings {
            name: classifier_file
                .name
                .unwrap_or_else(|| DEFAULT_CLASSIFIER.to_string()),
            script_path: classifier_file.script_path,
            model_path: classifier_file.model_path,
            labels: classifier_file.labels.unwrap_or_default(),
            input_width: classifier_file.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: classifier_file.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
        };
        let bindings = match file.bindings {
            Some(bindings) => bindings.into_iter().collect(),
            None => GestureBindings::default(),
        };
        Self {
            device,
            classifier,
            environment: file.environment.unwrap_or_default(),
            profile: file.profile.unwrap_or_default(),
            bindings,
            guide_steps: file
                .guide
                .and_then(|guide| guide.steps)
                .unwrap_or(DEFAULT_GUIDE_STEPS),
            ready_timeout: Duration::from_millis(
                file.ready_timeout_ms.unwrap_or(DEFAULT_READY_TIMEOUT_MS),
            ),
            overlay_path: file.overlay_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("GESTURE_NAV_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device;
            }
        }
        if let Ok(name) = std::env::var("GESTURE_NAV_CLASSIFIER") {
            if !name.trim().is_empty() {
                self.classifier.name = name.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("GESTURE_NAV_SCRIPT") {
            if !path.trim().is_empty() {
                self.classifier.script_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(labels) = std::env::var("GESTURE_NAV_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.classifier.labels = parsed;
            }
        }
        if let Ok(class) = std::env::var("GESTURE_NAV_DEVICE_CLASS") {
            if !class.trim().is_empty() {
                self.profile.device_class = Some(DeviceClass::parse(&class)?);
            }
        }
        if let Ok(cooldown) = std::env::var("GESTURE_NAV_COOLDOWN_MS") {
            let cooldown_ms: u64 = cooldown.trim().parse().map_err(|_| {
                anyhow!("GESTURE_NAV_COOLDOWN_MS must be an integer number of milliseconds")
            })?;
            self.profile.cooldown_ms = Some(cooldown_ms);
        }
        if let Ok(confidence) = std::env::var("GESTURE_NAV_CONFIDENCE") {
            let threshold: f32 = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("GESTURE_NAV_CONFIDENCE must be a number between 0 and 1"))?;
            self.profile.confidence_threshold = Some(threshold);
        }
        if let Ok(steps) = std::env::var("GESTURE_NAV_STEPS") {
            self.guide_steps = steps
                .trim()
                .parse()
                .map_err(|_| anyhow!("GESTURE_NAV_STEPS must be a positive integer"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.device = self.device.trim().to_string();
        if self.device.is_empty() {
            return Err(anyhow!("device must not be empty"));
        }
        if self.classifier.name.is_empty() {
            return Err(anyhow!("classifier name must not be empty"));
        }
        if self.classifier.name == "tract" {
            if self.classifier.model_path.is_none() {
                return Err(anyhow!("classifier 'tract' needs a model_path"));
            }
            if self.classifier.labels.is_empty() {
                return Err(anyhow!("classifier 'tract' needs at least one label"));
            }
        }
        if self.classifier.input_width == 0 || self.classifier.input_height == 0 {
            return Err(anyhow!("classifier input size must be non-zero"));
        }
        if self.guide_steps == 0 {
            return Err(anyhow!("guide must have at least one step"));
        }
        if self.ready_timeout.is_zero() {
            return Err(anyhow!("ready timeout must be greater than zero"));
        }
        profile::resolve(&self.environment, &self.profile)?;
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<GestureNavConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
