use std::str::FromStr;
use serde::Deserialize;

/// Whether (and how eagerly) file system watching is used between builds.
///
/// - `Enabled`: watch every registered hierarchy, even on file systems that
///   were not detected as supported.
/// - `Default`: watch, but skip hierarchies on file systems detected as
///   unsupported (network drives and similar).
/// - `Disabled`: never watch; all retained state is dropped at every build
///   boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Enabled,
    Default,
    Disabled,
}

impl WatchMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, WatchMode::Disabled)
    }
}

impl Default for WatchMode {
    fn default() -> Self {
        WatchMode::Default
    }
}

impl FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enabled" => Ok(WatchMode::Enabled),
            "default" => Ok(WatchMode::Default),
            "disabled" => Ok(WatchMode::Disabled),
            other => Err(format!(
                "invalid watch_mode: {other} (expected \"enabled\", \"default\" or \"disabled\")"
            )),
        }
    }
}

/// Which watch-set algorithm to use.
///
/// `Auto` picks the one matching the platform's native watch API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStrategySetting {
    Auto,
    Hierarchical,
    NonHierarchical,
}

impl Default for WatchStrategySetting {
    fn default() -> Self {
        WatchStrategySetting::Auto
    }
}

impl FromStr for WatchStrategySetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(WatchStrategySetting::Auto),
            "hierarchical" => Ok(WatchStrategySetting::Hierarchical),
            "non_hierarchical" => Ok(WatchStrategySetting::NonHierarchical),
            other => Err(format!(
                "invalid watch_strategy: {other} (expected \"auto\", \"hierarchical\" or \"non_hierarchical\")"
            )),
        }
    }
}

/// Path normalization applied when fingerprinting an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    Absolute,
    Relative,
    NameOnly,
    Ignored,
}

impl Default for NormalizerKind {
    fn default() -> Self {
        NormalizerKind::Relative
    }
}

impl FromStr for NormalizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "absolute" => Ok(NormalizerKind::Absolute),
            "relative" => Ok(NormalizerKind::Relative),
            "name_only" => Ok(NormalizerKind::NameOnly),
            "ignored" => Ok(NormalizerKind::Ignored),
            other => Err(format!(
                "invalid normalizer: {other} (expected \"absolute\", \"relative\", \"name_only\" or \"ignored\")"
            )),
        }
    }
}

/// How chatty the VFS is about retained state at build boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VfsLogging {
    Normal,
    Verbose,
}

impl Default for VfsLogging {
    fn default() -> Self {
        VfsLogging::Normal
    }
}
