// src/engine/core.rs

//! Pure input tracking.
//!
//! [`InputTracker`] remembers the last fingerprint of every input and turns
//! a new fingerprint into an [`InputReport`]. It has no channels, no Tokio
//! types and performs no IO, so it can be tested without a file system.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::{ConfigFile, InputConfig};
use crate::engine::{InputName, InputReport, InputStatus};
use crate::errors::{Result, VfsError};
use crate::fingerprint::{
    CollectingChangeVisitor, CurrentFileCollectionFingerprint, DirectorySensitivity,
    FingerprintHashingStrategy, FingerprintingStrategy, StrategyOptions, strategy_for,
};
use crate::snapshot::SnapshottingFilter;

/// Most changes listed per input and build.
pub const MAX_REPORTED_CHANGES: usize = 50;

/// One configured input, ready to be fingerprinted.
#[derive(Debug)]
pub struct TrackedInput {
    pub name: InputName,
    pub roots: Vec<PathBuf>,
    pub filter: SnapshottingFilter,
    pub strategy: Box<dyn FingerprintingStrategy>,
}

impl TrackedInput {
    pub fn from_config(name: &str, input: &InputConfig, cfg: &ConfigFile) -> Result<Self> {
        let filter = SnapshottingFilter::new(&input.include, &input.exclude)
            .map_err(|err| VfsError::ConfigError(format!("input '{name}': {err:#}")))?;
        let options = StrategyOptions {
            directory_sensitivity: if input.ignore_directories {
                DirectorySensitivity::IgnoreDirectories
            } else {
                DirectorySensitivity::Default
            },
            hashing: if input.ordered {
                FingerprintHashingStrategy::KeepOrder
            } else {
                FingerprintHashingStrategy::SortContents
            },
            include_missing: input.include_missing,
        };
        Ok(Self {
            name: name.to_string(),
            roots: cfg.input_roots(input),
            filter,
            strategy: strategy_for(input.normalizer, options),
        })
    }
}

#[derive(Debug, Default)]
pub struct InputTracker {
    inputs: Vec<TrackedInput>,
    previous: HashMap<InputName, CurrentFileCollectionFingerprint>,
}

impl InputTracker {
    pub fn new(inputs: Vec<TrackedInput>) -> Self {
        Self {
            inputs,
            previous: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let inputs = cfg
            .input
            .iter()
            .map(|(name, input)| TrackedInput::from_config(name, input, cfg))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(inputs))
    }

    pub fn inputs(&self) -> &[TrackedInput] {
        &self.inputs
    }

    /// Compare `current` with what `name` looked like last time and keep it
    /// for next time.
    pub fn record(&mut self, name: &str, current: CurrentFileCollectionFingerprint) -> InputReport {
        let status = match self.previous.get(name) {
            None => InputStatus::FirstBuild,
            Some(previous) => {
                let mut visitor = CollectingChangeVisitor::with_limit(MAX_REPORTED_CHANGES);
                current.visit_changes_since(previous, "Input", true, &mut visitor);
                if visitor.changes.is_empty() {
                    InputStatus::UpToDate
                } else {
                    InputStatus::Changed(visitor.changes)
                }
            }
        };
        let report = InputReport {
            input: name.to_string(),
            status,
            hash: Some(current.hash()),
            entries: current.fingerprints().len(),
        };
        self.previous.insert(name.to_string(), current);
        report
    }

    /// The input could not be fingerprinted. Its previous fingerprint is
    /// dropped, so the next successful build reports it as a first build.
    pub fn record_failure(&mut self, name: &str, reason: String) -> InputReport {
        self.previous.remove(name);
        InputReport {
            input: name.to_string(),
            status: InputStatus::Failed(reason),
            hash: None,
            entries: 0,
        }
    }
}
