//! Compatibility checking entry points
//!
//! Ties the pipeline together: load or accept each side's declaration
//! trees, merge them into Documents, compare, and wrap the verdict with the
//! documents' fingerprints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checksum::Checksum;
use crate::compare::compare;
use crate::config::{CompareMode, CompatConfig, Policy};
use crate::error::{CompatError, Result};
use crate::loader::SourceSet;
use crate::merge::merge;
use crate::model::{Document, FileTree};
use crate::report::{Context, Verdict, Violation};
use crate::version::{Bump, SchemaVersion};

/// Result of a compatibility check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub verdict: Verdict,
    /// Fingerprint of the old side
    pub old_checksum: Checksum,
    /// Fingerprint of the new side
    pub new_checksum: Checksum,
}

impl CompatibilityResult {
    pub fn is_compatible(&self) -> bool {
        self.verdict.is_compatible()
    }

    /// Failure message, `None` when compatible
    pub fn message(&self) -> Option<String> {
        self.verdict.message()
    }

    /// Smallest version bump that describes the change
    pub fn suggested_bump(&self) -> Bump {
        if !self.is_compatible() {
            Bump::Major
        } else if self.old_checksum == self.new_checksum {
            Bump::Patch
        } else {
            Bump::Minor
        }
    }

    /// Reject publishing an incompatible change without a major bump
    pub fn validate_release(&self, old: &SchemaVersion, new: &SchemaVersion) -> Result<()> {
        match self.verdict.incompatibility() {
            Some(reason) if !new.is_major_bump_from(old) => Err(CompatError::UnderstatedBump {
                old: old.to_string(),
                new: new.to_string(),
                reason: reason.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Compatibility checker for schema versions
#[derive(Debug, Clone, Default)]
pub struct CompatibilityChecker {
    policy: Policy,
    mode: CompareMode,
}

impl CompatibilityChecker {
    /// Create a checker with the default policy
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: Policy) -> Self {
        Self {
            policy,
            mode: CompareMode::default(),
        }
    }

    pub fn from_config(config: &CompatConfig) -> Self {
        Self {
            policy: config.policy.clone(),
            mode: config.input.mode,
        }
    }

    /// Compare files pairwise instead of merging each side
    pub fn per_file(mut self) -> Self {
        self.mode = CompareMode::PerFile;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Check two already-merged documents
    pub fn check_documents(&self, old: &Document, new: &Document) -> CompatibilityResult {
        let old_checksum = Checksum::of(old);
        let new_checksum = Checksum::of(new);

        let verdict = if old_checksum == new_checksum {
            debug!(checksum = old_checksum.short(), "documents are identical");
            Verdict::Compatible
        } else {
            compare(&self.policy, old, new)
        };

        log_verdict(&verdict);
        CompatibilityResult {
            verdict,
            old_checksum,
            new_checksum,
        }
    }

    /// Check two sets of parsed files
    pub fn check(&self, old: Vec<FileTree>, new: Vec<FileTree>) -> Result<CompatibilityResult> {
        match self.mode {
            CompareMode::Merged => {
                let old = merge(old)?;
                let new = merge(new)?;
                Ok(self.check_documents(&old, &new))
            }
            CompareMode::PerFile => self.check_per_file(old, new),
        }
    }

    /// Load both sides from disk and check them
    pub fn check_sources(&self, old: &SourceSet, new: &SourceSet) -> Result<CompatibilityResult> {
        let old = old.load()?;
        let new = new.load()?;
        self.check(old, new)
    }

    /// Pair files by base name; each pair is its own Document
    fn check_per_file(&self, old: Vec<FileTree>, new: Vec<FileTree>) -> Result<CompatibilityResult> {
        let old = by_file_name(old)?;
        let mut new = by_file_name(new)?;

        let old_checksum = Checksum::of(&old);
        let new_checksum = Checksum::of(&new);

        let mut verdict = Verdict::Compatible;
        for (file, old_doc) in &old {
            let Some(new_doc) = new.remove(file) else {
                verdict = Verdict::Incompatible(Violation::FileRemoved { name: file.clone() }.into());
                break;
            };

            if let Verdict::Incompatible(reason) = compare(&self.policy, old_doc, &new_doc) {
                verdict = Verdict::Incompatible(reason.within(Context::File { name: file.clone() }));
                break;
            }
        }

        log_verdict(&verdict);
        Ok(CompatibilityResult {
            verdict,
            old_checksum,
            new_checksum,
        })
    }
}

fn by_file_name(trees: Vec<FileTree>) -> Result<BTreeMap<String, Document>> {
    let mut documents = BTreeMap::new();
    for tree in trees {
        let name = tree.file_name().to_string();
        if documents.contains_key(&name) {
            warn!(file = %tree.path, "file name already seen on this side, later file wins");
        }
        documents.insert(name, merge(std::iter::once(tree))?);
    }
    Ok(documents)
}

fn log_verdict(verdict: &Verdict) {
    match verdict.incompatibility() {
        None => info!("schemas are backward compatible"),
        Some(reason) => info!(reason = %reason, "schemas are not backward compatible"),
    }
}

/// Convenience for callers holding a config: load both sides and check
pub fn check_configured(config: &CompatConfig) -> Result<CompatibilityResult> {
    let old = config.input.old_sources()?;
    let new = config.input.new_sources()?;
    CompatibilityChecker::from_config(config).check_sources(&old, &new)
}
