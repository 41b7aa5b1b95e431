pub mod chat;
pub mod prompt;
pub mod provider;

use anyhow::Result;
use std::collections::BTreeMap;

use crate::error::LensError;
use crate::lens::config::OracleConfig;
use crate::oracle::chat::{ChatBackend, backend_for};

/// The external text-classification capability. Implementations return raw,
/// untrusted answers; callers enforce totality.
pub trait ClassificationOracle {
    fn propose(&self, labels: &[String], count: usize) -> Result<Vec<String>>;
    fn map_labels(
        &self,
        categories: &[String],
        labels: &[String],
    ) -> Result<BTreeMap<String, String>>;
    fn describe(&self) -> String;
}

impl<T: ClassificationOracle + ?Sized> ClassificationOracle for Box<T> {
    fn propose(&self, labels: &[String], count: usize) -> Result<Vec<String>> {
        (**self).propose(labels, count)
    }

    fn map_labels(
        &self,
        categories: &[String],
        labels: &[String],
    ) -> Result<BTreeMap<String, String>> {
        (**self).map_labels(categories, labels)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

pub struct RemoteOracle {
    backend: Box<dyn ChatBackend>,
}

impl RemoteOracle {
    pub fn new(backend: Box<dyn ChatBackend>) -> Self {
        Self { backend }
    }
}

impl ClassificationOracle for RemoteOracle {
    fn propose(&self, labels: &[String], count: usize) -> Result<Vec<String>> {
        let user = prompt::propose_user_prompt(labels, count);
        let raw = self.backend.complete_json(prompt::PROPOSE_SYSTEM, &user)?;
        prompt::parse_categories(&raw, count)
    }

    fn map_labels(
        &self,
        categories: &[String],
        labels: &[String],
    ) -> Result<BTreeMap<String, String>> {
        let user = prompt::mapping_user_prompt(categories, labels);
        let raw = self.backend.complete_json(prompt::MAPPING_SYSTEM, &user)?;
        prompt::parse_mapping(&raw)
    }

    fn describe(&self) -> String {
        self.backend.label()
    }
}

/// Build the configured oracle, or explain why classification is unavailable.
pub fn build_oracle(cfg: &OracleConfig) -> Result<Box<dyn ClassificationOracle>, LensError> {
    let remote = provider::resolve_from_env(cfg)?;
    log::info!(
        "classification oracle: {}:{}",
        remote.provider.label(),
        remote.model
    );
    Ok(Box::new(RemoteOracle::new(backend_for(&remote))))
}
