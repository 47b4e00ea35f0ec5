use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use waterfallcore::engine::EngineConfig;

/// Where scan batches come from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Synthetic(GeneratorConfig),
    Replay {
        path: PathBuf,
        #[serde(default = "default_sample_rate")]
        sample_rate: f64,
        #[serde(default = "default_nfft")]
        nfft: usize,
    },
}

fn default_sample_rate() -> f64 {
    1e6
}

fn default_nfft() -> usize {
    256
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Synthetic(GeneratorConfig::default())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub engine: EngineConfig,
    pub source: SourceConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_parts(engine: EngineConfig, source: SourceConfig) -> Self {
        Self { engine, source }
    }
}
