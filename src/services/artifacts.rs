use std::path::{Path, PathBuf};

use crate::error::{HarnessError, HarnessResult};

const SIERRA_SUFFIX: &str = "contract_class.json";
const CASM_SUFFIX: &str = "compiled_contract_class.json";

/// Compiled contract class as produced by `scarb build`.
///
/// Both files are kept as raw JSON; the gateway parses them into the
/// provider's class types when declaring.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub sierra: String,
    pub casm: String,
}

impl ContractArtifact {
    pub fn sierra_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.{SIERRA_SUFFIX}"))
    }

    pub fn casm_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.{CASM_SUFFIX}"))
    }

    /// Load `<name>.contract_class.json` and `<name>.compiled_contract_class.json`
    /// from `dir`.
    pub fn load(dir: &Path, name: &str) -> HarnessResult<Self> {
        let sierra = read_json(&Self::sierra_path(dir, name))?;
        let casm = read_json(&Self::casm_path(dir, name))?;
        tracing::debug!("Loaded contract artifact {} from {}", name, dir.display());
        Ok(Self {
            name: name.to_string(),
            sierra,
            casm,
        })
    }
}

fn read_json(path: &Path) -> HarnessResult<String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| HarnessError::Artifact(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str::<serde_json::Value>(&raw)
        .map_err(|e| HarnessError::Artifact(format!("{} is not valid JSON: {e}", path.display())))?;
    Ok(raw)
}
