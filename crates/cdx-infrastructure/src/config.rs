//! Layered application configuration.
//!
//! Values resolve in order: built-in defaults, then a TOML file, then
//! `CDX_`-prefixed environment variables (nested keys separated by `__`,
//! e.g. `CDX_INDEXING__BATCH_SIZE=25`).

use cdx_domain::config::IndexingConfig;
use cdx_domain::error::{Error, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Embedding provider selection and credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "null" or "openai"
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    /// Nominal dimensionality; the real value is probed at startup
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "null".to_string(),
            api_key: None,
            base_url: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 64,
        }
    }
}

/// Vector backend selection and credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// "in_memory" or "pinecone"
    pub provider: String,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub index_name: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: "in_memory".to_string(),
            api_url: None,
            api_key: None,
            index_name: "code-index".to_string(),
        }
    }
}

/// Tenant scope applied to every stored vector and query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TenantConfig {
    pub user: String,
    pub project: String,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            user: "default".to_string(),
            project: "default".to_string(),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub indexing: IndexingConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub tenant: TenantConfig,
}

impl AppConfig {
    /// Load from `cdx.toml` in the working directory plus environment.
    pub fn load() -> Result<Self> {
        Self::load_from("cdx.toml")
    }

    /// Load from an explicit TOML path plus environment.
    pub fn load_from(path: &str) -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CDX_").split("__"))
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        config.indexing.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_without_a_file() {
        let config = AppConfig::load_from("/nonexistent/cdx.toml").unwrap();
        assert_eq!(config.embedding.provider, "null");
        assert_eq!(config.indexing.batch_size, 50);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[indexing]\nbatch_size = 10\n\n[tenant]\nuser = \"alice\"\nproject = \"demo\"\n"
        )
        .unwrap();
        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.indexing.batch_size, 10);
        assert_eq!(config.tenant.user, "alice");
        // untouched sections keep their defaults
        assert_eq!(config.vector_store.index_name, "code-index");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[indexing]\nbatch_size = 0\n").unwrap();
        assert!(AppConfig::load_from(file.path().to_str().unwrap()).is_err());
    }
}
