//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (`__` separates nesting levels,
//! e.g. `APP_EMBEDDING__CHUNK_SIZE=64`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Build from an inline TOML document layered over the defaults.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::string(toml));
        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if settings.embedding.chunk_size == 0 {
            anyhow::bail!("embedding.chunk_size must be at least 1");
        }
        match env {
            "prod" | "production" => {
                if settings.storage.backend == "http" && settings.storage.http_base_url.is_none() {
                    anyhow::bail!("storage.http_base_url is required for the http backend");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub catalog: CatalogSettings,
    pub embedding: EmbeddingSettings,
    pub projection: ProjectionSettings,
    pub viz: VizSettings,
    pub output: OutputSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `local` or `http`.
    pub backend: String,
    pub local_root: String,
    pub http_base_url: Option<String>,
    pub corpus_key: String,
    pub papers_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            local_root: "data/01_raw".to_string(),
            http_base_url: None,
            corpus_key: "downloaded_papers.csv".to_string(),
            papers_prefix: "papers".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub base_url: String,
    pub categories: Vec<String>,
    /// Page whose `/list/<code>` links name the catalog's categories.
    pub categories_url: String,
    /// Replace `categories` with the codes scraped from `categories_url`.
    pub discover_categories: bool,
    pub max_results_per_category: usize,
    pub max_categories: usize,
    pub timeout_secs: u64,
    pub request_interval_ms: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: "https://export.arxiv.org/api/query".to_string(),
            categories: ["cs.CV", "cs.LG", "cs.CL", "cs.AI", "stat.ML", "math.CO", "quant-ph", "astro-ph.GA", "q-bio.NC", "econ.EM"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            categories_url: "https://arxiv.org/".to_string(),
            discover_categories: false,
            max_results_per_category: 100,
            max_categories: 10,
            timeout_secs: 30,
            request_interval_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub chunk_size: usize,
    /// `title_summary` or `full_text`.
    pub input: String,
    pub checkpoint_dir: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, chunk_size: 500, input: "title_summary".to_string(), checkpoint_dir: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionSettings {
    /// `standard`, `minmax` or `l2`.
    pub normalization: String,
    /// `pca`, `umap` or `pca_umap`.
    pub method: String,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    /// `cosine`, `euclidean` or `manhattan`.
    pub metric: String,
    pub n_epochs: Option<usize>,
    pub random_state: u64,
    pub pca_components: usize,
    pub whiten: bool,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            normalization: "standard".to_string(),
            method: "umap".to_string(),
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            metric: "cosine".to_string(),
            n_epochs: None,
            random_state: 42,
            pca_components: 50,
            whiten: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VizSettings {
    pub detail_fields: Vec<String>,
    pub summary_max_length: usize,
    pub calculate_bounds: bool,
    pub add_statistics: bool,
    pub top_categories: usize,
    /// `warn` or `strict`.
    pub verify_policy: String,
}

impl Default for VizSettings {
    fn default() -> Self {
        Self {
            detail_fields: ["title", "authors", "summary", "year_published", "primary_category", "categories"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            summary_max_length: 200,
            calculate_bounds: true,
            add_statistics: true,
            top_categories: 10,
            verify_policy: "warn".to_string(),
        }
    }
}

/// Local files exchanged between stages when they run separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: String,
    pub embeddings_file: String,
    pub reduced_file: String,
    pub payload_file: String,
    pub colors_file: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: "data/03_primary".to_string(),
            embeddings_file: "arxiv_embeddings.json".to_string(),
            reduced_file: "reduced_embeddings.json".to_string(),
            payload_file: "articles_visualization.json".to_string(),
            colors_file: "category_colors.json".to_string(),
        }
    }
}

impl OutputSettings {
    pub fn path(&self, file: &str) -> PathBuf {
        expand_path(&self.dir).join(file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Defaults to `output.dir/output.payload_file` when unset.
    pub payload_path: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8000".to_string(), payload_path: None }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
