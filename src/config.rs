use serde::{Deserialize, Serialize};

/// Main configuration structure loaded from presta_match.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub matching: MatchingConfig,
    pub embedding: EmbeddingSection,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Matching behavior: result sizing, thresholds, filters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    pub top_k: usize,
    pub threshold: f32,
    pub apply_domain_filter: bool,
    /// Default geographic impact level (0, 1 or 2) for requests that carry none
    pub default_impact_geo: u8,
}

/// Embedding backend section of the TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingSection {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub retries: u32,
    pub batch_size: usize,
}

/// Embedding configuration snapshot for use across components
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub retries: u32,
    pub strict: bool,
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: String,
    /// Capacity of the request-embedding LRU cache
    pub cache_max: usize,
    pub embed_strict: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "presta_match=info".to_string(),
            cache_max: 512,
            embed_strict: false,
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "presta_match=info".to_string()),
            cache_max: std::env::var("PRESTA_CACHE_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(512),
            embed_strict: std::env::var("PRESTA_EMBED_STRICT")
                .ok()
                .is_some_and(|v| v == "true" || v == "1"),
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses PRESTA_MATCH_CONFIG environment variable or defaults to "presta_match.toml"
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("PRESTA_MATCH_CONFIG")
            .unwrap_or_else(|_| "presta_match.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        // Apply env overrides (env-first)
        if let Ok(provider) = std::env::var("PRESTA_EMBED_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var("PRESTA_EMBED_MODEL")
            && !model.trim().is_empty()
        {
            config.embedding.model = model;
        }
        if let Some(dims) = std::env::var("PRESTA_EMBED_DIM")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.embedding.dimensions = dims;
        }
        if let Some(top_k) = std::env::var("PRESTA_TOP_K")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.matching.top_k = top_k;
        }
        if let Some(threshold) = std::env::var("PRESTA_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.matching.threshold = threshold;
        }

        config.runtime = RuntimeConfig::load_from_env();

        // Validate configuration

        if config.embedding.retries == 0 {
            config.embedding.retries = 1;
        } else if config.embedding.retries > 10 {
            tracing::warn!(
                "embedding retries {} exceeds max 10, clamping to 10",
                config.embedding.retries
            );
            config.embedding.retries = 10;
        }

        if config.embedding.batch_size == 0 {
            config.embedding.batch_size = 32;
        }

        if config.matching.top_k == 0 {
            tracing::warn!("top_k 0 is invalid, using 3");
            config.matching.top_k = 3;
        }

        if !(0.0..=1.0).contains(&config.matching.threshold) {
            tracing::warn!(
                "threshold {} outside [0,1], clamping",
                config.matching.threshold
            );
            config.matching.threshold = config.matching.threshold.clamp(0.0, 1.0);
        }

        if config.matching.default_impact_geo > 2 {
            tracing::warn!(
                "default_impact_geo {} outside 0..=2, using 1",
                config.matching.default_impact_geo
            );
            config.matching.default_impact_geo = 1;
        }

        // Validate provider/dimension coherence
        match config.embedding.provider.as_str() {
            "openai" => match config.embedding.model.as_str() {
                "text-embedding-3-small" => {
                    if config.embedding.dimensions > 1536 {
                        tracing::warn!(
                            "text-embedding-3-small supports at most 1536 dimensions, got {}",
                            config.embedding.dimensions
                        );
                    }
                }
                "text-embedding-3-large" => {
                    if config.embedding.dimensions > 3072 {
                        tracing::warn!(
                            "text-embedding-3-large supports at most 3072 dimensions, got {}",
                            config.embedding.dimensions
                        );
                    }
                }
                _ => tracing::warn!(
                    "Unknown OpenAI embedding model '{}', dimension validation skipped",
                    config.embedding.model
                ),
            },
            "fake" | "auto" => {}
            other => tracing::warn!("Unknown embedding provider '{}', validation skipped", other),
        }

        Ok(config)
    }

    /// Convenience: snapshot embedding configuration
    pub fn embedding(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: self.embedding.provider.clone(),
            model: self.embedding.model.clone(),
            dimensions: self.embedding.dimensions,
            retries: self.embedding.retries,
            strict: self.runtime.embed_strict,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matching: MatchingConfig {
                top_k: 3,
                threshold: 0.25,
                apply_domain_filter: true,
                default_impact_geo: 1,
            },
            embedding: EmbeddingSection {
                provider: "auto".to_string(),
                model: "text-embedding-3-small".to_string(),
                dimensions: 1536,
                retries: 3,
                batch_size: 32,
            },
            runtime: RuntimeConfig::default(),
        }
    }
}
