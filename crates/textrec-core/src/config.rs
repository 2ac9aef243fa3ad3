//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml`, the bare
//! environment keys of a deployment (`MAX_FEATURES`, `N_TREES`, ...) and
//! finally `APP_*` env vars. Configured paths get `~` and `${VAR}` expansion.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::Metric;

/// Bare environment keys understood without the `APP_` prefix.
pub const RAW_ENV_KEYS: &[&str] = &[
    "MAX_FEATURES",
    "N_COMPONENTS",
    "N_TREES",
    "METRIC",
    "TEXT_DATA_PATH",
    "MODELS_DIR",
    "SEARCH_K",
    "HOST",
    "PORT",
    "HOT_RELOAD",
];

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Ok(Self::from_figment(Self::figment_for_env(&env_name)))
    }

    pub fn figment_for_env(env_name: &str) -> Figment {
        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment
            .merge(Env::raw().only(RAW_ENV_KEYS))
            .merge(Env::prefixed("APP_"))
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::config(format!("Failed to get '{key}': {e}")))
    }

    pub fn build_settings(&self) -> Result<BuildSettings> {
        let settings: BuildSettings = Figment::from(Serialized::defaults(BuildSettings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        settings.validated()
    }

    pub fn serve_settings(&self) -> Result<ServeSettings> {
        let settings: ServeSettings = Figment::from(Serialized::defaults(ServeSettings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        settings.validated()
    }
}

/// Offline build parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Vocabulary cap for the TF-IDF vectorizer.
    pub max_features: usize,
    /// Requested reduced dimensionality (clamped to vocabulary size - 1).
    pub n_components: usize,
    /// Number of random-projection trees in the ANN forest.
    pub n_trees: usize,
    #[serde(deserialize_with = "deserialize_metric")]
    pub metric: Metric,
    pub text_data_path: PathBuf,
    /// Replaced as a whole on every publish; it must hold only artifact set
    /// files, otherwise the build refuses to publish.
    pub models_dir: PathBuf,
    /// Seed for the reducer's test matrix and the forest's splits.
    pub seed: u64,
    /// Maximum number of items held by an ANN leaf.
    pub leaf_size: usize,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            max_features: 2000,
            n_components: 50,
            n_trees: 20,
            metric: Metric::Angular,
            text_data_path: PathBuf::from("data/sample_posts.csv"),
            models_dir: PathBuf::from("models"),
            seed: 42,
            leaf_size: 32,
        }
    }
}

impl BuildSettings {
    pub fn validated(mut self) -> Result<Self> {
        if self.max_features == 0 { return Err(Error::config("max_features must be >= 1")); }
        if self.n_components == 0 { return Err(Error::config("n_components must be >= 1")); }
        if self.n_trees == 0 { return Err(Error::config("n_trees must be >= 1")); }
        if self.leaf_size < 2 { return Err(Error::config("leaf_size must be >= 2")); }
        self.text_data_path = expand_path(self.text_data_path.to_string_lossy());
        self.models_dir = expand_path(self.models_dir.to_string_lossy());
        Ok(self)
    }
}

/// Query-time service parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServeSettings {
    pub host: String,
    pub port: u16,
    pub models_dir: PathBuf,
    pub text_data_path: PathBuf,
    /// Candidate budget per query; `None` means `top_k * n_trees`.
    pub search_k: Option<usize>,
    /// Re-check the manifest on every request and reload on a new build.
    pub hot_reload: bool,
    pub default_top_k: usize,
    pub max_top_k: usize,
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            models_dir: PathBuf::from("models"),
            text_data_path: PathBuf::from("data/sample_posts.csv"),
            search_k: None,
            hot_reload: false,
            default_top_k: 5,
            max_top_k: 100,
        }
    }
}

impl ServeSettings {
    pub fn validated(mut self) -> Result<Self> {
        if self.max_top_k == 0 { return Err(Error::config("max_top_k must be >= 1")); }
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(Error::config(format!("default_top_k must be in [1, {}]", self.max_top_k)));
        }
        if self.search_k == Some(0) { return Err(Error::config("search_k must be >= 1 when set")); }
        self.text_data_path = expand_path(self.text_data_path.to_string_lossy());
        self.models_dir = expand_path(self.models_dir.to_string_lossy());
        Ok(self)
    }
}

fn deserialize_metric<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Metric, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// `~` and `${VAR}`/`$VAR` expansion for configured paths. Unknown variables
/// leave the string as written; nothing is canonicalized.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    let with_vars = shellexpand::env(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    PathBuf::from(shellexpand::tilde(&with_vars).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let cfg = Config::from_figment(Config::figment_for_env("dev"));
            let build = cfg.build_settings().expect("build settings");
            assert_eq!(build, BuildSettings::default());
            let serve = cfg.serve_settings().expect("serve settings");
            assert_eq!(serve.default_top_k, 5);
            assert_eq!(serve.max_top_k, 100);
            Ok(())
        });
    }

    #[test]
    fn raw_env_keys_and_prefixed_override_files() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "n_trees = 5\nmetric = \"euclidean\"\nmax_features = 10\n")?;
            jail.create_file("config.dev.toml", "max_features = 300\n")?;
            jail.set_env("N_COMPONENTS", "7");
            jail.set_env("METRIC", "Cosine");
            jail.set_env("APP_N_TREES", "9");
            let build = Config::from_figment(Config::figment_for_env("dev")).build_settings().expect("build");
            assert_eq!(build.max_features, 300);
            assert_eq!(build.n_components, 7);
            assert_eq!(build.n_trees, 9);
            assert_eq!(build.metric, Metric::Angular);
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_config_errors() {
        Jail::expect_with(|jail| {
            jail.set_env("N_TREES", "0");
            let err = Config::from_figment(Config::figment_for_env("dev")).build_settings().unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{err}");
            jail.set_env("N_TREES", "3");
            jail.set_env("METRIC", "hamming");
            let err = Config::from_figment(Config::figment_for_env("dev")).build_settings().unwrap_err();
            assert!(err.to_string().contains("hamming"), "{err}");
            Ok(())
        });
    }

    #[test]
    fn paths_expand_variables() {
        Jail::expect_with(|jail| {
            jail.set_env("TEXTREC_DATA", "/srv/data");
            jail.set_env("MODELS_DIR", "${TEXTREC_DATA}/models");
            let build = Config::from_figment(Config::figment_for_env("dev")).build_settings().expect("build");
            assert_eq!(build.models_dir, PathBuf::from("/srv/data/models"));
            assert_eq!(expand_path("plain/dir"), PathBuf::from("plain/dir"));
            Ok(())
        });
    }
}
