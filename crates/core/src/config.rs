//! Viewer configuration
//!
//! Every tunable of the viewer in one place. A configuration can be built in
//! code with the `with_*` setters, read from `STRIPVIEW_*` environment
//! variables, or loaded from a TOML file. [`ViewerConfig::validate`] rejects
//! bad values before any document is opened.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stripview_cache::{CACHE_SIZE, THUMBNAIL_CACHE_SIZE};
use stripview_render::{FitPolicy, LayoutOptions, RenderQuality, ScrollAxis, SpacingConfig, TILE_SIZE};

/// Default zoom levels.
pub const DEFAULT_MIN_ZOOM: f32 = 1.0;
pub const DEFAULT_MID_ZOOM: f32 = 2.0;
pub const DEFAULT_MAX_ZOOM: f32 = 2.0;

/// Errors that can occur while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("cannot read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Configuration for a [`Viewer`](crate::Viewer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Edge length of a rendered tile in pixels
    pub tile_size: f32,
    /// Tiles held across both cache generations
    pub cache_size: usize,
    /// Thumbnails held outside of printing
    pub thumbnail_cache_size: usize,
    /// Extra distance rendered beyond each viewport edge, in dp
    pub preload_offset_dp: f32,
    /// Pixels per dp
    pub display_density: f32,
    /// Thumbnail size relative to the page's layout size
    pub thumbnail_ratio: f32,
    /// Thumbnail size used when collecting pages for printing
    pub printing_thumbnail_ratio: f32,
    pub min_zoom: f32,
    pub mid_zoom: f32,
    pub max_zoom: f32,
    pub scroll_axis: ScrollAxis,
    pub fit_policy: FitPolicy,
    pub fit_each_page: bool,
    pub render_quality: RenderQuality,
    pub annotation_rendering: bool,
    pub page_snap: bool,
    /// Kept last so it serializes as a trailing TOML table
    pub spacing: SpacingConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            cache_size: CACHE_SIZE,
            thumbnail_cache_size: THUMBNAIL_CACHE_SIZE,
            preload_offset_dp: 20.0,
            display_density: 1.0,
            thumbnail_ratio: 0.3,
            printing_thumbnail_ratio: 0.75,
            min_zoom: DEFAULT_MIN_ZOOM,
            mid_zoom: DEFAULT_MID_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            scroll_axis: ScrollAxis::Vertical,
            fit_policy: FitPolicy::Width,
            fit_each_page: false,
            render_quality: RenderQuality::Fast,
            annotation_rendering: false,
            page_snap: false,
            spacing: SpacingConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn with_tile_size(mut self, tile_size: f32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Sets the tile and thumbnail cache capacities.
    pub fn with_cache_size(mut self, tiles: usize, thumbnails: usize) -> Self {
        self.cache_size = tiles;
        self.thumbnail_cache_size = thumbnails;
        self
    }

    /// Sets the preload margin in dp and the display density used to convert it.
    pub fn with_preload(mut self, offset_dp: f32, density: f32) -> Self {
        self.preload_offset_dp = offset_dp;
        self.display_density = density;
        self
    }

    pub fn with_thumbnail_ratio(mut self, ratio: f32) -> Self {
        self.thumbnail_ratio = ratio;
        self
    }

    pub fn with_printing_thumbnail_ratio(mut self, ratio: f32) -> Self {
        self.printing_thumbnail_ratio = ratio;
        self
    }

    /// Sets the minimum, middle and maximum zoom levels.
    pub fn with_zoom(mut self, min: f32, mid: f32, max: f32) -> Self {
        self.min_zoom = min;
        self.mid_zoom = mid;
        self.max_zoom = max;
        self
    }

    pub fn with_scroll_axis(mut self, axis: ScrollAxis) -> Self {
        self.scroll_axis = axis;
        self
    }

    pub fn with_fit_policy(mut self, policy: FitPolicy) -> Self {
        self.fit_policy = policy;
        self
    }

    pub fn with_fit_each_page(mut self, fit_each_page: bool) -> Self {
        self.fit_each_page = fit_each_page;
        self
    }

    pub fn with_spacing(mut self, spacing: SpacingConfig) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_render_quality(mut self, quality: RenderQuality) -> Self {
        self.render_quality = quality;
        self
    }

    pub fn with_annotation_rendering(mut self, enabled: bool) -> Self {
        self.annotation_rendering = enabled;
        self
    }

    pub fn with_page_snap(mut self, enabled: bool) -> Self {
        self.page_snap = enabled;
        self
    }

    /// Preload margin in pixels.
    pub fn preload_offset(&self) -> f32 {
        self.preload_offset_dp * self.display_density
    }

    /// Layout options derived from this configuration.
    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            axis: self.scroll_axis,
            fit_policy: self.fit_policy,
            fit_each_page: self.fit_each_page,
            spacing: self.spacing,
        }
    }

    /// Checks every value and reports the first one that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tile_size > 0.0) {
            return Err(ConfigError::invalid("tile_size", "must be positive"));
        }
        if self.cache_size == 0 {
            return Err(ConfigError::invalid("cache_size", "must be at least 1"));
        }
        if self.thumbnail_cache_size == 0 {
            return Err(ConfigError::invalid("thumbnail_cache_size", "must be at least 1"));
        }
        if !(self.preload_offset_dp >= 0.0) {
            return Err(ConfigError::invalid("preload_offset_dp", "must not be negative"));
        }
        if !(self.display_density > 0.0) {
            return Err(ConfigError::invalid("display_density", "must be positive"));
        }
        for (key, ratio) in [
            ("thumbnail_ratio", self.thumbnail_ratio),
            ("printing_thumbnail_ratio", self.printing_thumbnail_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::invalid(key, format!("{} is not in (0, 1]", ratio)));
            }
        }
        if !(self.min_zoom > 0.0) {
            return Err(ConfigError::invalid("min_zoom", "must be positive"));
        }
        if !(self.min_zoom <= self.mid_zoom && self.mid_zoom <= self.max_zoom) {
            return Err(ConfigError::invalid(
                "zoom",
                format!(
                    "levels must be ordered, got {} / {} / {}",
                    self.min_zoom, self.mid_zoom, self.max_zoom
                ),
            ));
        }
        let spacing = &self.spacing;
        for (key, value) in [
            ("spacing.page_separator", spacing.page_separator),
            ("spacing.start", spacing.start),
            ("spacing.end", spacing.end),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::invalid(key, "must not be negative"));
            }
        }
        Ok(())
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STRIPVIEW_TILE_SIZE`: tile edge in pixels (default: 256)
    /// - `STRIPVIEW_CACHE_SIZE`: cached tiles (default: 120)
    /// - `STRIPVIEW_THUMBNAIL_CACHE_SIZE`: cached thumbnails (default: 8)
    /// - `STRIPVIEW_PRELOAD_DP`: preload margin in dp (default: 20)
    /// - `STRIPVIEW_DENSITY`: pixels per dp (default: 1)
    /// - `STRIPVIEW_THUMBNAIL_RATIO`: thumbnail quality (default: 0.3)
    /// - `STRIPVIEW_BEST_QUALITY`: `true` for 32-bit tiles (default: false)
    ///
    /// # Errors
    /// Returns an error if any variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env_var("STRIPVIEW_TILE_SIZE")? {
            config.tile_size = value;
        }
        if let Some(value) = env_var("STRIPVIEW_CACHE_SIZE")? {
            config.cache_size = value;
        }
        if let Some(value) = env_var("STRIPVIEW_THUMBNAIL_CACHE_SIZE")? {
            config.thumbnail_cache_size = value;
        }
        if let Some(value) = env_var("STRIPVIEW_PRELOAD_DP")? {
            config.preload_offset_dp = value;
        }
        if let Some(value) = env_var("STRIPVIEW_DENSITY")? {
            config.display_density = value;
        }
        if let Some(value) = env_var("STRIPVIEW_THUMBNAIL_RATIO")? {
            config.thumbnail_ratio = value;
        }
        if let Some(best) = env_var::<bool>("STRIPVIEW_BEST_QUALITY")? {
            config.render_quality = if best {
                RenderQuality::Best
            } else {
                RenderQuality::Fast
            };
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Missing keys keep their defaults:
    /// ```toml
    /// cache_size = 64
    /// thumbnail_ratio = 0.5
    /// scroll_axis = "horizontal"
    ///
    /// [spacing]
    /// page_separator = 10.0
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string(self)
            .map_err(|e| ConfigError::invalid("config", e.to_string()))?;
        fs::write(path.as_ref(), contents)?;
        Ok(())
    }
}

fn env_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(name, format!("cannot parse {:?}", value))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: &[&str] = &[
        "STRIPVIEW_TILE_SIZE",
        "STRIPVIEW_CACHE_SIZE",
        "STRIPVIEW_THUMBNAIL_CACHE_SIZE",
        "STRIPVIEW_PRELOAD_DP",
        "STRIPVIEW_DENSITY",
        "STRIPVIEW_THUMBNAIL_RATIO",
        "STRIPVIEW_BEST_QUALITY",
    ];

    // Saves and restores environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in var_names {
                env::remove_var(name);
            }
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.tile_size, 256.0);
        assert_eq!(config.cache_size, 120);
        assert_eq!(config.thumbnail_cache_size, 8);
        assert_eq!(config.preload_offset(), 20.0);
        assert_eq!(config.thumbnail_ratio, 0.3);
        assert_eq!(config.printing_thumbnail_ratio, 0.75);
        assert_eq!((config.min_zoom, config.mid_zoom, config.max_zoom), (1.0, 2.0, 2.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ViewerConfig::default()
            .with_tile_size(128.0)
            .with_cache_size(32, 4)
            .with_preload(10.0, 3.0)
            .with_zoom(0.5, 1.0, 4.0)
            .with_scroll_axis(ScrollAxis::Horizontal)
            .with_fit_policy(FitPolicy::Both)
            .with_render_quality(RenderQuality::Best)
            .with_page_snap(true);

        assert_eq!(config.tile_size, 128.0);
        assert_eq!(config.cache_size, 32);
        assert_eq!(config.thumbnail_cache_size, 4);
        assert_eq!(config.preload_offset(), 30.0);
        assert_eq!(config.layout_options().axis, ScrollAxis::Horizontal);
        assert_eq!(config.layout_options().fit_policy, FitPolicy::Both);
        assert!(config.page_snap);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_thumbnail_ratio_is_rejected() {
        let err = ViewerConfig::default().with_thumbnail_ratio(0.0).validate().unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "thumbnail_ratio"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad = [
            ViewerConfig::default().with_tile_size(0.0),
            ViewerConfig::default().with_cache_size(0, 8),
            ViewerConfig::default().with_cache_size(10, 0),
            ViewerConfig::default().with_preload(20.0, 0.0),
            ViewerConfig::default().with_printing_thumbnail_ratio(1.5),
            ViewerConfig::default().with_zoom(0.0, 1.0, 2.0),
            ViewerConfig::default().with_zoom(1.0, 3.0, 2.0),
            ViewerConfig::default().with_tile_size(f32::NAN),
            ViewerConfig::default().with_spacing(SpacingConfig {
                page_separator: -1.0,
                ..SpacingConfig::default()
            }),
        ];
        for config in bad {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("STRIPVIEW_TILE_SIZE", "512");
        env::set_var("STRIPVIEW_CACHE_SIZE", "64");
        env::set_var("STRIPVIEW_DENSITY", "2.5");
        env::set_var("STRIPVIEW_BEST_QUALITY", "true");

        let config = ViewerConfig::from_env().unwrap();
        assert_eq!(config.tile_size, 512.0);
        assert_eq!(config.cache_size, 64);
        assert_eq!(config.thumbnail_cache_size, 8);
        assert_eq!(config.preload_offset(), 50.0);
        assert_eq!(config.render_quality, RenderQuality::Best);
    }

    #[test]
    #[serial]
    fn test_from_env_without_variables_is_default() {
        let _guard = EnvGuard::new(ENV_VARS);
        assert_eq!(ViewerConfig::from_env().unwrap(), ViewerConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("STRIPVIEW_CACHE_SIZE", "lots");
        match ViewerConfig::from_env() {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "STRIPVIEW_CACHE_SIZE"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
            # tuned for a tablet
            cache_size = 64
            thumbnail_ratio = 0.5
            scroll_axis = "horizontal"
            fit_policy = "both"

            [spacing]
            page_separator = 10.0
            auto_spacing = true
        "#;

        let config = ViewerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.cache_size, 64);
        assert_eq!(config.thumbnail_ratio, 0.5);
        assert_eq!(config.scroll_axis, ScrollAxis::Horizontal);
        assert_eq!(config.fit_policy, FitPolicy::Both);
        assert_eq!(config.spacing.page_separator, 10.0);
        assert!(config.spacing.auto_spacing);
        assert_eq!(config.spacing.start, 0.0);
        assert_eq!(config.tile_size, 256.0);
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let result = ViewerConfig::from_toml_str("cache_size = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_file_save_and_load() {
        let config_path = env::temp_dir().join("stripview_test_config.toml");

        let config = ViewerConfig::default()
            .with_cache_size(48, 6)
            .with_fit_policy(FitPolicy::Height)
            .with_annotation_rendering(true);
        config.save_to_file(&config_path).unwrap();

        let loaded = ViewerConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);

        let _ = fs::remove_file(config_path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ViewerConfig::from_file("/nonexistent/stripview.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
