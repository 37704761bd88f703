//! Engine configuration.

use std::time::Duration;

/// Paging bounds for one fetch run.
#[derive(Debug, Clone, Copy)]
pub struct FetchBounds {
    /// Message ids requested per search page.
    pub batch_size: u32,
    /// Hard cap on pages scanned per run. The engine's only explicit
    /// backpressure mechanism.
    pub max_pages: u32,
}

impl FetchBounds {
    /// Bounds for scheduled full scans.
    pub const SCAN: Self = Self {
        batch_size: 500,
        max_pages: 300,
    };

    /// Bounds for interactive previews — few pages, fast answer.
    pub const PREVIEW: Self = Self {
        batch_size: 500,
        max_pages: 3,
    };
}

/// Engine configuration, applied in one place.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the settings JSON file.
    pub settings_path: String,
    /// Paging bounds for scheduled scans.
    pub scan_bounds: FetchBounds,
    /// Interval between scheduled full scans.
    pub scan_interval: Duration,
    /// Items shown by an interactive preview.
    pub preview_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings_path: "./data/order-sift.json".to_string(),
            scan_bounds: FetchBounds::SCAN,
            scan_interval: Duration::from_secs(3600), // 1 hour
            preview_limit: 5,
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let settings_path =
            std::env::var("ORDER_SIFT_SETTINGS").unwrap_or(defaults.settings_path);

        let batch_size: u32 = std::env::var("ORDER_SIFT_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.scan_bounds.batch_size);

        let max_pages: u32 = std::env::var("ORDER_SIFT_MAX_PAGES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.scan_bounds.max_pages);

        let scan_interval_secs: u64 = std::env::var("ORDER_SIFT_SCAN_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.scan_interval.as_secs());

        Self {
            settings_path,
            scan_bounds: FetchBounds {
                batch_size: batch_size.max(1),
                max_pages: max_pages.max(1),
            },
            scan_interval: Duration::from_secs(scan_interval_secs),
            preview_limit: defaults.preview_limit,
        }
    }
}
