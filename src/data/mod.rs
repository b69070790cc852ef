/// Data ingestion: telemetry parsing, the CSV cache and the in-memory dataset
pub mod cache;
pub mod dataset;
pub mod table;
pub mod telemetry;

pub use cache::TelemetryCache;
pub use dataset::Dataset;
pub use telemetry::TelemetryParser;

use std::path::Path;

/// Number of controllable joints
pub const NUM_JOINTS: usize = 6;

/// Feature width: positions of all joints followed by their velocities
pub const FEATURE_DIM: usize = 2 * NUM_JOINTS;

/// Label width: one effort per joint
pub const LABEL_DIM: usize = NUM_JOINTS;

/// Load the dataset from `cache`, or parse `log_path` and write the cache
/// through when it is missing.
pub fn load_or_parse<P: AsRef<Path>>(
    log_path: P,
    channel: &str,
    cache: &TelemetryCache,
) -> crate::Result<Dataset> {
    if let Some(dataset) = cache.load()? {
        log::info!(
            "Loaded {} cached samples from {:?}",
            dataset.len(),
            cache.dir()
        );
        return Ok(dataset);
    }

    log::info!("No usable cache in {:?}, parsing telemetry log", cache.dir());
    TelemetryParser::new(channel).parse_and_cache(log_path, cache)
}
