use thiserror::Error;

/// Failures the engine reports to its caller.
///
/// Degenerate mutation candidates are retried internally and never surface
/// here; this type covers configuration rejected before a step begins and
/// buffers that enter the engine with the wrong geometry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid shape configuration: {0}")]
    InvalidShapeConfig(String),

    #[error("raster dimension mismatch: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h}")]
    DimensionMismatch {
        expected_w: i32,
        expected_h: i32,
        actual_w: i32,
        actual_h: i32,
    },
}
