//! Top-level error type for scheduler operations.

use thiserror::Error;

use crate::config::ConfigFileError;
use crate::coord::RegionId;
use crate::spiral::SpiralError;
use crate::store::StoreError;

/// Errors returned by [`Scheduler`](crate::scheduler::Scheduler) operations.
#[derive(Debug, Error)]
pub enum PregenError {
    /// The backend does not know the region.
    #[error("Region '{0}' does not exist")]
    UnknownRegion(RegionId),

    /// The region exists but does not accept background generation.
    #[error("Region '{0}' is not eligible for generation")]
    GenerationDisabled(RegionId),

    #[error("Region '{0}' already has an active generation task")]
    AlreadyActive(RegionId),

    #[error("Region '{0}' has no active generation task")]
    NotActive(RegionId),

    /// The requested traversal is invalid (e.g. a negative radius).
    #[error("Invalid generation area: {0}")]
    Spiral(#[from] SpiralError),

    #[error("Progress storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigFileError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_region() {
        let id = RegionId::new("minecraft:the_end");
        assert_eq!(
            PregenError::AlreadyActive(id.clone()).to_string(),
            "Region 'minecraft:the_end' already has an active generation task"
        );
        assert_eq!(
            PregenError::UnknownRegion(id).to_string(),
            "Region 'minecraft:the_end' does not exist"
        );
    }

    #[test]
    fn test_spiral_error_converts() {
        let err: PregenError = SpiralError::NegativeRadius(-1).into();
        assert!(matches!(err, PregenError::Spiral(_)));
    }
}
