//! Device position. Platforms without a provider simply pass none to the controller.

use async_trait::async_trait;

use crate::types::{Coordinates, LocationError};

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// A position fixed up front (e.g. from configuration).
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl GeolocationProvider for FixedPosition {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}
