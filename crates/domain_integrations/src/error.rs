//! Integration errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors raised at the boundary with external systems
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The named gateway is not configured
    #[error("Payment gateway not configured: {0}")]
    GatewayNotConfigured(String),

    #[error(transparent)]
    Port(#[from] PortError),
}
