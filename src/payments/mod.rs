//! Payment gateway integration
//!
//! The order model stores major currency units; everything in this module
//! that crosses the wire to the provider is in minor units.

pub mod error;
pub mod provider;
pub mod providers;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentGateway;
pub use utils::{from_minor_units, to_minor_units};
