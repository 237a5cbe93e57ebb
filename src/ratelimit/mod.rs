//! Request rate limiting.

mod permit_pool;
mod window;

pub use permit_pool::PermitPool;
pub use window::TimeWindow;
