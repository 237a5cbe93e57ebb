//! Document wire model.

mod model;
mod wire_date;

pub use model::{Description, Document, Product};
