pub mod config;
pub mod error;
pub mod names;
pub mod value;

pub use config::Config;
pub use error::BizGraphError;
pub use value::{Properties, PropertyValue};
