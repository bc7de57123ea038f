pub mod dataset;
pub mod error;
pub mod traits;
pub mod types;

pub use dataset::*;
pub use error::*;
pub use traits::*;
pub use types::*;
