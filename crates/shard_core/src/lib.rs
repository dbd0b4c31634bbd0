pub mod api;
pub mod error;
pub mod ids;
pub mod key;
pub mod locator;
pub mod records;
pub mod schema;
pub mod value;

pub use api::*;
pub use error::{ShardError, ShardResult};
pub use ids::*;
pub use key::*;
pub use locator::*;
pub use records::*;
pub use schema::*;
pub use value::*;
