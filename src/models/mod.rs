pub mod record;
pub mod schema;
pub mod table;

pub use record::*;
pub use schema::*;
pub use table::*;
