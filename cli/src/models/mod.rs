pub mod schedule;
pub mod table;

pub use schedule::*;
pub use table::*;
