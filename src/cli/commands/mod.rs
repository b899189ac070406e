//! CLI command implementations

pub mod config;
pub mod exists;
pub mod fetch;
pub mod list;
pub mod verify;

pub use config::execute as config;
pub use exists::execute as exists;
pub use fetch::execute as fetch;
pub use list::execute as list;
pub use verify::execute as verify;
