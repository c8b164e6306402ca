pub mod config;
pub mod error;
pub mod messages;
pub mod models;
pub mod utils;

pub use self::config::*;
pub use error::*;
pub use messages::*;
pub use utils::*;
