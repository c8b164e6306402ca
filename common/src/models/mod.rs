pub mod identity;
pub mod session;
pub mod token;

pub use identity::*;
pub use session::*;
pub use token::*;
