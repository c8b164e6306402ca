// session-client/src/lib.rs
//! Client half of the auth platform: a session controller that keeps tokens
//! fresh and a route guard that decides what a session may see.
pub mod controller;
pub mod guard;
pub mod state;
pub mod storage;
pub mod transport;

pub use controller::{RegisterOutcome, SessionController};
pub use guard::{decide, is_permitted, visible_items, GuardDecision, MenuItem, RouteRequirement};
pub use state::{Phase, SessionState};
pub use storage::{DurableStore, FileStore, MemoryStore};
pub use transport::{AuthApi, HttpAuthApi, Registered, SessionGrant};
