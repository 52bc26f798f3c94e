mod game;
pub mod lifecycle;
pub mod matchmaking;
pub mod options;
pub mod round;
mod session;

pub use game::*;
pub use session::*;
