mod clock;
mod json_question_source;
mod manual_schedular;
mod peer_map;
mod schedular;
mod simple_identity;
mod uuid_generator;
pub use clock::*;
pub use json_question_source::*;
pub use manual_schedular::*;
pub use peer_map::*;
pub use schedular::*;
pub use simple_identity::*;
pub use uuid_generator::*;
