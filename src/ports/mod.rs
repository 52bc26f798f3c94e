mod clients_manager;
mod clock;
mod id;
mod identity;
mod job_schedular;
mod question_source;
pub use clients_manager::*;
pub use clock::*;
pub use id::*;
pub use identity::*;
pub use job_schedular::*;
pub use question_source::*;
