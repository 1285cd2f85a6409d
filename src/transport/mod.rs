// In-process message transport and capability directory

mod directory;
mod router;

pub use directory::{Directory, LookupFailure, LookupPolicy};
pub use router::{Mailbox, MessageRouter};
