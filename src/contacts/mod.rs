//! Contact intake: the records users submit and the two-step dialogue
//! that captures them.

pub mod dialogue;
pub mod model;
pub mod registry;

pub use dialogue::{DialogueState, Effect, Transition, advance};
pub use model::{Contact, NewContact, PhoneNumber, normalize_name};
pub use registry::DialogueRegistry;
