pub mod controller;
pub mod projection;
pub mod thread;

pub use controller::{ChatController, Notice, NoticeLevel, SelectOutcome, SelectionState};
pub use projection::Customer;
