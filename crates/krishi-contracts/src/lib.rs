pub mod artifacts;
pub mod dashboard;
pub mod diagnosis;
pub mod errors;
pub mod events;
pub mod weather;
