pub mod accept;
pub mod delivery;
pub mod error;
pub mod events;
pub mod model;
pub mod naming;
pub mod workflow;
