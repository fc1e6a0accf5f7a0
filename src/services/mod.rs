pub mod auth;
pub mod classifier;
pub mod clock;
pub mod poll;
