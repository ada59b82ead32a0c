pub mod auth;
pub mod protected;
pub mod system;
