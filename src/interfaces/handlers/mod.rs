pub mod images;
pub mod public;
pub mod system;
pub mod user;
