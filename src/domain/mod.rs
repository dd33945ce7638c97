pub mod cooldown;
pub mod model;
pub mod occurrence;
pub mod playlist;
