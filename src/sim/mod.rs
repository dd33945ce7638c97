pub mod audio;
pub mod effects;
pub mod event;
pub mod player;
pub mod session;
pub mod view;
