pub mod entity;
pub mod hazard;
pub mod push;
pub mod rules;
pub mod tile;
