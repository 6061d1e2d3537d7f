pub mod event;
pub mod history;
pub mod level;
pub mod progress;
pub mod session;
pub mod step;
pub mod turn;
pub mod world;
