//! Built-in transform blocks

mod kalman;
mod passthrough;
mod scale;

pub use kalman::{KalmanFilterBlock, KalmanParams};
pub use passthrough::PassthroughBlock;
pub use scale::ScaleBlock;
