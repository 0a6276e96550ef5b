pub mod simulation;
pub mod traits;

pub use simulation::SimulatedGateway;
pub use traits::{MockOrderGateway, OrderGateway};
