mod simulated;

pub use simulated::{SimulatedSettlement, SimulatedTransfer};
