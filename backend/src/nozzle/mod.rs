pub mod model;
pub mod registry;

pub use model::Nozzle;
pub use registry::SqlxNozzleRegistry;
