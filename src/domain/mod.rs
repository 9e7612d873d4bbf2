// Domain layer: core models, the in-memory sheet and ports (interfaces).

pub mod model;
pub mod ports;
pub mod sheet;
