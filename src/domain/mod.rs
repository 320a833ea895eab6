// Domain layer: server slugs, typed records and ports (interfaces).

pub mod model;
pub mod ports;
pub mod server;
