// Domain layer: request/response records and the ports between layers.

pub mod model;
pub mod ports;
