// Domain layer: bounce/account models and the ports the reconciliation job drives.

pub mod model;
pub mod ports;
