// Adapters layer: concrete implementations of the domain ports.

pub mod sendgrid;
pub mod sqlite;
