pub mod client;
pub mod strategy;

pub use client::{Client, ClientError, ProtocolError, Role, SessionEnd};
pub use strategy::{HoldStrategy, OrderStrategy, RandomStrategy};
