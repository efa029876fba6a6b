mod gameboard;
mod order;
mod unit;

pub use gameboard::{AdjacencyKey, GameError, Gameboard, OrderEntry};
pub use order::Order;
pub use unit::{Location, Season, Turn, Unit, UnitKind};
