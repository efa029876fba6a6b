pub mod board;
pub mod catalog;
pub mod message;
pub mod token;

pub use message::{Message, Node};
pub use token::{Category, Token};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unknown token {0:#06X}")]
    UnknownToken(u16),
    #[error("Diplomacy payload of {0} bytes is not a whole number of tokens")]
    ShortFrame(usize),
    #[error("Unbalanced parentheses")]
    UnbalancedParens,
    #[error("Integer literal {0} outside 0..=16383")]
    IntegerRange(i32),
    #[error("Not a 7-bit character: {0:?}")]
    NotAscii(char),
}
