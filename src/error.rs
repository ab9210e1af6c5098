//! Error types at the crate boundaries.
//!
//! `CommandError` maps one-to-one onto wire reply lines; protocol and
//! domain failures never tear down the reactor.

use thiserror::Error;

/// A command that could not be executed, with its wire reply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR UNKNOWN_CMD")]
    UnknownCommand,
    #[error("UNAUTHORIZED")]
    Unauthorized,
    #[error("ERR BAD_PASSKEY")]
    BadPasskey,
    #[error("BAD_SECRET")]
    BadSecret,
    #[error("ERR BAD_SIDE (expected BUY or SELL)")]
    BadSide,
    #[error("ERR BAD_SYMBOL")]
    BadSymbol,
    #[error("ERR BAD_QTY")]
    BadQty,
    #[error("ERR BAD_PRICE")]
    BadPrice,
    #[error("ERR BAD_COMMAND")]
    BadCommand {
        /// Usage line echoed back to the client
        usage: &'static str,
    },
}

impl CommandError {
    /// Render the newline-terminated wire reply for this error.
    pub fn wire(&self) -> String {
        match self {
            CommandError::BadCommand { usage } => {
                format!("ERR BAD_COMMAND\nUSAGE: {usage}\n")
            }
            other => format!("{other}\n"),
        }
    }
}

/// Instrument registry failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("symbol is empty")]
    EmptySymbol,
    #[error("symbol {0} already listed")]
    DuplicateSymbol(String),
}
