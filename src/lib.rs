// Library root
// -----------
// This crate exposes the pieces of the interactive device file manager. The
// binary (`main.rs`) builds the settings and hands them to `ui::main_menu`.
//
// Module responsibilities:
// - `ampy`: runs the external device tool and captures what it printed.
// - `ports`: finds the serial port the board is attached to.
// - `ops`: one handler per menu operation, working through a `Session`.
// - `ui`: the numbered menu loop.
// - `prompt`, `spinner`: operator input and the busy indicator.
// - `config`, `error`: environment settings and the error type.
//
// Device I/O, operator input and port scanning sit behind traits
// (`DeviceTool`, `Prompt`, `PortLister`) so the handlers and the menu can be
// exercised without a board attached.
pub mod ampy;
pub mod config;
pub mod error;
pub mod ops;
pub mod ports;
pub mod prompt;
pub mod spinner;
pub mod ui;

#[cfg(test)]
pub mod test_utils;

pub use error::{Error, Result};
