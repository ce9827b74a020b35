// Operator input. Handlers only see the `Prompt` trait so they can be
// driven by a script in tests; the terminal implementation uses dialoguer.

use std::io;

use dialoguer::{Confirm, Input};

/// Marker printed when waiting for the operator to acknowledge output.
pub const INPUT_SIGN: &str = ">>>";

pub trait Prompt {
    /// Ask for a line of free text. Empty answers are allowed.
    fn text(&mut self, prompt: &str) -> io::Result<String>;

    /// Ask a yes/no question. Anything but an explicit yes is a no.
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;

    /// Block until the operator presses enter.
    fn pause(&mut self) -> io::Result<()> {
        self.text(INPUT_SIGN).map(|_| ())
    }
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct Terminal;

impl Prompt for Terminal {
    fn text(&mut self, prompt: &str) -> io::Result<String> {
        let answer: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer.trim().to_string())
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        Confirm::new().with_prompt(prompt).default(false).interact()
    }
}
