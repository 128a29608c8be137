//! Operator conversation
//!
//! All terminal interaction of the sync workflow goes through [`Operator`], so
//! the workflow can be driven by a scripted responder in tests.

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};

/// The person at the terminal
#[cfg_attr(test, mockall::automock)]
pub trait Operator {
    /// Show a progress or status line
    fn notify(&self, message: &str);

    /// Ask for a free-text commit message. May return an empty string.
    fn commit_message(&self, prompt: &str) -> Result<String>;

    /// Ask a yes/no question
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Operator backed by the controlling terminal
pub struct TerminalOperator {
    theme: ColorfulTheme,
    assume_yes: bool,
}

impl TerminalOperator {
    /// `assume_yes` answers every confirmation with yes without asking.
    /// Commit messages are always asked for.
    pub fn new(assume_yes: bool) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            assume_yes,
        }
    }
}

impl Operator for TerminalOperator {
    fn notify(&self, message: &str) {
        println!("{}", message);
    }

    fn commit_message(&self, prompt: &str) -> Result<String> {
        let message: String = Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(message)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            println!("{} [assumed yes]", prompt);
            return Ok(true);
        }

        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(answer)
    }
}

/// An operator answer that carries no commit message
pub fn is_blank(message: &str) -> bool {
    message.trim().is_empty()
}
