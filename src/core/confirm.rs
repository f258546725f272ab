//! Operator confirmation before irreversible stages.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::Result;

pub trait ConfirmationProvider {
    /// Ask the operator; `Ok(true)` only for an explicit affirmative.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Only `y` or `yes` (any case, surrounding whitespace ignored) confirm.
pub fn is_affirmative(response: &str) -> bool {
    matches!(response.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Replays canned responses; an exhausted script declines.
#[derive(Debug, Default)]
pub struct ScriptedConfirmation {
    responses: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirmation {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl ConfirmationProvider for ScriptedConfirmation {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        let response = self.responses.borrow_mut().pop_front().unwrap_or_default();
        Ok(is_affirmative(&response))
    }
}
