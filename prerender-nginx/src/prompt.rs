//! Interactive questions, answered automatically with `--yes`

use anyhow::{bail, Result};
use dialoguer::{Confirm, Input, Select};

#[derive(Debug, Clone, Copy)]
pub struct Prompter {
    assume_yes: bool,
}

impl Prompter {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    pub fn assume_yes(&self) -> bool {
        self.assume_yes
    }

    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            tracing::debug!(prompt, "Assuming yes");
            return Ok(true);
        }
        let answer = Confirm::new().with_prompt(prompt).interact()?;
        tracing::debug!(prompt, answer, "User answered");
        Ok(answer)
    }

    /// Free text; `what` names the matching flag in the non-interactive error
    pub fn text(&self, prompt: &str, what: &str) -> Result<String> {
        if self.assume_yes {
            bail!("{} is required with --yes", what);
        }
        let answer: String = Input::new().with_prompt(prompt).interact_text()?;
        Ok(answer.trim().to_string())
    }

    /// 0-based index into `items`
    pub fn select(&self, prompt: &str, items: &[String], what: &str) -> Result<usize> {
        if self.assume_yes {
            bail!("{} is required with --yes", what);
        }
        Ok(Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()?)
    }
}
