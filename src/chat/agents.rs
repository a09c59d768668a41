//! The `agents` backend.
//!
//! The agent runtime targets the hosted OpenAI platform and cannot be pointed at an arbitrary
//! base URL or an Azure deployment, so in this client the backend only explains itself.

use crate::error::{Error, Result};

const UNAVAILABLE: &str = "\
Agents mode is not available in this setup.
The agent runtime targets the hosted OpenAI platform, while this client talks to
Azure/OpenAI-compatible endpoints configured through OPENAI_BASE_URL.

What you can do now:
  - Keep using the default 'completions' mode.
  - Bridge tools yourself: map them to function calling, run the calls, and feed
    the results back to the model.";

/// Runs the `agents` backend.
///
/// # Errors
///
/// Always returns [`Error::BackendUnavailable`], which exits with status 2.
pub fn run_agents_mode(system_prompt: Option<&str>, prompt: Option<&str>, stream: bool) -> Result<()> {
    tracing::debug!(
        has_system_prompt = system_prompt.is_some(),
        one_shot = prompt.is_some(),
        stream,
        "agents mode requested"
    );
    Err(Error::backend_unavailable(UNAVAILABLE))
}
