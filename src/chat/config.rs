//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg`, the environment the endpoint settings
//! are read from, and the immutable configuration a session is started with.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};

/// Credential for the endpoint.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Base address of the endpoint, e.g. `https://example.openai.azure.com/openai/v1/`.
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
/// Azure deployment name; preferred over [`OPENAI_MODEL`].
pub const OPENAI_DEPLOYMENT: &str = "OPENAI_DEPLOYMENT";
/// Model name for non-Azure endpoints.
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
/// Optional organization sent with every request.
pub const OPENAI_ORG: &str = "OPENAI_ORG";
/// Optional default system prompt.
pub const OPENAI_SYSTEM_PROMPT: &str = "OPENAI_SYSTEM_PROMPT";
/// Display name for assistant replies.
pub const ASSISTANT_NAME: &str = "ASSISTANT_NAME";
/// Display name on the input prompt.
pub const USER_NAME: &str = "USER_NAME";
/// Any non-empty value disables ANSI styling.
pub const NO_COLOR: &str = "NO_COLOR";

const DEFAULT_ASSISTANT_NAME: &str = "Assistant";
const DEFAULT_USER_NAME: &str = "You";

/// Command-line arguments for the chatrelay tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// One-shot prompt.
    #[arrrg(optional, "One-shot prompt; if omitted, starts interactive chat", "TEXT")]
    pub prompt: Option<String>,

    /// Disable streaming.
    #[arrrg(flag, "Disable streaming output")]
    pub no_stream: bool,

    /// Backend selection.
    #[arrrg(optional, "Backend: completions (default) or agents", "MODE")]
    pub mode: Option<String>,

    /// Model override.
    #[arrrg(optional, "Model or deployment (default: $OPENAI_DEPLOYMENT or $OPENAI_MODEL)", "MODEL")]
    pub model: Option<String>,

    /// System prompt override.
    #[arrrg(optional, "System prompt (default: $OPENAI_SYSTEM_PROMPT)", "PROMPT")]
    pub system: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Diagnostic log filter.
    #[arrrg(optional, "Log filter for diagnostics on stderr, e.g. debug", "FILTER")]
    pub log_level: Option<String>,
}

impl ChatArgs {
    /// The one-shot prompt, if one was given and is not blank.
    pub fn one_shot_prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|prompt| !prompt.trim().is_empty())
    }

    /// The selected backend.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown mode.
    pub fn mode(&self) -> Result<Mode> {
        match self.mode.as_deref() {
            Some(mode) => mode.parse(),
            None => Ok(Mode::default()),
        }
    }
}

/// The backend a session talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Chat completions through the turn executor.
    #[default]
    Completions,
    /// The agent runtime.
    Agents,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "completions" => Ok(Mode::Completions),
            "agents" => Ok(Mode::Agents),
            _ => Err(Error::configuration(
                format!("Invalid --mode {s:?}: expected completions or agents"),
                None,
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Completions => write!(f, "completions"),
            Mode::Agents => write!(f, "agents"),
        }
    }
}

/// A source of configuration variables.
pub trait EnvSource {
    /// Returns the raw value of `name`.
    fn var(&self, name: &str) -> Option<String>;

    /// Returns the value of `name`, treating an empty value as absent.
    fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).filter(|value| !value.is_empty())
    }
}

/// The process environment, after loading `.env` from the working directory if there is one.
#[derive(Debug, Clone, Copy)]
pub struct ProcessEnv;

impl ProcessEnv {
    /// Loads `.env` into the process environment and returns a handle on it.
    ///
    /// Variables already set take precedence over the file.
    pub fn load() -> Self {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            tracing::warn!(error = %err, "could not load .env");
        }
        ProcessEnv
    }
}

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Resolves the model, preferring the deployment name over the generic model name.
///
/// # Errors
///
/// Returns a configuration error when neither is set.
pub fn resolve_model(env: &impl EnvSource) -> Result<String> {
    env.non_empty(OPENAI_DEPLOYMENT)
        .or_else(|| env.non_empty(OPENAI_MODEL))
        .ok_or_else(|| {
            Error::configuration(
                format!("Missing {OPENAI_DEPLOYMENT} (Azure) or {OPENAI_MODEL} environment variable."),
                Some(OPENAI_DEPLOYMENT.to_string()),
            )
        })
}

fn require(env: &impl EnvSource, name: &str) -> Result<String> {
    env.non_empty(name).ok_or_else(|| {
        Error::configuration(
            format!("Missing required environment variable: {name}"),
            Some(name.to_string()),
        )
    })
}

/// The part of the configuration the chat engine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Model or deployment replies are requested from.
    pub model: String,

    /// System message the history is seeded with.
    pub system_prompt: Option<String>,

    /// Whether replies are streamed.
    pub stream: bool,

    /// Name shown on the input prompt.
    pub user_name: String,

    /// Name shown before assistant replies.
    pub assistant_name: String,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl SessionConfig {
    /// Creates a new SessionConfig with default values.
    ///
    /// Defaults:
    /// - No system prompt
    /// - Streaming: enabled
    /// - Names: "You" and "Assistant"
    /// - Color: enabled
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            stream: true,
            user_name: DEFAULT_USER_NAME.to_string(),
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            use_color: true,
        }
    }

    /// Sets the system prompt; blank prompts are dropped.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|prompt| !prompt.trim().is_empty());
        self
    }

    /// Sets whether replies are streamed.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the name shown on the input prompt.
    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    /// Sets the name shown before assistant replies.
    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

/// Everything a `completions` session needs, resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Endpoint credential.
    pub api_key: String,

    /// Endpoint base address.
    pub base_url: String,

    /// Organization header value.
    pub organization: Option<String>,

    /// Settings for the session itself.
    pub session: SessionConfig,
}

impl ChatConfig {
    /// Resolves the configuration from the command line and the environment.
    ///
    /// Command-line values win over the environment.  Required settings are checked in the
    /// order model, base URL, API key, and the first missing one is reported.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required setting is missing.
    pub fn from_args_and_env(args: &ChatArgs, env: &impl EnvSource) -> Result<Self> {
        let model = match args.model.as_deref().filter(|model| !model.trim().is_empty()) {
            Some(model) => model.to_string(),
            None => resolve_model(env)?,
        };
        let base_url = require(env, OPENAI_BASE_URL)?;
        let api_key = require(env, OPENAI_API_KEY)?;

        let mut session = SessionConfig::new(model)
            .with_system_prompt(args.system.clone().or_else(|| env.non_empty(OPENAI_SYSTEM_PROMPT)))
            .with_stream(!args.no_stream);
        if let Some(name) = env.non_empty(USER_NAME) {
            session = session.with_user_name(name);
        }
        if let Some(name) = env.non_empty(ASSISTANT_NAME) {
            session = session.with_assistant_name(name);
        }
        if args.no_color || env.non_empty(NO_COLOR).is_some() {
            session = session.without_color();
        }

        Ok(Self::new(api_key, base_url, session).with_organization(env.non_empty(OPENAI_ORG)))
    }

    /// Creates a configuration with no organization.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        session: SessionConfig,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            organization: None,
            session,
        }
    }

    /// Sets the organization header value.
    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("session", &self.session)
            .finish()
    }
}
