//! The model runtime capability.
//!
//! Everything that talks to a language model goes through [`ModelRuntime`].
//! The production implementation is [`OllamaClient`]; tests substitute a
//! [`StubRuntime`] with scripted replies.

mod ollama;

pub use ollama::OllamaClient;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a conversation, in the runtime's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An installed model as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// A locally hosted language model service.
pub trait ModelRuntime {
    /// Send a conversation and return the full reply.
    ///
    /// `on_token` is called with each fragment as it arrives; runtimes that
    /// do not stream call it once with the whole reply.
    fn chat(
        &self,
        model: &str,
        messages: &[Message],
        on_token: &mut dyn FnMut(&str),
    ) -> Result<String>;

    /// Names and sizes of the installed models.
    fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// One-shot completion of a single user prompt, without streaming output.
    fn infer(&self, prompt: &str, model: &str) -> Result<String> {
        self.chat(model, &[Message::user(prompt)], &mut |_| {})
    }

    /// Check that the runtime answers at all.
    fn ping(&self) -> Result<()> {
        self.list_models().map(|_| ())
    }
}

#[derive(Debug, Default)]
struct StubState {
    models: Vec<ModelInfo>,
    replies: VecDeque<String>,
    requests: Vec<(String, Vec<Message>)>,
    unavailable: bool,
}

/// A scripted runtime for tests.
///
/// Replies are returned in order; each request is recorded. Clones share the
/// same script and log, so a test can keep one clone after boxing another.
#[derive(Debug, Clone, Default)]
pub struct StubRuntime {
    state: Rc<RefCell<StubState>>,
}

impl StubRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an installed model (builder style).
    pub fn with_model(self, name: &str) -> Self {
        self.state.borrow_mut().models.push(ModelInfo {
            name: name.to_string(),
            size: 0,
        });
        self
    }

    /// Queue a reply (builder style).
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.state.borrow_mut().replies.push_back(reply.into());
        self
    }

    /// Make every call fail as if the runtime were down.
    pub fn unavailable(self) -> Self {
        self.state.borrow_mut().unavailable = true;
        self
    }

    /// Every `(model, messages)` pair sent so far.
    pub fn requests(&self) -> Vec<(String, Vec<Message>)> {
        self.state.borrow().requests.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.state.borrow().unavailable {
            return Err(Error::ModelUnavailable {
                url: "stub://".to_string(),
                reason: "stub runtime marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl ModelRuntime for StubRuntime {
    fn chat(
        &self,
        model: &str,
        messages: &[Message],
        on_token: &mut dyn FnMut(&str),
    ) -> Result<String> {
        self.check_available()?;
        let mut state = self.state.borrow_mut();
        state.requests.push((model.to_string(), messages.to_vec()));
        let reply = state
            .replies
            .pop_front()
            .ok_or_else(|| Error::Other("stub runtime has no reply queued".to_string()))?;
        on_token(&reply);
        Ok(reply)
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.check_available()?;
        Ok(self.state.borrow().models.clone())
    }
}
