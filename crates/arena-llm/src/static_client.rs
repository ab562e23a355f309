//! Canned-reply model client for dry runs and tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{InvokeRequest, ModelClient, ModelError, ModelReply};

enum Script {
    /// Same reply for every invocation.
    Always(String),
    /// Pop replies in order; errors interleaved where scripted.
    Queue(Mutex<VecDeque<Result<String, ModelError>>>),
}

/// Model client that replays scripted replies without any transport.
pub struct StaticClient {
    script: Script,
    calls: Mutex<u32>,
}

impl StaticClient {
    /// Reply with the same text on every invocation.
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            script: Script::Always(text.into()),
            calls: Mutex::new(0),
        }
    }

    /// Reply with the scripted outcomes in order; once the queue is
    /// drained every further invocation fails as transient.
    pub fn sequence(replies: Vec<Result<String, ModelError>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(replies.into())),
            calls: Mutex::new(0),
        }
    }

    /// Number of invocations served so far.
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl ModelClient for StaticClient {
    fn provider(&self) -> &str {
        "static"
    }

    async fn invoke(&self, _request: &InvokeRequest) -> Result<ModelReply, ModelError> {
        *self.calls.lock() += 1;
        let text = match &self.script {
            Script::Always(text) => text.clone(),
            Script::Queue(queue) => match queue.lock().pop_front() {
                Some(Ok(text)) => text,
                Some(Err(err)) => return Err(err),
                None => return Err(ModelError::Transient("script exhausted".to_string())),
            },
        };
        Ok(ModelReply {
            text,
            prompt_tokens: None,
            response_tokens: None,
        })
    }
}

impl std::fmt::Debug for StaticClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticClient").finish_non_exhaustive()
    }
}
