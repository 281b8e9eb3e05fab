//! Chat sessions: one message store per chat screen plus what the screen
//! needs to talk to its endpoint.

use crate::client::ChatEndpoint;
use crate::state::{Exchange, MessageStore, Turn, TurnId};
use crate::stream::StreamUpdate;
use crate::whatif::{self, WhatIfContext};

pub const CHAT_GREETING: &str =
    "Salutations, je suis l'IA signature de Magritte. Posez-moi une question et je vous répondrai.";
pub const CHAT_FAILED: &str =
    "Apologies, but it seems the cosmic energies are disturbed. Please try again later.";

#[derive(Debug, Clone)]
pub struct ChatSession {
    endpoint: ChatEndpoint,
    failure_text: &'static str,
    store: MessageStore,
    context: Option<WhatIfContext>,
    alternatives_loading: bool,
}

impl ChatSession {
    pub fn conversation() -> Self {
        Self {
            endpoint: ChatEndpoint::Conversation,
            failure_text: CHAT_FAILED,
            store: MessageStore::with_greeting(CHAT_GREETING),
            context: None,
            alternatives_loading: false,
        }
    }

    pub fn what_if(context: WhatIfContext) -> Self {
        Self {
            endpoint: ChatEndpoint::WhatIf,
            failure_text: whatif::STREAM_FAILED,
            store: MessageStore::with_greeting(whatif::intro_message(&context)),
            context: Some(context),
            alternatives_loading: false,
        }
    }

    pub fn endpoint(&self) -> ChatEndpoint {
        self.endpoint
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn context(&self) -> Option<&WhatIfContext> {
        self.context.as_ref()
    }

    pub fn submit(&mut self, input: &str) -> Option<Exchange> {
        let exchange = self.store.submit(input)?;
        tracing::info!(
            endpoint = ?self.endpoint,
            turn = %exchange.id,
            history = exchange.history.len(),
            "submitting turn"
        );
        Some(exchange)
    }

    pub fn apply(&mut self, id: TurnId, update: StreamUpdate) -> bool {
        let finished = !matches!(update, StreamUpdate::Fragment(_));
        let applied = self.store.apply(id, update, self.failure_text);
        if applied && finished {
            tracing::debug!(turn = %id, "exchange finished");
        }
        applied
    }

    /// Abandon the in-flight exchange, e.g. when the screen is left.
    pub fn cancel(&mut self) -> bool {
        match self.store.clear_in_flight() {
            Some(turn) => {
                tracing::info!(turn = %turn.id, received = turn.content.len(), "exchange cancelled");
                true
            }
            None => false,
        }
    }

    pub fn alternatives_loading(&self) -> bool {
        self.alternatives_loading
    }

    /// Start an alternatives lookup. Returns the question/answer pair to send,
    /// or `None` if this is not a what-if session or a lookup is running.
    pub fn begin_alternatives(&mut self) -> Option<WhatIfContext> {
        if self.alternatives_loading {
            return None;
        }
        let context = self.context.clone()?;
        self.alternatives_loading = true;
        Some(context)
    }

    pub fn alternatives_received(&mut self, result: anyhow::Result<serde_json::Value>) {
        if !self.alternatives_loading {
            return;
        }
        self.alternatives_loading = false;

        let content = match result {
            Ok(payload) => whatif::alternatives_content(payload),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch alternatives");
                whatif::ALTERNATIVES_FAILED.to_string()
            }
        };
        self.store.push_turn(Turn::assistant(content));
    }

    pub fn propose_own_continuation(&mut self) {
        self.store.push_turn(Turn::assistant(whatif::PROPOSE_OWN));
    }

    pub fn continue_original_story(&mut self) {
        self.store.push_turn(Turn::assistant(whatif::CONTINUE_ORIGINAL));
    }
}
