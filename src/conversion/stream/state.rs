use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::models::{StreamEvent, TokenUsage};

/// Running reconstruction of one tool call from its incremental deltas.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Session state of one streamed response body. Never shared across calls.
#[derive(Debug, Default)]
pub struct StreamTranslator {
    pub(super) line_buffer: Vec<u8>,
    pub(super) next_block_index: usize,
    pub(super) open_text_block: Option<usize>,
    pub(super) message_started: bool,
    /// Keyed by the upstream tool-call `index`, in first-seen order.
    pub(super) tool_calls: IndexMap<u64, ToolCallAccumulator>,
    pub(super) usage: TokenUsage,
    pub(super) pending: VecDeque<StreamEvent>,
    pub(super) terminal: bool,
}

impl StreamTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop_event(&mut self) -> Option<StreamEvent> {
        self.pending.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<StreamEvent> {
        self.pending.drain(..).collect()
    }

    /// Set once `MessageStop`/`Metadata` have been queued.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub(super) fn allocate_block_index(&mut self) -> usize {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }

    pub(super) fn emit(&mut self, event: StreamEvent) {
        self.pending.push_back(event);
    }
}
