use std::mem;

use tracing::{trace, warn};

use crate::constants::{SSE_DATA_PREFIX, SSE_DONE};
use crate::conversion::request::generate_tool_call_id;
use crate::conversion::response::map_finish_reason;
use crate::conversion::stream::helpers::{
    OpenAiStreamChunk, StreamDelta, ToolCallDelta, first_choice, parse_stream_chunk,
    tool_arguments_delta, tool_call_index, tool_name_delta, usage_snapshot,
};
use crate::conversion::stream::state::{StreamTranslator, ToolCallAccumulator};
use crate::models::{BlockDelta, BlockStart, Role, StopReason, StreamEvent};

impl StreamTranslator {
    /// Consumes one chunk of the response body and queues the resulting events.
    ///
    /// Only complete lines are decoded; a trailing partial line is carried
    /// over to the next call. Input after a finish reason is ignored.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.terminal {
            return;
        }

        self.line_buffer.extend_from_slice(chunk);
        while let Some(newline_index) = self.line_buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.line_buffer.drain(..=newline_index).collect();
            self.process_line(&line[..newline_index]);

            if self.terminal {
                self.line_buffer.clear();
                return;
            }
        }
    }

    /// Closes the session after the body ended without a finish reason.
    pub fn finish(&mut self) {
        if self.terminal {
            return;
        }

        if !self.line_buffer.is_empty() {
            let remainder = mem::take(&mut self.line_buffer);
            self.process_line(&remainder);
            if self.terminal {
                return;
            }
        }

        self.close_text_block();
        self.flush_tool_calls();
        self.emit_message_end(StopReason::EndTurn);
    }

    fn process_line(&mut self, raw_line: &[u8]) {
        let line = String::from_utf8_lossy(raw_line);
        let line = line.trim_end_matches('\r');

        let Some(data_line) = line.strip_prefix(SSE_DATA_PREFIX) else {
            return;
        };
        if data_line.trim() == SSE_DONE {
            return;
        }

        match parse_stream_chunk(data_line) {
            Ok(parsed_chunk) => self.apply_chunk(&parsed_chunk),
            Err(error) => {
                warn!(
                    phase = "stream_line_skipped",
                    %error,
                    "failed to parse upstream stream line as JSON: {data_line}"
                );
            }
        }
    }

    fn apply_chunk(&mut self, parsed_chunk: &OpenAiStreamChunk) {
        if let Some(usage) = usage_snapshot(parsed_chunk) {
            self.usage = usage;
        }

        let Some(choice) = first_choice(parsed_chunk) else {
            return;
        };

        if let Some(delta) = choice.delta.as_ref() {
            self.apply_delta(delta);
        }

        if let Some(finish_reason) = choice.finish_reason.as_deref() {
            trace!(phase = "stream_finish_reason", finish_reason, "Upstream finished");
            self.close_text_block();
            self.flush_tool_calls();
            self.emit_message_end(map_finish_reason(Some(finish_reason)));
        }
    }

    fn apply_delta(&mut self, delta: &StreamDelta) {
        if !self.message_started {
            self.message_started = true;
            self.emit(StreamEvent::MessageStart {
                role: Role::Assistant,
            });
        }

        if let Some(text) = delta.content.as_deref() {
            self.push_text_delta(text);
        }

        if let Some(tool_call_deltas) = delta.tool_calls.as_ref() {
            self.close_text_block();
            for tool_call_delta in tool_call_deltas {
                self.accumulate_tool_call(tool_call_delta);
            }
        }
    }

    fn push_text_delta(&mut self, text: &str) {
        let index = match self.open_text_block {
            Some(index) => index,
            None => {
                let index = self.allocate_block_index();
                self.open_text_block = Some(index);
                self.emit(StreamEvent::ContentBlockStart {
                    index,
                    start: BlockStart::Text,
                });
                index
            }
        };

        self.emit(StreamEvent::ContentBlockDelta {
            index,
            delta: BlockDelta::Text(text.to_string()),
        });
    }

    fn close_text_block(&mut self) {
        if let Some(index) = self.open_text_block.take() {
            self.emit(StreamEvent::ContentBlockStop { index });
        }
    }

    fn accumulate_tool_call(&mut self, tool_call_delta: &ToolCallDelta) {
        let tool_call = self
            .tool_calls
            .entry(tool_call_index(tool_call_delta))
            .or_insert_with(|| ToolCallAccumulator {
                id: generate_tool_call_id(),
                ..ToolCallAccumulator::default()
            });

        if let Some(id) = tool_call_delta.id.as_deref().filter(|id| !id.is_empty()) {
            tool_call.id = id.to_string();
        }
        if let Some(name) = tool_name_delta(tool_call_delta) {
            tool_call.name = name.to_string();
        }
        if let Some(arguments) = tool_arguments_delta(tool_call_delta) {
            tool_call.arguments.push_str(arguments);
        }
    }

    fn flush_tool_calls(&mut self) {
        let tool_calls = mem::take(&mut self.tool_calls);
        for (_, tool_call) in tool_calls {
            let index = self.allocate_block_index();
            self.emit(StreamEvent::ContentBlockStart {
                index,
                start: BlockStart::ToolUse {
                    tool_use_id: tool_call.id,
                    name: tool_call.name,
                },
            });
            if !tool_call.arguments.is_empty() {
                self.emit(StreamEvent::ContentBlockDelta {
                    index,
                    delta: BlockDelta::ToolUse {
                        input: tool_call.arguments,
                    },
                });
            }
            self.emit(StreamEvent::ContentBlockStop { index });
        }
    }

    fn emit_message_end(&mut self, stop_reason: StopReason) {
        self.emit(StreamEvent::MessageStop { stop_reason });
        self.emit(StreamEvent::Metadata { usage: self.usage });
        self.terminal = true;
    }
}
