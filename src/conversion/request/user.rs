use crate::conversion::request::models::WireMessage;
use crate::models::{ContentBlock, Message};

pub fn has_text_content(message: &Message) -> bool {
    message
        .content
        .iter()
        .any(|block| matches!(block, ContentBlock::Text(_)))
}

pub fn convert_user_message(message: &Message) -> WireMessage {
    WireMessage::User {
        content: join_text_blocks(&message.content),
    }
}

pub(crate) fn join_text_blocks(blocks: &[ContentBlock]) -> String {
    let text_parts: Vec<&str> = blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    text_parts.join("\n")
}
