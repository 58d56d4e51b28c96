use crate::models::SystemContentBlock;

pub fn extract_system_text(system: &[SystemContentBlock]) -> String {
    let text_parts: Vec<&str> = system
        .iter()
        .map(|block| match block {
            SystemContentBlock::Text(text) => text.as_str(),
        })
        .collect();
    text_parts.join("\n")
}
