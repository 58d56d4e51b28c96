mod helpers;
mod pipeline;
mod state;
mod translator;

pub use pipeline::{EventStream, translate_event_stream};
pub use state::StreamTranslator;
