pub mod config;
pub mod constants;
pub mod conversion;
pub mod dispatcher;
pub mod errors;
pub mod models;
pub mod retry;
pub mod upstream;
pub mod utils;

pub use config::Config;
pub use conversion::request::convert_converse_to_openai;
pub use conversion::response::{convert_openai_to_converse_response, map_finish_reason};
pub use conversion::stream::{EventStream, StreamTranslator, translate_event_stream};
pub use dispatcher::Dispatcher;
pub use errors::BridgeError;
pub use retry::RetryPolicy;
