pub mod decoder;
pub mod render;
pub mod session;
pub mod transcript;

pub use decoder::StreamDecoder;
pub use render::{render_message, RenderBlock};
pub use session::{ChatClient, ClientError};
pub use transcript::{MessageHandle, Transcript, TranscriptError};
