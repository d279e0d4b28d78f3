pub mod payload;
pub mod codec;
pub mod config;
pub mod engine;
pub mod output;
pub mod detect;
pub mod neutralize;

pub use payload::Payload;
pub use codec::{CodecId, Codec, CodecDescriptor, DecodeError, get_codec, decode_single, list_codecs};
pub use config::{EngineConfig, ConfigError};
pub use engine::{Engine, DecodeOutcome, TerminalReason, decode_auto};
pub use output::{Rendered, render};
pub use detect::{Indicator, detect};
pub use neutralize::neutralize;
