pub mod audio_processor;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod progress;
pub mod service;
pub mod session;
pub mod source;
pub mod transcoders;
pub mod utils;

pub use classifier::Category;
pub use config::Config;
pub use dispatcher::Converter;
pub use errors::{ConvertError, Rejection};
pub use progress::ProgressReporter;
pub use session::{BatchEvent, BatchOutcome, BatchSummary, FileStatus, Session};
pub use source::SourceFile;
pub use transcoders::{ConversionOptions, ConversionResult};
