pub mod speech;

pub use speech::{CommandSpeech, LoggingSpeech, RecordingSpeech, SpeechSink};
