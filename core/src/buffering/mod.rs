pub mod buffer;

pub use buffer::{FlushOutcome, SampleBuffer};
