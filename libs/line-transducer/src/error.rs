#[derive(Debug, thiserror::Error)]
pub enum TransducerError {
    #[error("transducer config: {0}")]
    Config(String),

    #[error("line too long: {len} bytes (max {max})")]
    LineTooLong { len: usize, max: usize },

    #[error("line too long: {len} bytes (max {max}) and no newline found")]
    NoNewline { len: usize, max: usize },
}
