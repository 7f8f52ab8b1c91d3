#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Transducer(#[from] line_transducer::TransducerError),

    #[error("{0}")]
    Pipe(#[from] relay_pipe::PipeError),
}
