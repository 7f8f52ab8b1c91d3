use crate::pipe::Direction;

#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error("accept: {0}")]
    Accept(std::io::Error),

    #[error("dial {addr}: {source}")]
    Dial { addr: String, source: std::io::Error },

    #[error("read ({direction}): {source}")]
    Read { direction: Direction, source: std::io::Error },

    #[error("write ({direction}): {source}")]
    Write { direction: Direction, source: std::io::Error },

    #[error("transform: {0}")]
    Transform(#[from] line_transducer::TransducerError),
}
