mod error;
mod net;
mod pipe;
mod relay;
mod traffic;

pub use error::PipeError;
pub use net::{accept, bind, dial, open};
pub use pipe::{pipe, Closed, Direction, PipeOptions, PipeStats};
pub use relay::{relay, RelayStats};
