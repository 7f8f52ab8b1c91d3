//! Потоковая переписка line-протокола `<path> <value> <timestamp>\n`.
//!
//! Transducer получает байты произвольными кусками, отбрасывает записи
//! с filter prefix, запоминает значение capture path и вставляет
//! синтетическую aggregate-запись перед первой строкой с новым timestamp.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod filter;
pub mod record;
pub mod transducer;

pub use aggregate::AggregateEmitter;
pub use config::TransducerConfig;
pub use error::TransducerError;
pub use filter::FilterPolicy;
pub use record::Record;
pub use transducer::{Outcome, StreamTransducer, TransducerStats, Transformed};
