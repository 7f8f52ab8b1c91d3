use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use line_transducer::{Outcome, StreamTransducer};

use crate::error::PipeError;
use crate::traffic;

/// Направление копирования внутри пары соединений.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Клиент → collector, через transducer.
    Upstream,
    /// Collector → клиент, без изменений.
    Downstream,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upstream => f.write_str("upstream"),
            Direction::Downstream => f.write_str("downstream"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipeOptions {
    /// Размер буфера чтения; начальный размер output-буфера transducer'а.
    pub read_buffer: usize,
    /// Отражать трафик в лог `relay::traffic`.
    pub display: bool,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self { read_buffer: 4096, display: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    /// Источник закрыл соединение.
    Eof,
    /// Остановлено токеном (парное направление завершилось или shutdown).
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub closed: Closed,
}

/// Копировать `src` → `dst` до EOF, ошибки или отмены, опционально через transducer.
///
/// Токен прерывает и чтение, и запись (collector, переставший читать,
/// не держит relay). По завершении, в том числе с ошибкой, пишущая
/// сторона `dst` закрывается (shutdown), ошибка shutdown только логируется.
pub async fn pipe<R, W>(
    direction: Direction,
    mut src: R,
    mut dst: W,
    transducer: Option<&mut StreamTransducer>,
    opts: &PipeOptions,
    token: &CancellationToken,
) -> Result<PipeStats, PipeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut progress = Progress { direction, opts, token, bytes_read: 0, bytes_written: 0 };
    let result = progress.copy(&mut src, &mut dst, transducer).await;

    // Пир мог уже закрыть соединение, это не ошибка копирования.
    if let Err(e) = dst.shutdown().await {
        tracing::debug!(%direction, error = %e, "shutdown error");
    }

    let closed = result?;
    let Progress { bytes_read, bytes_written, .. } = progress;
    tracing::debug!(%direction, bytes_read, bytes_written, ?closed, "pipe finished");
    Ok(PipeStats { bytes_read, bytes_written, closed })
}

/// Состояние одного прогона `pipe`: счётчики и общий токен отмены.
struct Progress<'a> {
    direction: Direction,
    opts: &'a PipeOptions,
    token: &'a CancellationToken,
    bytes_read: u64,
    bytes_written: u64,
}

/// Запись прошла или была прервана токеном.
enum Flow {
    Continue,
    Cancelled,
}

impl Progress<'_> {
    async fn copy<R, W>(
        &mut self,
        src: &mut R,
        dst: &mut W,
        mut transducer: Option<&mut StreamTransducer>,
    ) -> Result<Closed, PipeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (direction, token) = (self.direction, self.token);
        let capacity = self.opts.read_buffer.max(1);
        let mut buf = vec![0u8; capacity];
        let mut out = vec![0u8; if transducer.is_some() { capacity } else { 0 }];

        loop {
            let n = tokio::select! {
                res = src.read(&mut buf) => res.map_err(|e| PipeError::Read { direction, source: e })?,
                _ = token.cancelled() => return Ok(Closed::Cancelled),
            };
            self.bytes_read += n as u64;
            let at_end = n == 0;

            let flow = match transducer.as_deref_mut() {
                Some(t) => self.transform_chunk(t, &buf[..n], at_end, &mut out, dst).await?,
                None if n > 0 => self.write_chunk(dst, &buf[..n]).await?,
                None => Flow::Continue,
            };

            if let Flow::Cancelled = flow {
                return Ok(Closed::Cancelled);
            }
            if at_end {
                return Ok(Closed::Eof);
            }
        }
    }

    /// Прогнать один прочитанный кусок через transducer, соблюдая ShortBuffer:
    /// выводить что получилось, а при отсутствии прогресса удваивать output.
    async fn transform_chunk<W>(
        &mut self,
        transducer: &mut StreamTransducer,
        input: &[u8],
        at_end: bool,
        out: &mut Vec<u8>,
        dst: &mut W,
    ) -> Result<Flow, PipeError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut rest = input;

        loop {
            let res = transducer.transform(rest, out, at_end)?;
            if res.produced > 0 {
                if let Flow::Cancelled = self.write_chunk(dst, &out[..res.produced]).await? {
                    return Ok(Flow::Cancelled);
                }
            }
            rest = &rest[res.consumed..];

            match res.outcome {
                Outcome::Ok => return Ok(Flow::Continue),
                // Следующий вызов вернёт ошибку длины.
                Outcome::Halted => {}
                Outcome::ShortBuffer if res.consumed == 0 && res.produced == 0 => {
                    let grown = out.len().max(1) * 2;
                    tracing::debug!(direction = %self.direction, capacity = grown, "output buffer grown");
                    out.resize(grown, 0);
                }
                Outcome::ShortBuffer => {}
            }
        }
    }

    async fn write_chunk<W>(&mut self, dst: &mut W, data: &[u8]) -> Result<Flow, PipeError>
    where
        W: AsyncWrite + Unpin,
    {
        let (direction, token) = (self.direction, self.token);
        if self.opts.display {
            traffic::display(direction, data);
        }
        tokio::select! {
            res = dst.write_all(data) => {
                res.map_err(|e| PipeError::Write { direction, source: e })?;
                self.bytes_written += data.len() as u64;
                Ok(Flow::Continue)
            }
            _ = token.cancelled() => Ok(Flow::Cancelled),
        }
    }
}
