use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use line_transducer::StreamTransducer;

use crate::error::PipeError;
use crate::pipe::{pipe, Direction, PipeOptions, PipeStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub upstream: PipeStats,
    pub downstream: PipeStats,
}

/// Связать клиента с collector'ом: client → transducer → collector
/// и collector → client без изменений.
///
/// Когда одно направление завершается, второе отменяется явно, иначе
/// оно висело бы на чтении до закрытия соединения с той стороны.
pub async fn relay<C, U>(
    client: C,
    collector: U,
    transducer: &mut StreamTransducer,
    opts: &PipeOptions,
    token: &CancellationToken,
) -> Result<RelayStats, PipeError>
where
    C: AsyncRead + AsyncWrite,
    U: AsyncRead + AsyncWrite,
{
    let (client_rx, client_tx) = tokio::io::split(client);
    let (collector_rx, collector_tx) = tokio::io::split(collector);
    let pair = token.child_token();

    let upstream = async {
        let res = pipe(Direction::Upstream, client_rx, collector_tx, Some(transducer), opts, &pair).await;
        pair.cancel();
        res
    };
    let downstream = async {
        let res = pipe(Direction::Downstream, collector_rx, client_tx, None, opts, &pair).await;
        pair.cancel();
        res
    };

    let (upstream, downstream) = tokio::join!(upstream, downstream);
    match (upstream, downstream) {
        (Ok(upstream), Ok(downstream)) => Ok(RelayStats { upstream, downstream }),
        (Err(e), other) | (other @ Ok(_), Err(e)) => {
            if let Err(second) = other {
                tracing::warn!(error = %second, "paired direction also failed");
            }
            Err(e)
        }
    }
}
