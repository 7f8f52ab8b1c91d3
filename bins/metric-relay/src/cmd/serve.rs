use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use line_transducer::StreamTransducer;

use crate::config::{Effective, ServeArgs};
use crate::error::RelayError;

pub async fn run(args: ServeArgs) -> Result<(), RelayError> {
    tracing::info!("metric-relay starting");

    let eff = Effective::new(&args)?;
    tracing::info!(
        config = %args.config,
        listen = %eff.listen,
        upstream = %eff.upstream,
        once = eff.once,
        filter_prefix = %eff.transducer.filter_prefix,
        capture_path = %eff.transducer.capture_path,
        aggregate_path = %eff.transducer.aggregate_path,
        rewrite_paths = eff.transducer.rewrite_path_segments,
        "loaded config"
    );

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutting down..."),
            Err(e) => tracing::error!(error = %e, "signal handler error"),
        }
        signal_token.cancel();
    });

    if eff.once {
        serve_once(&eff, &token).await?;
    } else {
        serve_forever(&eff, &token).await?;
    }

    // Дать обратному направлению дочитать и закрыться.
    if !token.is_cancelled() {
        tokio::time::sleep(eff.shutdown_grace).await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}

/// Одно соединение: listener живёт только до первого accept.
async fn serve_once(eff: &Effective, token: &CancellationToken) -> Result<(), RelayError> {
    let (inbound, peer) = tokio::select! {
        res = relay_pipe::open(&eff.listen) => res?,
        _ = token.cancelled() => return Ok(()),
    };
    if let Err(e) = serve_connection(eff, inbound, peer, token).await {
        tracing::error!(%peer, error = %e, "connection error");
    }
    Ok(())
}

async fn serve_forever(eff: &Effective, token: &CancellationToken) -> Result<(), RelayError> {
    let listener = relay_pipe::bind(&eff.listen).await?;

    // Соединения обслуживаются строго по одному.
    loop {
        let (inbound, peer) = tokio::select! {
            res = relay_pipe::accept(&listener) => res?,
            _ = token.cancelled() => return Ok(()),
        };

        if let Err(e) = serve_connection(eff, inbound, peer, token).await {
            tracing::error!(%peer, error = %e, "connection error");
        }

        if token.is_cancelled() {
            return Ok(());
        }
    }
}

async fn serve_connection(
    eff: &Effective,
    inbound: TcpStream,
    peer: SocketAddr,
    token: &CancellationToken,
) -> Result<(), RelayError> {
    let outbound = relay_pipe::dial(&eff.upstream).await?;
    tracing::info!(%peer, upstream = %eff.upstream, "proxying");

    let mut transducer = StreamTransducer::new(&eff.transducer)?;
    let result = relay_pipe::relay(inbound, outbound, &mut transducer, &eff.pipe, token).await;

    let counters = transducer.stats();
    tracing::info!(
        %peer,
        forwarded = counters.lines_forwarded,
        suppressed = counters.lines_suppressed,
        captures = counters.captures,
        aggregates = counters.aggregates_emitted,
        "connection closed"
    );

    let stats = result?;
    tracing::info!(
        %peer,
        bytes_in = stats.upstream.bytes_read,
        bytes_out = stats.upstream.bytes_written,
        bytes_back = stats.downstream.bytes_written,
        "relay finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    /// Свободный порт: занять и сразу отпустить.
    async fn free_addr() -> String {
        let listener = relay_pipe::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    }

    async fn dial_with_retry(addr: &str) -> TcpStream {
        for _ in 0..100 {
            if let Ok(stream) = relay_pipe::dial(addr).await {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("relay did not start listening on {addr}");
    }

    #[tokio::test]
    async fn once_mode_relays_single_connection_and_exits() {
        let collector = relay_pipe::bind("127.0.0.1:0").await.unwrap();
        let upstream = collector.local_addr().unwrap().to_string();
        let listen = free_addr().await;

        let mut config = tempfile::NamedTempFile::new().unwrap();
        config.write_all(b"shutdown_grace_ms = 0\n").unwrap();
        let args = ServeArgs {
            config: config.path().to_str().unwrap().to_string(),
            listen: Some(listen.clone()),
            upstream: Some(upstream),
            once: true,
            display: false,
            rewrite_paths: false,
        };

        let server = tokio::spawn(run(args));

        let collector_task = tokio::spawn(async move {
            let (mut conn, _) = relay_pipe::accept(&collector).await.unwrap();
            let mut got = Vec::new();
            conn.read_to_end(&mut got).await.unwrap();
            got
        });

        let mut client = dial_with_retry(&listen).await;
        client
            .write_all(b"gatling.mysim.users.allUsers.active 5 1000000001\ngatling.mysim.hosts.cpu 9 1000000002\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();
        let mut back = Vec::new();
        client.read_to_end(&mut back).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap().unwrap();
        assert_eq!(
            collector_task.await.unwrap(),
            b"gatling.mysim.allActiveUsers 5 1000000002\ngatling.mysim.hosts.cpu 9 1000000002\n"
        );
        assert!(back.is_empty());

        // listener закрыт вместе с единственным соединением
        assert!(relay_pipe::dial(&listen).await.is_err());
    }
}
