use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::error::PipeError;

pub async fn bind(addr: &str) -> Result<TcpListener, PipeError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| PipeError::Bind { addr: addr.to_string(), source: e })?;
    tracing::info!(addr = %addr, "listening");
    Ok(listener)
}

pub async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), PipeError> {
    let (stream, peer) = listener.accept().await.map_err(PipeError::Accept)?;
    tracing::info!(%peer, "client connected");
    Ok((stream, peer))
}

/// Принять ровно одно входящее соединение; listener закрывается сразу после.
pub async fn open(addr: &str) -> Result<(TcpStream, SocketAddr), PipeError> {
    let listener = bind(addr).await?;
    accept(&listener).await
}

pub async fn dial(addr: &str) -> Result<TcpStream, PipeError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| PipeError::Dial { addr: addr.to_string(), source: e })?;
    tracing::info!(upstream = %addr, "upstream connected");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn dial_reaches_accepted_peer() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (dialed, accepted) = tokio::join!(dial(&addr), accept(&listener));
        let mut dialed = dialed.unwrap();
        let (mut accepted, _) = accepted.unwrap();

        dialed.write_all(b"ping\n").await.unwrap();
        let mut buf = [0u8; 5];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");
    }

    #[tokio::test]
    async fn open_accepts_one_connection_then_closes() {
        let addr = {
            let reserved = bind("127.0.0.1:0").await.unwrap();
            reserved.local_addr().unwrap().to_string()
        };

        let opened = tokio::spawn({
            let addr = addr.clone();
            async move { open(&addr).await }
        });

        let mut dialed = loop {
            match dial(&addr).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        };
        let (mut accepted, peer) = opened.await.unwrap().unwrap();
        assert_eq!(peer, dialed.local_addr().unwrap());

        accepted.write_all(b"ok\n").await.unwrap();
        let mut buf = [0u8; 3];
        dialed.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ok\n");

        assert!(matches!(dial(&addr).await, Err(PipeError::Dial { .. })));
    }

    #[tokio::test]
    async fn dial_refused_is_reported() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = dial(&addr).await.unwrap_err();
        assert!(matches!(err, PipeError::Dial { .. }));
    }

    #[tokio::test]
    async fn bind_bad_address_is_reported() {
        let err = bind("not-an-address").await.unwrap_err();
        assert!(matches!(err, PipeError::Bind { .. }));
    }
}
