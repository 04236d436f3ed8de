use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

use crate::util::RingBytes;

/// Pump one child stream into the shared capture ring, chunk by chunk.
///
/// Incremental reads keep large child output from deadlocking on a full
/// pipe; the ring bounds memory to the configured capture size. Returns the
/// total byte count on EOF.
pub(crate) fn pump<R>(mut rd: R, ring: Arc<RingBytes>) -> JoinHandle<std::io::Result<u64>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 16 * 1024];
        let mut total = 0u64;

        loop {
            let n = rd.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            ring.push(&buf[..n]);
            total += n as u64;
        }

        Ok(total)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn accumulates_chunks_until_eof() {
        let (mut wr, rd) = tokio::io::duplex(64);
        let ring = RingBytes::new(1024);

        let task = pump(rd, ring.clone());

        wr.write_all(b"first ").await.unwrap();
        wr.write_all(b"second").await.unwrap();
        drop(wr);

        let total = task.await.unwrap().unwrap();
        assert_eq!(total, 12);
        assert_eq!(ring.to_string_lossy(), "first second");
    }
}
