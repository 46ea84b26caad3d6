//! 内容摘要
//!
//! SHA-256，输出小写十六进制字符串。

use sha2::{Digest, Sha256};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

const CHUNK_SIZE: usize = 64 * 1024;

/// 读取整个流并计算摘要
///
/// 会读尽 `reader`。读取失败时返回错误，不产生部分结果。
pub async fn digest<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// 内存数据的摘要
pub fn digest_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// 比较两个十六进制摘要（忽略大小写）
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

/// 边读边算摘要的读取器
///
/// 包装入站流，被消费的每个字节都会进入哈希。
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// 结束并返回摘要
    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.hasher.update(&buf.filled()[before..]);
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA256: &str = "b5d4045c3f466fa91fe2cc6abe79232a1a57cdf104f7a26e716e0a1e2789df78";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[tokio::test]
    async fn test_digest_abc() {
        let hash = digest(&b"ABC"[..]).await.unwrap();
        assert_eq!(hash, ABC_SHA256);
        assert_eq!(digest_bytes(b"ABC"), ABC_SHA256);
    }

    #[tokio::test]
    async fn test_digest_empty() {
        assert_eq!(digest(&b""[..]).await.unwrap(), EMPTY_SHA256);
    }

    #[tokio::test]
    async fn test_digest_independent_of_chunking() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

        // 以 7 字节为块分段送达
        let (mut tx, rx) = tokio::io::duplex(7);
        let payload = data.clone();
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for chunk in payload.chunks(7) {
                tx.write_all(chunk).await.unwrap();
            }
        });

        let chunked = digest(rx).await.unwrap();
        writer.await.unwrap();

        assert_eq!(chunked, digest(&data[..]).await.unwrap());
        assert_eq!(chunked, digest_bytes(&data));
    }

    #[tokio::test]
    async fn test_hashing_reader() {
        let mut reader = HashingReader::new(&b"ABC"[..]);
        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).await.unwrap();

        assert_eq!(sink, b"ABC");
        assert_eq!(reader.finalize(), ABC_SHA256);
    }

    /// 先给出一段数据，然后报错
    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "peer reset",
                )));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_error_mid_stream() {
        let err = digest(BrokenReader { sent: false }).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_digests_match_ignores_case() {
        assert!(digests_match(ABC_SHA256, &ABC_SHA256.to_uppercase()));
        assert!(!digests_match(ABC_SHA256, EMPTY_SHA256));
    }
}
