//! Minimal RFB (VNC) client: handshake plus key events, nothing else.

use super::KeyboardChannel;
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const SECURITY_INVALID: u32 = 0;
const SECURITY_NONE: u8 = 1;
const MSG_KEY_EVENT: u8 = 4;

/// RFB protocol version agreed with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RfbVersion {
    V3_3,
    V3_7,
    V3_8,
}

impl RfbVersion {
    fn banner(self) -> &'static [u8; 12] {
        match self {
            RfbVersion::V3_3 => b"RFB 003.003\n",
            RfbVersion::V3_7 => b"RFB 003.007\n",
            RfbVersion::V3_8 => b"RFB 003.008\n",
        }
    }

    /// Highest version we support that does not exceed the server's.
    fn negotiate(banner: &[u8; 12]) -> BuildResult<Self> {
        let text = std::str::from_utf8(banner)
            .map_err(|_| BuildError::Vnc("malformed protocol version".into()))?;
        let parsed = text
            .strip_prefix("RFB ")
            .and_then(|v| v.trim_end().split_once('.'))
            .and_then(|(major, minor)| Some((major.parse::<u32>().ok()?, minor.parse::<u32>().ok()?)));
        let (major, minor) = parsed
            .ok_or_else(|| BuildError::Vnc(format!("malformed protocol version {:?}", text)))?;

        Ok(match (major, minor) {
            (3, m) if m >= 8 => RfbVersion::V3_8,
            (3, 7) => RfbVersion::V3_7,
            (3, _) => RfbVersion::V3_3,
            (m, _) if m > 3 => RfbVersion::V3_8,
            _ => {
                return Err(BuildError::Vnc(format!(
                    "unsupported protocol version {}.{}",
                    major, minor
                )));
            }
        })
    }
}

/// Keyboard channel over an RFB connection.
pub struct VncClient<S = TcpStream> {
    stream: S,
    version: RfbVersion,
    desktop_name: String,
}

impl VncClient<TcpStream> {
    /// Connect to the VM's remote display and complete the handshake.
    pub async fn connect(addr: SocketAddr) -> BuildResult<Self> {
        tracing::debug!(%addr, "Connecting to VNC");
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| BuildError::Vnc(format!("timed out connecting to {}", addr)))?
            .map_err(|e| BuildError::Vnc(format!("Error connecting to VNC: {}", e)))?;
        Self::handshake(stream).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> VncClient<S> {
    /// Run the RFB handshake on an established stream: version, security
    /// type None, shared ClientInit, ServerInit. A server that stalls
    /// anywhere in the exchange fails after a fixed deadline.
    pub async fn handshake(stream: S) -> BuildResult<Self> {
        tokio::time::timeout(HANDSHAKE_TIMEOUT, Self::negotiate_session(stream))
            .await
            .map_err(|_| {
                BuildError::Vnc(format!(
                    "timed out after {}s waiting for the VNC handshake",
                    HANDSHAKE_TIMEOUT.as_secs()
                ))
            })?
    }

    async fn negotiate_session(mut stream: S) -> BuildResult<Self> {
        let mut banner = [0u8; 12];
        stream.read_exact(&mut banner).await.map_err(vnc_io)?;
        let version = RfbVersion::negotiate(&banner)?;
        stream.write_all(version.banner()).await.map_err(vnc_io)?;

        if version == RfbVersion::V3_3 {
            let security = stream.read_u32().await.map_err(vnc_io)?;
            if security == SECURITY_INVALID {
                let reason = read_reason(&mut stream).await?;
                return Err(BuildError::Vnc(format!("connection refused: {}", reason)));
            }
            if security != u32::from(SECURITY_NONE) {
                return Err(BuildError::Vnc(format!(
                    "unsupported security type {}",
                    security
                )));
            }
        } else {
            let count = stream.read_u8().await.map_err(vnc_io)?;
            if count == 0 {
                let reason = read_reason(&mut stream).await?;
                return Err(BuildError::Vnc(format!("connection refused: {}", reason)));
            }
            let mut types = vec![0u8; usize::from(count)];
            stream.read_exact(&mut types).await.map_err(vnc_io)?;
            if !types.contains(&SECURITY_NONE) {
                return Err(BuildError::Vnc(format!(
                    "no supported security type offered: {:?}",
                    types
                )));
            }
            stream.write_u8(SECURITY_NONE).await.map_err(vnc_io)?;

            if version == RfbVersion::V3_8 {
                let result = stream.read_u32().await.map_err(vnc_io)?;
                if result != 0 {
                    let reason = read_reason(&mut stream).await?;
                    return Err(BuildError::Vnc(format!("security handshake failed: {}", reason)));
                }
            }
        }

        // ClientInit: share the desktop with other viewers.
        stream.write_u8(1).await.map_err(vnc_io)?;

        // ServerInit: width, height, 16-byte pixel format, then the name.
        let mut init = [0u8; 20];
        stream.read_exact(&mut init).await.map_err(vnc_io)?;
        let desktop_name = read_reason(&mut stream).await?;

        tracing::debug!(?version, desktop = %desktop_name, "VNC handshake complete");
        Ok(Self {
            stream,
            version,
            desktop_name,
        })
    }

    pub fn version(&self) -> RfbVersion {
        self.version
    }

    pub fn desktop_name(&self) -> &str {
        &self.desktop_name
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> KeyboardChannel for VncClient<S> {
    async fn key_event(&mut self, keysym: u32, down: bool) -> BuildResult<()> {
        let mut msg = [0u8; 8];
        msg[0] = MSG_KEY_EVENT;
        msg[1] = u8::from(down);
        msg[4..].copy_from_slice(&keysym.to_be_bytes());
        self.stream.write_all(&msg).await.map_err(vnc_io)?;
        self.stream.flush().await.map_err(vnc_io)
    }
}

/// Length-prefixed string, as used for failure reasons and the desktop name.
async fn read_reason<S: AsyncRead + Unpin>(stream: &mut S) -> BuildResult<String> {
    let len = stream.read_u32().await.map_err(vnc_io)?;
    let mut buf = vec![0u8; len.min(64 * 1024) as usize];
    stream.read_exact(&mut buf).await.map_err(vnc_io)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn vnc_io(e: std::io::Error) -> BuildError {
    BuildError::Vnc(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn server_init<S: AsyncWrite + Unpin>(server: &mut S) {
        let mut init = vec![0u8; 20];
        init[0..2].copy_from_slice(&640u16.to_be_bytes());
        init[2..4].copy_from_slice(&480u16.to_be_bytes());
        server.write_all(&init).await.unwrap();
        server.write_u32(6).await.unwrap();
        server.write_all(b"packer").await.unwrap();
    }

    #[test]
    fn test_negotiate_version() {
        assert_eq!(RfbVersion::negotiate(b"RFB 003.008\n").unwrap(), RfbVersion::V3_8);
        assert_eq!(RfbVersion::negotiate(b"RFB 003.007\n").unwrap(), RfbVersion::V3_7);
        assert_eq!(RfbVersion::negotiate(b"RFB 003.003\n").unwrap(), RfbVersion::V3_3);
        assert_eq!(RfbVersion::negotiate(b"RFB 003.889\n").unwrap(), RfbVersion::V3_8);
        assert!(RfbVersion::negotiate(b"HTTP/1.1 200").is_err());
    }

    #[tokio::test]
    async fn test_handshake_3_8_and_key_event() {
        let (client, mut server) = duplex(1024);

        let server_task = tokio::spawn(async move {
            server.write_all(b"RFB 003.008\n").await.unwrap();
            let mut banner = [0u8; 12];
            server.read_exact(&mut banner).await.unwrap();
            assert_eq!(&banner, b"RFB 003.008\n");

            server.write_all(&[2, 2, 1]).await.unwrap();
            assert_eq!(server.read_u8().await.unwrap(), SECURITY_NONE);
            server.write_u32(0).await.unwrap();

            assert_eq!(server.read_u8().await.unwrap(), 1);
            server_init(&mut server).await;

            let mut msg = [0u8; 8];
            server.read_exact(&mut msg).await.unwrap();
            msg
        });

        let mut vnc = VncClient::handshake(client).await.unwrap();
        assert_eq!(vnc.version(), RfbVersion::V3_8);
        assert_eq!(vnc.desktop_name(), "packer");

        vnc.key_event(0xff0d, true).await.unwrap();
        let msg = server_task.await.unwrap();
        assert_eq!(msg, [4, 1, 0, 0, 0x00, 0x00, 0xff, 0x0d]);
    }

    #[tokio::test]
    async fn test_handshake_3_3() {
        let (client, mut server) = duplex(1024);

        tokio::spawn(async move {
            server.write_all(b"RFB 003.003\n").await.unwrap();
            let mut banner = [0u8; 12];
            server.read_exact(&mut banner).await.unwrap();
            server.write_u32(1).await.unwrap();
            server.read_u8().await.unwrap();
            server_init(&mut server).await;
            // Keep the stream open until the client is done.
            let _ = server.read_u8().await;
        });

        let vnc = VncClient::handshake(client).await.unwrap();
        assert_eq!(vnc.version(), RfbVersion::V3_3);
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let (client, mut server) = duplex(1024);

        tokio::spawn(async move {
            server.write_all(b"RFB 003.008\n").await.unwrap();
            let mut banner = [0u8; 12];
            server.read_exact(&mut banner).await.unwrap();
            server.write_u8(0).await.unwrap();
            server.write_u32(4).await.unwrap();
            server.write_all(b"busy").await.unwrap();
            let _ = server.read_u8().await;
        });

        let err = VncClient::handshake(client).await.err().unwrap();
        assert!(err.to_string().contains("busy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_server_times_out() {
        // Accepts the connection but never sends the protocol banner.
        let (client, _server) = duplex(1024);

        let start = tokio::time::Instant::now();
        let err = VncClient::handshake(client).await.err().unwrap();
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() >= HANDSHAKE_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_server_init_times_out() {
        let (client, mut server) = duplex(1024);

        tokio::spawn(async move {
            server.write_all(b"RFB 003.003\n").await.unwrap();
            let mut banner = [0u8; 12];
            server.read_exact(&mut banner).await.unwrap();
            server.write_u32(1).await.unwrap();
            server.read_u8().await.unwrap();
            // No ServerInit; hold the stream open.
            std::future::pending::<()>().await;
        });

        let err = VncClient::handshake(client).await.err().unwrap();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_password_only_server_rejected() {
        let (client, mut server) = duplex(1024);

        tokio::spawn(async move {
            server.write_all(b"RFB 003.007\n").await.unwrap();
            let mut banner = [0u8; 12];
            server.read_exact(&mut banner).await.unwrap();
            server.write_all(&[1, 2]).await.unwrap();
            let _ = server.read_u8().await;
        });

        let err = VncClient::handshake(client).await.err().unwrap();
        assert!(err.to_string().contains("no supported security type"));
    }
}
