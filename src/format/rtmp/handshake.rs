//! RTMP handshake (C0/C1/C2, S0/S1/S2).
//!
//! The plain (unencrypted, un-digested) handshake: a single version byte
//! plus two 1536-byte blocks exchanged in each direction. Digest-based
//! handshake schemes some servers demand are out of scope.

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, VdkError};

const RTMP_VERSION: u8 = 3;
const HANDSHAKE_SIZE: usize = 1536;

fn random_handshake_body() -> Vec<u8> {
    let mut body = vec![0u8; HANDSHAKE_SIZE];
    body[0..4].copy_from_slice(&0u32.to_be_bytes());
    body[4..8].copy_from_slice(&0u32.to_be_bytes());
    rand::thread_rng().fill_bytes(&mut body[8..]);
    body
}

/// Runs the server side of the handshake: reads C0+C1, writes S0+S1+S2,
/// then reads C2. The echoed `S2` mirrors the peer's C1 body, as real
/// servers do to bypass digest validation on non-conforming clients.
pub async fn server_handshake<S: AsyncRead + AsyncWrite + Unpin + Send>(stream: &mut S) -> Result<()> {
    let mut c0 = [0u8; 1];
    stream.read_exact(&mut c0).await?;
    if c0[0] != RTMP_VERSION {
        return Err(VdkError::ProtocolViolation(format!(
            "unsupported rtmp version {}",
            c0[0]
        )));
    }

    let mut c1 = vec![0u8; HANDSHAKE_SIZE];
    stream.read_exact(&mut c1).await?;

    let s1 = random_handshake_body();
    stream.write_all(&[RTMP_VERSION]).await?;
    stream.write_all(&s1).await?;
    stream.write_all(&c1).await?; // S2 echoes C1
    stream.flush().await?;

    let mut c2 = vec![0u8; HANDSHAKE_SIZE];
    stream.read_exact(&mut c2).await?;
    Ok(())
}

/// Runs the client side of the handshake: writes C0+C1, reads S0+S1+S2,
/// then writes C2 echoing the server's S1 body.
pub async fn client_handshake<S: AsyncRead + AsyncWrite + Unpin + Send>(stream: &mut S) -> Result<()> {
    let c1 = random_handshake_body();
    stream.write_all(&[RTMP_VERSION]).await?;
    stream.write_all(&c1).await?;
    stream.flush().await?;

    let mut s0 = [0u8; 1];
    stream.read_exact(&mut s0).await?;
    if s0[0] != RTMP_VERSION {
        return Err(VdkError::ProtocolViolation(format!(
            "unsupported rtmp version {}",
            s0[0]
        )));
    }

    let mut s1 = vec![0u8; HANDSHAKE_SIZE];
    stream.read_exact(&mut s1).await?;
    let mut s2 = vec![0u8; HANDSHAKE_SIZE];
    stream.read_exact(&mut s2).await?;

    stream.write_all(&s1).await?; // C2 echoes S1
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn client_and_server_handshake_against_each_other() {
        let (mut client_end, mut server_end) = duplex(1 << 16);
        let client = tokio::spawn(async move { client_handshake(&mut client_end).await });
        let server = tokio::spawn(async move { server_handshake(&mut server_end).await });

        let (client_res, server_res) = tokio::join!(client, server);
        client_res.unwrap().unwrap();
        server_res.unwrap().unwrap();
    }
}
