//! # Wire Protocol
//!
//! Length-prefixed frames on TCP: a `u32` big-endian length followed by a
//! bincode-encoded [`Request`] or [`Response`]. One request is answered by
//! exactly one response; a channel serializes its calls, so no request ids
//! are needed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use shared_types::{BlockId, FileManifest, PeerDescriptor};

use crate::errors::NetError;

/// Upper bound for one frame. Generous against the ~1 KiB block payloads
/// and manifest lists actually sent.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Calls a peer can make against our transferors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Liveness probe; must never fail on a live connection.
    Ping,
    /// Who is serving this port?
    ServerIdentity,
    /// `ByteTransferor`: fetch one block.
    GetBlock { id: BlockId },
    /// `ManifestTransferor`: store an updated manifest.
    PushManifest { manifest: FileManifest },
    /// `ManifestTransferor`: announce the caller's server so this node can
    /// register a loop-back connection.
    InitializeCommunication { peer: PeerDescriptor },
}

/// Answers to [`Request`]s, in kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Pong,
    ServerIdentity { peer: PeerDescriptor },
    Block { data: Option<Vec<u8>> },
    ManifestAccepted,
    CommunicationInitialized,
    /// The call failed on the serving side.
    Error { message: String },
}

/// Write one length-prefixed frame.
pub async fn write_frame<T, W>(writer: &mut W, message: &T) -> Result<(), NetError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(NetError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_frame<T, R>(reader: &mut R) -> Result<T, NetError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(NetError::FrameTooLarge {
            len,
            max: MAX_FRAME_BYTES,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}
