use bytes::{BufMut, Bytes, BytesMut};

use crate::{AppError, AppResult};

const USER_PREFIX: &[u8] = b"user=";
const IMAGE_PREFIX: &[u8] = b"img=";
/// Marks the end of a posting for the handler on the other side.
pub const SENTINEL: &[u8] = b":\n:\n";

/// A single bulletin board entry as sent by the client.
///
/// Field contents are passed through verbatim. A field that itself contains
/// the `":\n:\n"` sentinel makes the framing ambiguous; nothing guards
/// against that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    user: String,
    image_url: Option<String>,
    message: String,
}

impl Posting {
    pub fn new(
        user: impl Into<String>,
        image_url: Option<String>,
        message: impl Into<String>,
    ) -> AppResult<Posting> {
        let user = user.into();
        if user.is_empty() {
            return Err(AppError::InvalidValue("user must not be empty".into()));
        }
        Ok(Posting {
            user,
            image_url,
            message: message.into(),
        })
    }

    /// Exact number of bytes [`encode`] produces for this posting.
    pub fn encoded_len(&self) -> usize {
        let image_len = self
            .image_url
            .as_ref()
            .map_or(0, |url| IMAGE_PREFIX.len() + url.len() + 1);
        USER_PREFIX.len() + self.user.len() + 1 + image_len + self.message.len() + 1 + SENTINEL.len()
    }
}

/// Lays out a posting on the wire:
///
/// ```text
/// user=<user>\n
/// img=<image url>\n      (only with an image url)
/// <message>\n
/// :\n
/// :\n
/// ```
pub fn encode(posting: &Posting) -> Bytes {
    let len = posting.encoded_len();
    let mut buf = BytesMut::with_capacity(len);

    buf.put_slice(USER_PREFIX);
    buf.put_slice(posting.user.as_bytes());
    buf.put_u8(b'\n');
    if let Some(url) = &posting.image_url {
        buf.put_slice(IMAGE_PREFIX);
        buf.put_slice(url.as_bytes());
        buf.put_u8(b'\n');
    }
    buf.put_slice(posting.message.as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(SENTINEL);

    debug_assert_eq!(buf.len(), len);
    buf.freeze()
}
