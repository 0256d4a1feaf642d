//! Request bodies.
//!
//! A body is either an in-memory buffer or a reader. Readers may declare
//! their size and may support seeking; both facts drive how the translator
//! ships the body (inline vs. streamed upload).

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use bytes::Bytes;

/// A reader that can also seek.
pub trait SeekRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekRead for T {}

/// Request body with a known-or-unknown size.
pub struct Body {
    kind: Kind,
}

enum Kind {
    Bytes(Bytes),
    Reader {
        inner: Box<dyn Read + Send>,
        size: Option<u64>,
    },
    Seekable {
        inner: Box<dyn SeekRead>,
        size: Option<u64>,
    },
}

impl Body {
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    /// A forward-only reader. `size` is `None` when the length is unknown.
    pub fn from_reader<R>(reader: R, size: Option<u64>) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            kind: Kind::Reader {
                inner: Box::new(reader),
                size,
            },
        }
    }

    /// A reader that can be rewound before it is sent.
    pub fn from_seekable<R>(reader: R, size: Option<u64>) -> Self
    where
        R: Read + Seek + Send + 'static,
    {
        Self {
            kind: Kind::Seekable {
                inner: Box::new(reader),
                size,
            },
        }
    }

    /// A file body; its size is taken from the file metadata.
    pub fn from_file(file: File) -> io::Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self::from_seekable(file, Some(size)))
    }

    /// Declared body size, if known.
    pub fn size(&self) -> Option<u64> {
        match &self.kind {
            Kind::Bytes(bytes) => Some(bytes.len() as u64),
            Kind::Reader { size, .. } | Kind::Seekable { size, .. } => *size,
        }
    }

    pub fn is_seekable(&self) -> bool {
        !matches!(self.kind, Kind::Reader { .. })
    }

    /// Seek back to the start. Forward-only readers are left as they are.
    pub fn rewind(&mut self) -> io::Result<()> {
        if let Kind::Seekable { inner, .. } = &mut self.kind {
            inner.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    /// Read the whole body into memory. Readers with a declared size are
    /// read up to that size only.
    pub fn into_bytes(mut self) -> io::Result<Bytes> {
        self.rewind()?;
        match self.kind {
            Kind::Bytes(bytes) => Ok(bytes),
            Kind::Reader { inner, size } => read_all(inner, size),
            Kind::Seekable { inner, size } => read_all(inner, size),
        }
    }

    /// Turn the body into a plain reader for streamed uploads.
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        match self.kind {
            Kind::Bytes(bytes) => Box::new(io::Cursor::new(bytes)),
            Kind::Reader { inner, .. } => inner,
            Kind::Seekable { inner, .. } => Box::new(inner),
        }
    }
}

fn read_all<R: Read>(reader: R, size: Option<u64>) -> io::Result<Bytes> {
    let mut buf = Vec::with_capacity(size.unwrap_or(0) as usize);
    match size {
        Some(limit) => reader.take(limit).read_to_end(&mut buf)?,
        None => {
            let mut reader = reader;
            reader.read_to_end(&mut buf)?
        }
    };
    Ok(Bytes::from(buf))
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self {
            kind: Kind::Bytes(bytes),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(buf: Vec<u8>) -> Self {
        Self::from(Bytes::from(buf))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(buf: &'static [u8]) -> Self {
        Self::from(Bytes::from_static(buf))
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            Kind::Bytes(_) => "bytes",
            Kind::Reader { .. } => "reader",
            Kind::Seekable { .. } => "seekable",
        };
        f.debug_struct("Body")
            .field("kind", &kind)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_bytes_body() {
        let body = Body::from("hello");
        assert_eq!(body.size(), Some(5));
        assert!(body.is_seekable());
        assert_eq!(body.into_bytes().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_reader_body_is_not_seekable() {
        let body = Body::from_reader(Cursor::new(vec![1u8; 4]), None);
        assert_eq!(body.size(), None);
        assert!(!body.is_seekable());
    }

    #[test]
    fn test_seekable_body_rewinds_before_reading() {
        let mut cursor = Cursor::new(b"abcdef".to_vec());
        cursor.set_position(4);
        let body = Body::from_seekable(cursor, Some(6));
        assert_eq!(body.into_bytes().unwrap(), Bytes::from_static(b"abcdef"));
    }

    #[test]
    fn test_declared_size_bounds_read() {
        let body = Body::from_reader(Cursor::new(b"abcdef".to_vec()), Some(3));
        assert_eq!(body.into_bytes().unwrap(), Bytes::from_static(b"abc"));
    }
}
