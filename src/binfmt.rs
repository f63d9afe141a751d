//! Native binary container: magic + version header followed by little-endian
//! length-prefixed sections. Shared by the vocabulary, dictionary and topic
//! model persistence code.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

pub const MAGIC_VOCABULARY: &[u8; 4] = b"TTRV";
pub const MAGIC_DICTIONARY: &[u8; 4] = b"TTRD";
pub const MAGIC_TOPIC_MODEL: &[u8; 4] = b"TTRM";

pub const FORMAT_VERSION: u16 = 1;

/// True when the extension asks for the JSON representation.
pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Reads the first four bytes of `path`, if there are that many.
pub fn sniff_magic(path: &Path) -> Result<Option<[u8; 4]>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(Some(magic)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub struct SectionWriter<W: Write> {
    inner: W,
}

impl<W: Write> SectionWriter<W> {
    /// Writes the magic + version header and returns the writer.
    pub fn new(mut inner: W, magic: &[u8; 4]) -> Result<Self> {
        inner.write_all(magic)?;
        inner.write_all(&FORMAT_VERSION.to_le_bytes())?;
        Ok(Self { inner })
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_u64(bytes.len() as u64)?;
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_bytes(s.as_bytes())
    }

    pub fn write_opt_str(&mut self, s: Option<&str>) -> Result<()> {
        match s {
            Some(s) => {
                self.write_u64(1)?;
                self.write_str(s)
            }
            None => self.write_u64(0),
        }
    }

    pub fn write_f64_slice(&mut self, values: &[f64]) -> Result<()> {
        self.write_u64(values.len() as u64)?;
        for v in values {
            self.write_f64(*v)?;
        }
        Ok(())
    }

    pub fn write_u64_slice(&mut self, values: &[u64]) -> Result<()> {
        self.write_u64(values.len() as u64)?;
        for v in values {
            self.write_u64(*v)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[derive(Debug)]
pub struct SectionReader<R: Read> {
    inner: R,
}

impl<R: Read> SectionReader<R> {
    /// Checks the magic + version header and returns the reader.
    pub fn new(mut inner: R, magic: &[u8; 4]) -> Result<Self> {
        let mut found = [0u8; 4];
        inner.read_exact(&mut found)?;
        if &found != magic {
            return Err(Error::invalid_input(format!(
                "bad magic {found:?}, expected {magic:?}"
            )));
        }
        let mut version = [0u8; 2];
        inner.read_exact(&mut version)?;
        let version = u16::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(Error::invalid_input(format!(
                "unsupported format version {version}"
            )));
        }
        Ok(Self { inner })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u64()? as usize;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_str(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| Error::invalid_input(format!("non-utf8 string: {e}")))
    }

    pub fn read_opt_str(&mut self) -> Result<Option<String>> {
        match self.read_u64()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_str()?)),
            other => Err(Error::invalid_input(format!(
                "bad option discriminant {other}"
            ))),
        }
    }

    pub fn read_f64_vec(&mut self) -> Result<Vec<f64>> {
        let len = self.read_u64()? as usize;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(self.read_f64()?);
        }
        Ok(values)
    }

    pub fn read_u64_vec(&mut self) -> Result<Vec<u64>> {
        let len = self.read_u64()? as usize;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(self.read_u64()?);
        }
        Ok(values)
    }
}
