use std::fs;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tracing::debug;

/// Where annotated output goes: STDOUT, a plain file, or a gzip-compressed file
pub enum OutputWriter {
    Stdout(io::Stdout),
    File(io::BufWriter<fs::File>),
    Gzip(GzEncoder<io::BufWriter<fs::File>>),
}

impl OutputWriter {
    /// Open `path` for writing. `-` writes to STDOUT and a `.gz` extension compresses.
    pub fn create(path: &Path) -> io::Result<Self> {
        if path == Path::new("-") {
            return Ok(Self::Stdout(io::stdout()));
        }
        let handle = io::BufWriter::new(fs::File::create(path)?);
        let compressed = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
        debug!("Writing to {} (compressed? {compressed})", path.display());
        if compressed {
            Ok(Self::Gzip(GzEncoder::new(handle, Compression::best())))
        } else {
            Ok(Self::File(handle))
        }
    }

    /// Flush everything and write the gzip trailer if there is one
    pub fn close(self) -> io::Result<()> {
        match self {
            Self::Stdout(mut handle) => handle.flush(),
            Self::File(mut handle) => handle.flush(),
            Self::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(handle) => handle.write(buf),
            Self::File(handle) => handle.write(buf),
            Self::Gzip(handle) => handle.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(handle) => handle.flush(),
            Self::File(handle) => handle.flush(),
            Self::Gzip(handle) => handle.flush(),
        }
    }
}

/// Serialize `value` as JSON to `path`
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let mut writer = OutputWriter::create(path)?;
    serde_json::to_writer_pretty(&mut writer, value).map_err(io::Error::from)?;
    writer.write_all(b"\n")?;
    writer.close()
}
