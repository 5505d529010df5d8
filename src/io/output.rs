//! Append-only text output of a run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

enum Sink {
    Disabled,
    File(BufWriter<File>),
    Memory(Vec<u8>),
}

/// A text sink: a file, an in-memory buffer, or nothing at all.
pub struct OutputFile {
    sink: Sink,
    auto_flush: bool,
}

impl OutputFile {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self {
            sink: Sink::File(BufWriter::new(file)),
            auto_flush: false,
        })
    }

    /// Swallows everything written to it.
    pub fn disabled() -> Self {
        Self {
            sink: Sink::Disabled,
            auto_flush: false,
        }
    }

    /// Keeps everything in memory, see [`OutputFile::contents`].
    pub fn memory() -> Self {
        Self {
            sink: Sink::Memory(Vec::new()),
            auto_flush: false,
        }
    }

    /// Flush after every write.
    pub fn auto_flush(mut self) -> Self {
        self.auto_flush = true;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.sink, Sink::Disabled)
    }

    /// Write `text` followed by a newline.
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        match &mut self.sink {
            Sink::Disabled => return Ok(()),
            Sink::File(w) => writeln!(w, "{}", text)?,
            Sink::Memory(buf) => writeln!(buf, "{}", text)?,
        }
        if self.auto_flush {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Sink::File(w) = &mut self.sink {
            w.flush()?;
        }
        Ok(())
    }

    /// Text written so far to an in-memory sink; empty for other sinks.
    pub fn contents(&self) -> String {
        match &self.sink {
            Sink::Memory(buf) => String::from_utf8_lossy(buf).into_owned(),
            _ => String::new(),
        }
    }
}

/// The output files of one rank.
///
/// `progress` and `evolution` only exist on the root rank; every rank keeps
/// its own `error_<rank>` and `wavefunction_<rank>`.
pub struct RunOutputs {
    pub progress: OutputFile,
    pub evolution: OutputFile,
    pub wavefunction: OutputFile,
    pub error: OutputFile,
}

impl RunOutputs {
    pub fn open(dir: impl AsRef<Path>, rank: usize) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let (progress, evolution) = if rank == 0 {
            (
                OutputFile::create(dir.join("progress"))?,
                OutputFile::create(dir.join("evolution"))?,
            )
        } else {
            (OutputFile::disabled(), OutputFile::disabled())
        };
        Ok(Self {
            progress,
            evolution,
            wavefunction: OutputFile::create(dir.join(format!("wavefunction_{}", rank)))?,
            error: OutputFile::create(dir.join(format!("error_{}", rank)))?.auto_flush(),
        })
    }

    /// All four sinks kept in memory.
    pub fn in_memory() -> Self {
        Self {
            progress: OutputFile::memory(),
            evolution: OutputFile::memory(),
            wavefunction: OutputFile::memory(),
            error: OutputFile::memory(),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.error.flush()?;
        self.progress.flush()?;
        self.evolution.flush()?;
        self.wavefunction.flush()
    }
}
