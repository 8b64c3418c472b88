//! Size-based rotation for the file log sink (§6): the active file rotates
//! once it exceeds `logMaxBytes`, keeping at most 10 rotated files
//! (`whisper-server.log.1` is the newest rotation, `.10` the oldest).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MAX_ROTATED_FILES: u32 = 10;

pub struct RotatingFileWriter {
    path: PathBuf,
    max_bytes: u64,
    file: File,
    written: u64,
}

impl RotatingFileWriter {
    pub fn new(path: PathBuf, max_bytes: u64) -> io::Result<Self> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self { path, max_bytes, file, written })
    }

    fn rotate(&mut self) -> io::Result<()> {
        for index in (1..MAX_ROTATED_FILES).rev() {
            let src = rotated_path(&self.path, index);
            if src.exists() {
                std::fs::rename(&src, rotated_path(&self.path, index + 1))?;
            }
        }
        if self.path.exists() {
            std::fs::rename(&self.path, rotated_path(&self.path, 1))?;
        }
        self.file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_bytes > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
