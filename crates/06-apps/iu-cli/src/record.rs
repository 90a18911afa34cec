//! Writes tapped messages as NDJSON, one [`runtime::TapSummary`] per line.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use runtime::TapRecord;

const MESSAGES_FILE: &str = "messages.ndjson";

pub struct Recorder {
    dir: PathBuf,
    done: Sender<()>,
    worker: JoinHandle<Result<u64>>,
}

impl Recorder {
    /// Starts recording `taps` into a fresh `root/run_N` directory.
    pub fn start(root: &Path, taps: Receiver<TapRecord>) -> Result<Self> {
        let dir = next_run_dir(root)?;
        let path = dir.join(MESSAGES_FILE);
        let file = File::create(&path).with_context(|| format!("failed to create {path:?}"))?;
        let (done, done_rx) = bounded(1);
        let worker = thread::Builder::new()
            .name("iu-recorder".to_owned())
            .spawn(move || record(BufWriter::new(file), &taps, &done_rx))
            .context("failed to spawn recorder")?;
        tracing::info!(dir = %dir.display(), "recording taps");
        Ok(Self { dir, done, worker })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes whatever is still queued and returns the number of records.
    pub fn finish(self) -> Result<u64> {
        // The worker may already have stopped on a write error.
        let _ = self.done.send(());
        match self.worker.join() {
            Ok(result) => result,
            Err(_) => anyhow::bail!("recorder thread panicked"),
        }
    }
}

fn record(
    mut out: BufWriter<File>,
    taps: &Receiver<TapRecord>,
    done: &Receiver<()>,
) -> Result<u64> {
    let mut written = 0;
    loop {
        select! {
            recv(taps) -> record => match record {
                Ok(record) => {
                    write_line(&mut out, &record)?;
                    written += 1;
                }
                Err(_) => break,
            },
            recv(done) -> _ => {
                for record in taps.try_iter() {
                    write_line(&mut out, &record)?;
                    written += 1;
                }
                break;
            }
        }
    }
    out.flush()?;
    Ok(written)
}

fn write_line(out: &mut impl Write, record: &TapRecord) -> Result<()> {
    serde_json::to_writer(&mut *out, &record.summary())?;
    out.write_all(b"\n")?;
    Ok(())
}

/// First `root/run_N` that does not exist yet, created.
fn next_run_dir(root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(root).with_context(|| format!("failed to create {root:?}"))?;
    let mut n = 0u32;
    loop {
        let dir = root.join(format!("run_{n}"));
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
            Err(err) => return Err(err).with_context(|| format!("failed to create {dir:?}")),
        }
    }
}
