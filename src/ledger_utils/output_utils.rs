use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Pretty printed JSON, written next to `path` first and renamed over it once complete.
pub fn dump_json_to_file<T: Serialize + ?Sized>(value: &T, path: &Path) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_path)
            .with_context(|| format!("can't create {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .with_context(|| format!("can't serialize {}", path.display()))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("can't move {} into place", path.display()))?;
    Ok(())
}

pub fn read_json_from_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("can't open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("can't parse {}", path.display()))
}

/// Collects the files of one run in a staging directory inside the output directory.
/// Nothing shows up under its final name until `commit`, so a failed run leaves the previous
/// output (if any) intact.
pub struct OutputWriter {
    output_dir: PathBuf,
    staging_dir: PathBuf,
    staged: Vec<String>,
}

impl OutputWriter {
    const STAGING_DIR: &'static str = ".staging";

    pub fn new(output_dir: &Path) -> anyhow::Result<Self> {
        let staging_dir = output_dir.join(Self::STAGING_DIR);
        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir).with_context(|| {
                format!("can't clean up stale {}", staging_dir.display())
            })?;
        }
        fs::create_dir_all(&staging_dir)
            .with_context(|| format!("can't create {}", staging_dir.display()))?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            staging_dir,
            staged: vec![],
        })
    }

    pub fn write<T: Serialize + ?Sized>(&mut self, file_name: &str, value: &T) -> anyhow::Result<()> {
        dump_json_to_file(value, &self.staging_dir.join(file_name))?;
        tracing::debug!("staged {}", file_name);
        self.staged.push(file_name.to_string());
        Ok(())
    }

    /// Moves every staged file into the output directory and returns their final paths.
    pub fn commit(self) -> anyhow::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.staged.len());
        for file_name in self.staged.iter() {
            let target = self.output_dir.join(file_name);
            fs::rename(self.staging_dir.join(file_name), &target)
                .with_context(|| format!("can't move {} into place", target.display()))?;
            written.push(target);
        }
        fs::remove_dir_all(&self.staging_dir)
            .with_context(|| format!("can't remove {}", self.staging_dir.display()))?;
        Ok(written)
    }
}
