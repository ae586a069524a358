// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::Result;
use cp_r::CopyOptions;
use fs_err as fs;

/// Returns the directory of the MolStat demo suite shipped with the repository.
pub fn molstat_demo_dir() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/molstat")
}

/// A suite directory in a temporary location, removed on drop.
///
/// Each test gets its own copy so that reports and edited manifests don't collide.
#[derive(Debug)]
pub struct TempSuite {
    // Held for its Drop impl.
    _temp_dir: Utf8TempDir,
    root: Utf8PathBuf,
}

impl TempSuite {
    /// Creates an empty suite directory.
    pub fn new() -> Result<Self> {
        let temp_dir = camino_tempfile::Builder::new()
            .prefix("fitcheck-suite-")
            .tempdir()?;
        let root = temp_dir.path().to_owned();
        Ok(Self {
            _temp_dir: temp_dir,
            root,
        })
    }

    /// Creates a copy of the MolStat demo suite.
    pub fn molstat_demo() -> Result<Self> {
        let suite = Self::new()?;
        CopyOptions::new().copy_tree(molstat_demo_dir(), &suite.root)?;
        Ok(suite)
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join("fitcheck.toml")
    }

    /// Writes a file relative to the suite root, creating parent directories as needed.
    pub fn write_file(&self, rel_path: impl AsRef<Utf8Path>, contents: &str) -> Result<Utf8PathBuf> {
        let path = self.root.join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Replaces the suite's manifest.
    pub fn write_manifest(&self, contents: &str) -> Result<Utf8PathBuf> {
        self.write_file("fitcheck.toml", contents)
    }
}
