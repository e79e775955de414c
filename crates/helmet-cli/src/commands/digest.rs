//! Digest command - print the canonical digest of a directory

use helmet_core::digest_dir;
use std::path::Path;

use crate::error::{CliError, Result};

pub fn run(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(CliError::validation(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    println!("{}", digest_dir(dir)?);
    Ok(())
}
