//! `shelfscan files`: list saved artifacts, newest first.

use std::path::PathBuf;

use {
    anyhow::Result,
    chrono::{DateTime, Local},
    shelfscan_config::ShelfscanConfig,
    shelfscan_engine::ArtifactStore,
};

pub fn handle_files(config: &ShelfscanConfig, output_dir: Option<PathBuf>) -> Result<()> {
    let mut store = ArtifactStore::new(&config.output);
    if let Some(dir) = output_dir {
        store = store.with_dir(dir);
    }

    let files = store.list()?;
    if files.is_empty() {
        println!("No artifacts in {}.", store.dir().display());
        return Ok(());
    }

    for file in &files {
        let modified = file
            .modified
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<9} {:>10}  {modified}  {}",
            file.kind.to_string(),
            human_size(file.bytes),
            file.path.display()
        );
    }
    Ok(())
}

fn human_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KiB", b as f64 / 1024.0),
        b => format!("{b} B"),
    }
}
