use std::path::Path;

use speedkit_bundle::game;
use tracing::info;
use walkdir::WalkDir;

pub fn detect(directory: &Path) -> anyhow::Result<()> {
    let game = game::detect(directory)?;
    println!("{game}");
    Ok(())
}

pub fn scan(directory: &Path) -> anyhow::Result<()> {
    let game = game::detect(directory)?;
    info!("Detected game: {game}");

    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_bundle = entry
            .path()
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("bun"));
        if !is_bundle {
            continue;
        }
        println!("{:>12} {}", entry.metadata()?.len(), entry.path().display());
    }

    Ok(())
}
