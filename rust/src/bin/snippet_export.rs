use anyhow::{Context, Result};
use clap::Parser;
use fragment_editor::snippet::{export, write_snippets};
use fragment_editor::{JsonFileStore, Store};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "snippet_export", version, about = "Write a fragment store as editor snippet JSON")]
struct Cli {
    /// Fragment store file
    #[arg(long, value_name = "file")]
    store: PathBuf,

    /// Only export fragments carrying this tag
    #[arg(long, value_name = "string")]
    tag: Option<String>,

    /// Output file for the snippet JSON (default stdout)
    #[arg(long, value_name = "file")]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = JsonFileStore::open(&cli.store)
        .with_context(|| format!("Failed to open {}", cli.store.display()))?;
    let fragments: Vec<_> = store
        .get_fragments()
        .into_iter()
        .filter(|f| cli.tag.as_deref().map_or(true, |t| f.tags.contains(t)))
        .collect();
    let snippets = export(&fragments);

    match cli.out {
        Some(p) => {
            let f = File::create(&p).with_context(|| format!("Failed to create {}", p.display()))?;
            write_snippets(&snippets, &mut BufWriter::new(f))?;
        }
        None => {
            let mut out = io::stdout().lock();
            write_snippets(&snippets, &mut out)?;
        }
    }
    Ok(())
}
