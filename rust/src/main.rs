use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use fragment_editor::config::EditorConfig;
use fragment_editor::parametrize::{Cascade, SelectionInput};
use fragment_editor::provider::rejection_status;
use fragment_editor::snippet;
use fragment_editor::{
    AddOutcome, ContextValue, DeleteOutcome, FragmentEdit, FragmentProvider, JsonFileStore, Node,
    Position, Selection, Status,
};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fragment-editor")]
#[command(about = "Capture, tag and browse reusable code fragments")]
#[command(version, propagate_version = true)]
struct Cli {
    /// Fragment store (JSON); overrides config and FRAGMENT_EDITOR_STORE
    #[arg(long, global = true, value_name = "FILE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a fragment, optionally from a file selection
    Add {
        /// Unique fragment label
        label: String,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Skip the typed placeholder tier
        #[arg(long)]
        no_datatypes: bool,
    },
    /// Show the tag tree
    List {
        /// Only show this tag
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Show one fragment
    Show {
        label: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit fragment fields
    Edit {
        label: String,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        scope: Option<String>,
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,
        /// Read the body from a file
        #[arg(long, value_name = "FILE")]
        body_file: Option<PathBuf>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        placeholders: Option<String>,
    },
    /// Add a tag to a fragment
    Tag { label: String, tag: String },
    /// Delete a tree node: removes its tag, or the fragment when none is left
    Untag {
        /// Node label, e.g. "my fragment [TAG:web]"
        node: String,
    },
    /// Delete a fragment
    Delete { label: String },
    /// Preview the parametrization of a selection
    Parametrize {
        #[command(flatten)]
        selection: SelectionArgs,

        #[arg(long)]
        no_datatypes: bool,
    },
    /// Export fragments as editor snippet JSON
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Import a snippet file or a directory of snippet files
    Import { path: PathBuf },
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
struct SelectionArgs {
    /// Source file of the selection
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Selection start as LINE:COL (1-based); defaults to the file start
    #[arg(long, requires = "file")]
    start: Option<String>,

    /// Selection end as LINE:COL (1-based, exclusive); defaults to the file end
    #[arg(long, requires = "file")]
    end: Option<String>,
}

impl SelectionArgs {
    fn input(&self) -> Result<Option<SelectionInput>> {
        let Some(file) = &self.file else {
            return Ok(None);
        };
        let source = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let whole = Selection::all(&source);
        let start = match &self.start {
            Some(s) => parse_position(s)?,
            None => whole.start,
        };
        let end = match &self.end {
            Some(s) => parse_position(s)?,
            None => whole.end,
        };
        Ok(Some(SelectionInput::new(
            file.to_string_lossy(),
            source,
            Selection::new(start, end),
        )))
    }
}

fn parse_position(s: &str) -> Result<Position> {
    let (line, col) = s
        .split_once(':')
        .with_context(|| format!("Expected LINE:COL, got {s:?}"))?;
    let line: usize = line.trim().parse().with_context(|| format!("Bad line in {s:?}"))?;
    let col: usize = col.trim().parse().with_context(|| format!("Bad column in {s:?}"))?;
    if line == 0 || col == 0 {
        bail!("LINE and COL are 1-based: {s:?}");
    }
    Ok(Position::new(line - 1, col - 1))
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fragment_editor=info".parse().expect("valid tracing directive")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = EditorConfig::load_or_default().with_env_overrides();
    if let Some(store) = &cli.store {
        config.store.path = store.to_string_lossy().into_owned();
    }

    if let Commands::Config = cli.command {
        println!(
            "{}",
            format!("# {}", EditorConfig::default_path().display()).dimmed()
        );
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let store = JsonFileStore::open(&config.store.path)
        .with_context(|| format!("Failed to open store {}", config.store.path))?;
    let mut provider = FragmentProvider::new(store);

    match cli.command {
        Commands::Add {
            label,
            selection,
            no_datatypes,
        } => {
            let inferrer = if no_datatypes {
                None
            } else {
                config.parametrize.inferrer()
            };
            provider = provider.with_inferrer(inferrer);
            let input = selection.input()?;
            match provider.add_fragment(Some(&label), input.as_ref()) {
                Ok(outcome) => {
                    print_statuses(outcome.statuses());
                    if let AddOutcome::Added { label, .. } = outcome {
                        println!("{}", format!("Added fragment: {label}").green());
                    }
                }
                Err(e) => {
                    let status = rejection_status(&e);
                    print_statuses(std::slice::from_ref(&status));
                    bail!("{e}");
                }
            }
        }
        Commands::List { tag } => list_tree(&provider, tag.as_deref())?,
        Commands::Show { label, json } => {
            let fragment = provider
                .get_fragment(&label)
                .with_context(|| format!("No fragment labeled {label:?}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&fragment)?);
            } else {
                print!("{}", fragment.tooltip().bold());
                let tags: Vec<&str> = fragment.tags.iter().collect();
                println!("{} {}", "tags:".dimmed(), tags.join(", "));
                println!("{} {}", "prefix:".dimmed(), fragment.prefix);
                println!("{} {}", "scope:".dimmed(), fragment.scope);
                println!("{} {}", "domain:".dimmed(), fragment.domain);
                println!("{} {}", "placeholders:".dimmed(), fragment.placeholders);
                println!("{} {}", "description:".dimmed(), fragment.description);
            }
        }
        Commands::Edit {
            label,
            prefix,
            scope,
            body,
            body_file,
            description,
            keywords,
            domain,
            placeholders,
        } => {
            let body = match body_file {
                Some(path) => Some(
                    fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => body,
            };
            let edit = FragmentEdit {
                prefix,
                scope,
                body,
                description,
                keywords,
                domain,
                placeholders,
            };
            if edit.is_empty() {
                println!("{}", "Nothing to change.".yellow());
                return Ok(());
            }
            provider.edit_fragment(&label, edit)?;
            println!("{}", format!("Updated fragment: {label}").green());
        }
        Commands::Tag { label, tag } => {
            if provider.add_tag(&label, &tag)? {
                println!("{}", format!("Tagged {label} with {tag}").green());
            } else {
                println!("{}", format!("{label} already tagged {tag}").yellow());
            }
        }
        Commands::Untag { node } => {
            let node = provider
                .get_node(&node)
                .with_context(|| format!("No tree node labeled {node:?}"))?;
            match provider.delete_tree_item(&node)? {
                DeleteOutcome::Deleted(label) => {
                    println!("{}", format!("Deleted fragment: {label}").green())
                }
                DeleteOutcome::Untagged { fragment, tag } => {
                    println!("{}", format!("Removed tag {tag} from {fragment}").green())
                }
                DeleteOutcome::Ignored => {
                    println!("{}", format!("Cannot delete node {}", node.label).yellow())
                }
            }
        }
        Commands::Delete { label } => {
            provider.delete_fragment(&label)?;
            println!("{}", format!("Deleted fragment: {label}").green());
        }
        Commands::Parametrize {
            selection,
            no_datatypes,
        } => {
            let input = selection.input()?.context("--file is required")?;
            let inferrer = if no_datatypes {
                None
            } else {
                config.parametrize.inferrer()
            };
            let outcome = Cascade::for_input(&input, inferrer.as_deref()).run(&input)?;
            print_statuses(&outcome.statuses);
            let preview = serde_json::json!({
                "tier": outcome.tier,
                "body": outcome.draft.body,
                "placeholders": outcome.draft.placeholders,
            });
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        Commands::Export { out } => {
            let snippets = provider.export();
            match out {
                Some(p) => {
                    let f = File::create(&p)
                        .with_context(|| format!("Failed to create {}", p.display()))?;
                    snippet::write_snippets(&snippets, &mut BufWriter::new(f))?;
                    println!(
                        "{}",
                        format!("Exported {} snippets to {}", snippets.len(), p.display()).green()
                    );
                }
                None => {
                    let mut out = io::stdout().lock();
                    snippet::write_snippets(&snippets, &mut out)?;
                }
            }
        }
        Commands::Import { path } => {
            let fragments = snippet::import_path(&path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            let report = provider.import(fragments)?;
            for label in &report.skipped {
                println!("  {} {label} (label has to be unique)", "skipped".yellow());
            }
            println!(
                "{}",
                format!(
                    "Imported {} fragments, skipped {}",
                    report.added.len(),
                    report.skipped.len()
                )
                .green()
            );
        }
        Commands::Config => unreachable!("handled before opening the store"),
    }

    Ok(())
}

fn print_statuses(statuses: &[Status]) {
    for status in statuses {
        if status.is_error() {
            eprintln!("{}", status.message.red());
        } else {
            println!("{}", status.message.blue());
        }
    }
}

fn list_tree(provider: &FragmentProvider<JsonFileStore>, only_tag: Option<&str>) -> Result<()> {
    let root = provider.children(None);
    if root.is_empty() {
        println!("{}", "No fragments found.".yellow());
        return Ok(());
    }
    for node in &root {
        if only_tag.is_some_and(|t| t != node.label || node.context_value != ContextValue::Tag) {
            continue;
        }
        print_node(node, 0);
        for child in provider.children(Some(node)) {
            print_node(&child, 1);
        }
    }
    Ok(())
}

fn print_node(node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.context_value {
        ContextValue::Tag => println!("{indent}{} {}", "#".cyan(), node.label.bold().cyan()),
        ContextValue::Fragment => {
            let label = node.fragment.as_deref().unwrap_or(&node.label);
            println!("{indent}{} {label}", "-".dimmed());
        }
    }
}
