use std::io::Read as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use patchview::patch::{Line, LineKind, parse_patch};
use patchview::render::{split_rows, unified_lines};
use patchview::{DiffView, GitIndexStager, HunkStager};

#[derive(Parser)]
#[command(name = "patchview")]
#[command(about = "Render unified diffs and stage hunks against a git index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a diff read from FILE or stdin
    Show {
        /// Diff file to read (stdin when omitted)
        file: Option<PathBuf>,
        /// Side-by-side rendering instead of unified
        #[arg(long)]
        split: bool,
    },
    /// Apply one hunk of the diff to the repository index
    Stage {
        /// Zero-based hunk index within the first file section
        #[arg(long)]
        hunk: usize,
        /// Repository to stage into
        #[arg(long, default_value = ".")]
        repo: String,
        /// Diff file to read (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Remove one previously applied hunk from the repository index
    Unstage {
        /// Zero-based hunk index within the first file section
        #[arg(long)]
        hunk: usize,
        /// Repository to unstage from
        #[arg(long, default_value = ".")]
        repo: String,
        /// Diff file to read (stdin when omitted)
        file: Option<PathBuf>,
    },
}

fn read_input(file: Option<&PathBuf>) -> Result<String, std::io::Error> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn number(value: Option<u32>) -> String {
    value.map_or_else(String::new, |n| n.to_string())
}

fn print_unified(text: &str) {
    for file in parse_patch(text) {
        for entry in unified_lines(&file, None) {
            match entry.line.kind {
                LineKind::Header => println!("{}", entry.line.content),
                kind => {
                    let marker = match kind {
                        LineKind::Addition => '+',
                        LineKind::Deletion => '-',
                        _ => ' ',
                    };
                    println!(
                        "{:>5} {:>5} {}{}",
                        number(entry.line.old_line),
                        number(entry.line.new_line),
                        marker,
                        entry.line.content
                    );
                }
            }
        }
    }
}

fn cell(line: Option<&Line>, old_side: bool) -> (String, String) {
    match line {
        Some(line) => {
            let num = if old_side { line.old_line } else { line.new_line };
            (number(num), line.content.clone())
        }
        None => (String::new(), String::new()),
    }
}

fn print_split(text: &str) {
    for file in parse_patch(text) {
        println!("{} -> {}", file.old_file, file.new_file);
        for hunk in &file.hunks {
            println!("{}", hunk.header);
            let rows = split_rows(hunk);
            let width = rows
                .iter()
                .filter_map(|r| r.left.as_ref().map(|l| l.content.len()))
                .max()
                .unwrap_or(0)
                .max(8);
            for row in rows {
                let (left_num, left_text) = cell(row.left.as_ref(), true);
                let (right_num, right_text) = cell(row.right.as_ref(), false);
                println!("{left_num:>5} {left_text:<width$} | {right_num:>5} {right_text}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show { file, split } => {
            let text = read_input(file.as_ref())?;
            if split {
                print_split(&text);
            } else {
                print_unified(&text);
            }
        }
        Commands::Stage { hunk, repo, file } => {
            let text = read_input(file.as_ref())?;
            let view = DiffView::open(&text, GitIndexStager::new(repo));
            view.stage(hunk).await?;
        }
        Commands::Unstage { hunk, repo, file } => {
            // A fresh invocation has no staging state to consult, so this
            // talks to the collaborator directly instead of the per-view
            // controller.
            let text = read_input(file.as_ref())?;
            let files = parse_patch(&text);
            let Some(patch) = files.first() else {
                return Err("no parseable diff in input".into());
            };
            let Some(target) = patch.hunks.get(hunk) else {
                return Err(format!("no hunk at index {hunk}").into());
            };
            let stager = GitIndexStager::new(repo);
            stager.unstage_hunk(patch.path(), &target.to_string()).await?;
        }
    }

    Ok(())
}
