/// Story Linter — validates story structure before it ships.
///
/// Usage: story_linter <story.ron | story_dir> [--strict]

use std::path::Path;
use std::process;

use story_engine::core::lint::lint;
use story_engine::core::story::Story;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_linter <story.ron | story_dir> [--strict]");
        println!("  --strict   treat warnings as errors");
        process::exit(0);
    }

    let target = Path::new(&args[1]);
    let strict = args[2..].iter().any(|a| a == "--strict");

    let mut files = Vec::new();
    if target.is_file() {
        files.push(target.to_path_buf());
    } else if target.is_dir() {
        collect_ron_files(target, &mut files);
        files.sort();
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target.display());
        process::exit(1);
    }

    let mut total_errors = 0;
    let mut total_warnings = 0;

    for path in &files {
        println!("\n=== {} ===\n", path.display());

        let story = match Story::load_from_ron(path) {
            Ok(story) => story,
            Err(e) => {
                println!("ERROR: {}", e);
                total_errors += 1;
                continue;
            }
        };

        println!(
            "Loaded {} nodes, {} endings (start '{}', fallback '{}')",
            story.nodes().len(),
            story.endings().len(),
            story.start(),
            story.fallback_ending()
        );

        let report = lint(&story);
        if report.is_clean() {
            println!("All checks passed!");
        }
        for warning in &report.warnings {
            println!("WARNING: {}", warning);
        }
        for error in &report.errors {
            println!("ERROR: {}", error);
        }

        total_errors += report.errors.len();
        total_warnings += report.warnings.len();
    }

    println!(
        "\nSummary: {} files, {} errors, {} warnings",
        files.len(),
        total_errors,
        total_warnings
    );

    if total_errors > 0 || (strict && total_warnings > 0) {
        process::exit(1);
    }
}

fn collect_ron_files(dir: &Path, files: &mut Vec<std::path::PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_ron_files(&path, files);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                files.push(path);
            }
        }
    }
}
