/// Playtest — interactive shell for playing through a story.
///
/// Usage: playtest <story.ron> [--seed <n>] [--auto <n>]
///
/// Commands:
///   n / next            — advance dialogue
///   <number> | <id>     — pick a visible choice
///   stats               — show attributes and inventory
///   history             — list resolved choices
///   auto                — finish the game with random choices
///   restart             — start a new game
///   help                — list commands
///   quit                — exit

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use story_engine::core::autoplay::{play, random_playthrough};
use story_engine::core::engine::{StoryEngine, View};
use story_engine::core::story::Story;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("story_engine=warn")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let story_path = args[1].clone();
    let mut seed: u64 = 42;
    let mut auto_runs: Option<u64> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--auto" if i + 1 < args.len() => {
                i += 1;
                auto_runs = args[i].parse().ok();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let story = match Story::load_from_ron(Path::new(&story_path)) {
        Ok(story) => Arc::new(story),
        Err(e) => {
            eprintln!("ERROR: Failed to load story: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(runs) = auto_runs {
        run_bulk(story, seed, runs);
        return;
    }

    println!(
        "Loaded {} nodes, {} endings from {}",
        story.nodes().len(),
        story.endings().len(),
        story_path
    );
    println!("Type 'help' for commands.\n");

    let mut engine = StoryEngine::new(story);
    let mut auto_seed = seed;
    print_view(&engine.current_view());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("playtest> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();

        let cmd = if line.is_empty() { "n" } else { line };
        match cmd {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "n" | "next" => print_view(&engine.advance_dialogue()),
            "stats" => {
                let state = engine.playthrough();
                println!("Phase: {:?}", state.phase);
                for (name, value) in state.attributes.iter() {
                    println!("  {}: {}", name, value);
                }
                println!("  items: {:?}", state.inventory.sorted());
            }
            "history" => {
                for (n, id) in engine.playthrough().history.iter().enumerate() {
                    println!("  {}. {}", n + 1, id);
                }
            }
            "restart" => print_view(&engine.start_new_game()),
            "auto" => {
                match play(&mut engine, auto_seed, 1000) {
                    Ok(report) => println!("Autoplayed {} choices.", report.steps),
                    Err(e) => println!("ERROR: {}", e),
                }
                auto_seed = auto_seed.wrapping_add(1);
                print_view(&engine.current_view());
            }
            _ => {
                let view = engine.current_view();
                let ids = view.choice_ids();
                let id = match cmd.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= ids.len() => ids[n - 1].to_string(),
                    _ => cmd.to_string(),
                };
                match engine.resolve_choice(&id) {
                    Ok(view) => print_view(&view),
                    Err(e) => println!("{}. Type 'help' for available commands.", e),
                }
            }
        }
    }
}

fn run_bulk(story: Arc<Story>, seed: u64, runs: u64) {
    let mut endings: BTreeMap<String, usize> = BTreeMap::new();
    let mut stranded = 0;
    let mut fallbacks = 0;
    let mut total_steps = 0;

    for n in 0..runs {
        match random_playthrough(Arc::clone(&story), seed.wrapping_add(n), 1000) {
            Ok(report) => {
                total_steps += report.steps;
                if report.stranded {
                    stranded += 1;
                }
                if report.fallback.is_some() {
                    fallbacks += 1;
                }
                let key = report.ending.unwrap_or_else(|| "(unfinished)".to_string());
                *endings.entry(key).or_insert(0) += 1;
            }
            Err(e) => {
                eprintln!("ERROR: seed {}: {}", seed.wrapping_add(n), e);
            }
        }
    }

    println!("\n=== Autoplay: {} runs from seed {} ===\n", runs, seed);
    for (ending, count) in &endings {
        println!("  {:<24} {:>6}", ending, count);
    }
    if runs > 0 {
        println!("\nAverage choices: {:.1}", total_steps as f64 / runs as f64);
    }
    println!("Stranded: {}", stranded);
    println!("Fallback endings: {}", fallbacks);
    for ending in story.endings() {
        if !endings.contains_key(&ending.id) {
            println!("Never reached: {}", ending.id);
        }
    }
}

fn print_view(view: &View) {
    match view {
        View::Playing(scene) => {
            println!("\n[{} @ {}]", scene.node_id, scene.scene);
            if let Some(line) = &scene.line {
                println!("  {}: {}", line.speaker, line.text);
            }
            if scene.choices.is_empty() {
                println!("  (n to continue, {}/{})", scene.cursor + 1, scene.line_count);
            }
            for (n, choice) in scene.choices.iter().enumerate() {
                println!("  {}) {} [{}]", n + 1, choice.text, choice.id);
            }
        }
        View::Ended(ending) => {
            println!("\n=== {} ===", ending.title);
            println!("{}", ending.text);
            if let Some(fallback) = &ending.fallback {
                println!(
                    "(fallback: choice '{}' in '{}' led to unknown '{}')",
                    fallback.choice, fallback.node, fallback.target
                );
            }
            let attributes: Vec<String> = ending
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!("Final: {}", attributes.join(", "));
            println!("Type 'restart' to play again.");
        }
    }
}

fn print_usage() {
    println!("Playtest — interactive shell for playing through a story.");
    println!();
    println!("Usage: playtest <story.ron> [--seed <n>] [--auto <n>]");
    println!();
    println!("  --seed <n>   Seed for random choices (default: 42)");
    println!("  --auto <n>   Run n random playthroughs and print ending counts");
}

fn print_help() {
    println!("Commands:");
    println!("  n, next        Advance dialogue (also: empty line)");
    println!("  <number>       Pick the numbered choice");
    println!("  <choice id>    Pick a choice by id");
    println!("  stats          Show attributes and inventory");
    println!("  history        List resolved choices");
    println!("  auto           Finish the game with random choices");
    println!("  restart        Start a new game");
    println!("  help           Show this help");
    println!("  quit           Exit");
}
