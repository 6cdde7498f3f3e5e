/// Preview — interactive shell for playing scene files by hand.
///
/// Usage: preview --scenes <path> [--seed <n>] [--name <actor name>]
///
/// Commands:
///   play <scene_id>   — start a scene for the preview actor
///   <number>          — take the numbered choice
///   tick <seconds>    — advance the manual clock
///   status            — show the current scene, node and choices
///   abort             — force-terminate the active scene stack
///   scenes            — list registered scenes
///   help              — list commands
///   quit              — exit

use scene_engine::core::manager::{ManagerError, SessionManager};
use scene_engine::core::registry::SceneRegistry;
use scene_engine::core::scheduler::ManualScheduler;
use scene_engine::core::world::MemoryWorld;
use scene_engine::schema::actor::{ActorId, Pronouns};
use scene_engine::schema::scene::SceneDefinition;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const ACTOR: ActorId = ActorId(1);

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut scenes_path = None;
    let mut seed: u64 = 42;
    let mut name = "Preview".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenes" if i + 1 < args.len() => {
                i += 1;
                scenes_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--name" if i + 1 < args.len() => {
                i += 1;
                name = args[i].clone();
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                return;
            }
        }
        i += 1;
    }

    let scenes_path = match scenes_path {
        Some(path) => path,
        None => {
            print_usage();
            return;
        }
    };

    let registry = Arc::new(SceneRegistry::new());
    let mut loaded = 0usize;
    for file in collect_ron_files(Path::new(&scenes_path)) {
        match SceneDefinition::load_from_ron(&file) {
            Ok(def) => match registry.register(def) {
                Ok(()) => loaded += 1,
                Err(e) => eprintln!("WARN: {}: {}", file.display(), e),
            },
            Err(e) => eprintln!("WARN: {}: {}", file.display(), e),
        }
    }
    println!("Loaded {} scene(s) from {}", loaded, scenes_path);

    let world = Arc::new(MemoryWorld::new());
    world.add_actor(ACTOR, &name, Pronouns::TheyThem);
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = Arc::new(
        SessionManager::new(registry.clone(), world.clone(), scheduler.clone()).with_seed(seed),
    );

    // Messages accumulate in the world capture; print only the tail
    // that appeared since the previous command.
    let mut printed = 0usize;

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("play") => match parts.next() {
                Some(id) => report(manager.start_scene(ACTOR, id)),
                None => println!("Usage: play <scene_id>"),
            },
            Some("tick") => {
                let seconds: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1.0);
                scheduler.advance(Duration::from_secs_f64(seconds));
            }
            Some("status") => match manager.status(ACTOR) {
                Some(status) => {
                    println!(
                        "scene '{}' node '{}' depth {}",
                        status.scene, status.node, status.depth
                    );
                    for choice in &status.choices {
                        let marker = if choice.selectable { " " } else { "x" };
                        println!("{} {}. {}", marker, choice.index, choice.text);
                    }
                }
                None => println!("No active scene."),
            },
            Some("abort") => {
                if !manager.abort(ACTOR) {
                    println!("No active scene.");
                }
            }
            Some("scenes") => {
                println!("{} scene(s) registered", registry.len());
            }
            Some("help") => print_usage(),
            Some("quit") | Some("exit") => break,
            Some(word) => match word.parse::<usize>() {
                Ok(index) => report(manager.submit_choice(ACTOR, index)),
                Err(_) => println!("Unknown command: {} (try 'help')", word),
            },
            None => {}
        }

        let messages = world.messages_for(ACTOR);
        for message in &messages[printed.min(messages.len())..] {
            println!("{}", message);
        }
        printed = messages.len();
    }
}

fn report(result: Result<scene_engine::core::manager::SceneOutput, ManagerError>) {
    match result {
        Ok(output) => {
            if output.over {
                println!("(scene over)");
            }
        }
        Err(e) => println!("error: {}", e),
    }
}

fn collect_ron_files(target: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if target.is_file() {
        files.push(target.to_path_buf());
        return files;
    }
    if let Ok(entries) = std::fs::read_dir(target) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_ron_files(&path));
            } else if path.extension().map(|e| e == "ron").unwrap_or(false) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn print_usage() {
    println!("Usage: preview --scenes <path> [--seed <n>] [--name <actor name>]");
    println!();
    println!("Commands:");
    println!("  play <scene_id>   start a scene");
    println!("  <number>          take the numbered choice");
    println!("  tick <seconds>    advance the manual clock");
    println!("  status            show the current scene and choices");
    println!("  abort             force-terminate the scene stack");
    println!("  scenes            list registered scenes");
    println!("  quit              exit");
}
