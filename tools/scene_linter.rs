/// Scene Linter — validates scene definition files before deployment.
///
/// Usage: scene_linter <scene_file_or_dir> [--quiet]
///
/// Reports every structural error (missing start node, dangling gotos,
/// conflicting choices/goto, bad pools) plus reachability warnings.
/// Exits non-zero if any scene has errors.

use scene_engine::schema::scene::{GotoSpec, SceneDefinition, START_NODE};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: scene_linter <scene_file_or_dir> [--quiet]");
        process::exit(0);
    }

    let target = Path::new(&args[1]);
    let quiet = args.iter().any(|a| a == "--quiet");

    let files = collect_ron_files(target);
    if files.is_empty() {
        eprintln!("ERROR: no .ron scene files found at {}", target.display());
        process::exit(1);
    }

    let mut scenes_ok = 0usize;
    let mut error_count = 0usize;
    let mut warning_count = 0usize;
    let mut seen_ids: HashSet<String> = HashSet::new();

    for file in &files {
        let definition = match SceneDefinition::load_from_ron(file) {
            Ok(def) => def,
            Err(e) => {
                eprintln!("ERROR [{}]: {}", file.display(), e);
                error_count += 1;
                continue;
            }
        };

        if !seen_ids.insert(definition.id.clone()) {
            eprintln!(
                "ERROR [{}]: duplicate scene id '{}'",
                file.display(),
                definition.id
            );
            error_count += 1;
        }

        let problems = definition.problems();
        for problem in &problems {
            eprintln!("ERROR [{}]: {}", file.display(), problem);
        }
        error_count += problems.len();

        for warning in reachability_warnings(&definition) {
            warning_count += 1;
            if !quiet {
                eprintln!("WARN  [{}]: {}", file.display(), warning);
            }
        }

        if problems.is_empty() {
            scenes_ok += 1;
            if !quiet {
                println!(
                    "ok    {} ({} nodes)",
                    definition.id,
                    definition.nodes.len()
                );
            }
        }
    }

    println!(
        "{} file(s), {} scene(s) ok, {} error(s), {} warning(s)",
        files.len(),
        scenes_ok,
        error_count,
        warning_count
    );

    if error_count > 0 {
        process::exit(1);
    }
}

fn collect_ron_files(target: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if target.is_file() {
        files.push(target.to_path_buf());
        return files;
    }
    let entries = match std::fs::read_dir(target) {
        Ok(entries) => entries,
        Err(_) => return files,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(collect_ron_files(&path));
        } else if path.extension().map(|e| e == "ron").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    files
}

/// Nodes unreachable from `start` through gotos and choice targets.
/// Legal but almost always a content mistake.
fn reachability_warnings(definition: &SceneDefinition) -> Vec<String> {
    let mut reachable: HashSet<&str> = HashSet::new();
    let mut frontier = vec![START_NODE];

    while let Some(name) = frontier.pop() {
        if !reachable.insert(name) {
            continue;
        }
        let node = match definition.nodes.get(name) {
            Some(node) => node,
            None => continue,
        };
        if let Some(goto) = &node.goto {
            match goto {
                GotoSpec::One(target) => frontier.push(target),
                GotoSpec::Pool(targets) => frontier.extend(targets.iter().map(String::as_str)),
            }
        }
        for choice in &node.choices {
            frontier.push(&choice.goto);
        }
    }

    let mut names: Vec<&String> = definition.nodes.keys().collect();
    names.sort();
    names
        .into_iter()
        .filter(|name| !reachable.contains(name.as_str()))
        .map(|name| format!("scene '{}': node '{}' is unreachable", definition.id, name))
        .collect()
}
