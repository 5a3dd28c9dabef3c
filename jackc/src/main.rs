use clap::Parser;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

use jackc::{CompilationEngine, Lexer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input source files or directories to compile
    #[arg(required = true, help = "The .jack files or directories to compile")]
    paths: Vec<PathBuf>,

    /// Print generated VM code instead of writing .vm files
    #[arg(long, help = "Dump VM code to stdout instead of .vm files")]
    stdout: bool,

    /// Directory to place generated .vm files in (default: next to input)
    #[arg(long, help = "Output directory for generated .vm files")]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut sources = Vec::new();
    for path in &cli.paths {
        match collect_sources(path) {
            Ok(mut found) => sources.append(&mut found),
            Err(err) => {
                eprintln!("Error reading '{}': {}", path.display(), err);
                process::exit(1);
            }
        }
    }

    if sources.is_empty() {
        eprintln!("No .jack files found");
        process::exit(1);
    }

    for source in &sources {
        if let Err(err) = compile_file(source, &cli) {
            eprintln!("Error compiling {}: {}", source.display(), err);
            process::exit(1);
        }
    }
}

/// A directory input means "every .jack file directly inside it", sorted so
/// output order is stable.
fn collect_sources(path: &Path) -> io::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "jack"))
        .collect();
    files.sort();
    Ok(files)
}

fn compile_file(path: &Path, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(path)?;
    let lexer = Lexer::from_str(&source);

    if cli.stdout {
        let stdout = io::stdout();
        let mut engine = CompilationEngine::new(lexer, stdout.lock());
        engine.compile_class()?;
        return Ok(());
    }

    let out_path = output_path(path, cli.output.as_deref());
    let file = fs::File::create(&out_path)?;
    let mut engine = CompilationEngine::new(lexer, io::BufWriter::new(file));
    engine.compile_class()?;
    engine.into_writer().into_inner().flush()?;
    log::info!("compiled {} -> {}", path.display(), out_path.display());
    Ok(())
}

/// `Foo.jack` becomes `Foo.vm`, next to the input or under `--output`.
fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let mut path = match output_dir {
        Some(dir) => dir.join(input.file_name().unwrap_or_default()),
        None => input.to_path_buf(),
    };
    path.set_extension("vm");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_swaps_extension() {
        assert_eq!(
            output_path(Path::new("proj/Main.jack"), None),
            PathBuf::from("proj/Main.vm")
        );
    }

    #[test]
    fn output_path_respects_output_dir() {
        assert_eq!(
            output_path(Path::new("proj/Main.jack"), Some(Path::new("out"))),
            PathBuf::from("out/Main.vm")
        );
    }
}
