use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use credence::error::render;
use credence::target::{Host, Platform};

#[derive(Parser)]
#[command(name = "credence", about = "Compile a B-language JSON AST to target assembly")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lower an AST + symbol table pair into assembly text.
    Build {
        /// Path to the JSON AST file.
        ast: PathBuf,
        /// Path to the JSON hoisted symbol table file.
        symbols: PathBuf,
        #[arg(long, value_enum, default_value_t = CliPlatform::X86_64)]
        platform: CliPlatform,
        #[arg(long, value_enum, default_value_t = CliHost::Linux)]
        host: CliHost,
        /// Write assembly to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliPlatform {
    X86_64,
    Arm64,
    Z80,
}

impl From<CliPlatform> for Platform {
    fn from(p: CliPlatform) -> Platform {
        match p {
            CliPlatform::X86_64 => Platform::X86_64,
            CliPlatform::Arm64 => Platform::Arm64,
            CliPlatform::Z80 => Platform::Z80,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliHost {
    Linux,
    Darwin,
}

impl From<CliHost> for Host {
    fn from(h: CliHost) -> Host {
        match h {
            CliHost::Linux => Host::Linux,
            CliHost::Darwin => Host::Darwin,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            ast,
            symbols,
            platform,
            host,
            output,
        } => run_build(&ast, &symbols, platform.into(), host.into(), output.as_deref()),
    }
}

fn run_build(ast_path: &std::path::Path, symbols_path: &std::path::Path, platform: Platform, host: Host, output: Option<&std::path::Path>) -> ExitCode {
    let ast_json = match fs::read_to_string(ast_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error reading '{}': {}", ast_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let symbols_json = match fs::read_to_string(symbols_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error reading '{}': {}", symbols_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match credence::compile(&ast_json, &symbols_json, platform, host) {
        Ok(assembly) => {
            match output {
                Some(path) => {
                    if let Err(e) = fs::write(path, &assembly) {
                        eprintln!("error writing '{}': {}", path.display(), e);
                        return ExitCode::FAILURE;
                    }
                }
                None => {
                    let _ = std::io::stdout().write_all(assembly.as_bytes());
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            render(&err, &ast_path.display().to_string(), &ast_json);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
