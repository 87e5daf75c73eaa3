//! Vesper Language Compiler Executable
//!
//! CLI front end over `vesper_core`'s pipeline: parse, validate, desugar,
//! type-check, security-analyze, resolve imports, and emit Rust source
//! linked against `vesper_runtime`.
//!
//! # Subcommands
//!
//! ```text
//! vesperc compile <file.vsl> [--out <dir>]
//! vesperc run <file.vsl>
//! vesperc module-registry reload <name> [--sl-path <dir>]...
//! vesperc validate-integration-toolkit <file.vsl>
//! ```

use std::path::PathBuf;
use std::process::exit;

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, LevelPadding, TermLogger, TerminalMode, ThreadLogMode};
use vesper_core::config::ProjectConfig;
use vesper_core::error::{CodeSpanReportGenerator, ReportGenerator};
use vesper_core::file::SourceFile;
use vesper_core::nom_tools::State;
use vesper_core::registry::ModuleRegistry;
use vesper_core::{compile, CompileError};

fn init_logging() {
    let config = ConfigBuilder::new()
        .set_location_level(LevelFilter::Error)
        .set_thread_mode(ThreadLogMode::Both)
        .set_level_padding(LevelPadding::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    CombinedLogger::init(vec![TermLogger::new(LevelFilter::Error, config, TerminalMode::Mixed, ColorChoice::Auto)]).ok();
}

fn read_source(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|error| {
        eprintln!("error reading {path}: {error}");
        exit(1);
    })
}

fn module_name_of(path: &str) -> String {
    path.strip_suffix(".vsl").unwrap_or(path).split('/').next_back().unwrap_or(path).to_string()
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} <compile|run|module-registry|validate-integration-toolkit> ...");
    exit(1);
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }

    match args[1].as_str() {
        "compile" => cmd_compile(&args[2..]),
        "run" => cmd_run(&args[2..]),
        "module-registry" => cmd_module_registry(&args[2..]),
        "validate-integration-toolkit" => cmd_validate_integration_toolkit(&args[2..]),
        _ => usage(&args[0]),
    }
}

/// Parses and compiles one file under the default project config, printing
/// the emitted Rust source to stdout (or to `--out <dir>/<module>.rs` when
/// given).
fn cmd_compile(args: &[String]) {
    let Some(input) = args.first() else {
        eprintln!("Usage: vesperc compile <file.vsl> [--out <dir>]");
        exit(1);
    };
    let out_dir = args.iter().position(|a| a == "--out").and_then(|i| args.get(i + 1)).cloned();

    let module_name = module_name_of(input);
    let content = read_source(input);
    let state = State::new(SourceFile::new(vec![module_name.clone()], content));
    let config = ProjectConfig::default();
    let registry = ModuleRegistry::new(config.sl_module_paths.clone(), config.allow_current_dir);

    match compile(&state, &registry, &config, input.clone(), module_name.clone()) {
        Ok((artifact, type_report)) => {
            for warning in &type_report.warnings {
                eprintln!("warning: {}", warning.message);
            }
            match out_dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir).ok();
                    let out_path = PathBuf::from(dir).join(format!("{module_name}.rs"));
                    std::fs::write(&out_path, &artifact.code).unwrap_or_else(|error| {
                        eprintln!("error writing {}: {error}", out_path.display());
                        exit(1);
                    });
                    println!("wrote {}", out_path.display());
                }
                None => println!("{}", artifact.code),
            }
        }
        Err(error) => report_compile_error(error),
    }
}

/// Compiles `file.vsl` into a throwaway Cargo project wired against
/// `vesper-runtime` and hands off to `cargo run` for execution. This is the
/// only subcommand that shells out to the Rust toolchain; it is the CLI's
/// own runtime behavior, not part of building this compiler itself.
fn cmd_run(args: &[String]) {
    let Some(input) = args.first() else {
        eprintln!("Usage: vesperc run <file.vsl>");
        exit(1);
    };

    let module_name = module_name_of(input);
    let content = read_source(input);
    let state = State::new(SourceFile::new(vec![module_name.clone()], content));
    let config = ProjectConfig::default();
    let registry = ModuleRegistry::new(config.sl_module_paths.clone(), config.allow_current_dir);

    let (artifact, _) = compile(&state, &registry, &config, input.clone(), module_name.clone()).unwrap_or_else(|error| report_compile_error(error));

    let scratch = std::env::temp_dir().join(format!("vesperc-run-{}", std::process::id()));
    let src_dir = scratch.join("src");
    std::fs::create_dir_all(&src_dir).unwrap_or_else(|error| {
        eprintln!("error creating scratch directory: {error}");
        exit(1);
    });

    let runtime_path = std::env::var("VESPER_RUNTIME_PATH").unwrap_or_else(|_| "../vesper-runtime".to_string());
    let manifest = format!(
        "[package]\nname = \"vesper-run\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\nvesper-runtime = {{ path = \"{runtime_path}\" }}\nindexmap = \"2.6\"\n"
    );
    std::fs::write(scratch.join("Cargo.toml"), manifest).ok();

    // The emitted `main` function (if the source declares one) collides
    // with Rust's own `fn main`; rename it before appending the real entry
    // point that calls it.
    let mut main_rs = artifact.code.replace("pub fn main(", "pub fn vesper_main(");
    if main_rs.contains("fn vesper_main(") {
        main_rs.push_str("\nfn main() -> Result<(), VesperException> { vesper_main()?; Ok(()) }\n");
    } else {
        main_rs.push_str("\nfn main() {}\n");
    }
    std::fs::write(src_dir.join("main.rs"), main_rs).ok();

    let status = std::process::Command::new("cargo").arg("run").arg("--quiet").current_dir(&scratch).status();
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => exit(status.code().unwrap_or(1)),
        Err(error) => {
            eprintln!("failed to invoke cargo: {error}");
            exit(1);
        }
    }
}

/// `module-registry reload <name>` forces a fresh resolution of `name` on a
/// fresh registry, surfacing whatever the registry's own reload path would
/// report to a long-running host after editing a `.vsl` module on disk.
fn cmd_module_registry(args: &[String]) {
    match args.first().map(String::as_str) {
        Some("reload") => {
            let Some(name) = args.get(1) else {
                eprintln!("Usage: vesperc module-registry reload <name> [--sl-path <dir>]...");
                exit(1);
            };
            let mut sl_paths = Vec::new();
            let mut i = 2;
            while i < args.len() {
                if args[i] == "--sl-path" {
                    if let Some(path) = args.get(i + 1) {
                        sl_paths.push(path.clone());
                    }
                    i += 2;
                } else {
                    i += 1;
                }
            }
            let registry = ModuleRegistry::new(sl_paths, true);
            match registry.reload(name) {
                Ok(()) => match registry.resolve(name) {
                    Ok(record) => println!("reloaded '{}' ({} function(s))", record.name, record.functions.len()),
                    Err(error) => {
                        eprintln!("reload succeeded but re-resolution failed: {error}");
                        exit(1);
                    }
                },
                Err(error) => {
                    eprintln!("reload failed: {error}");
                    exit(1);
                }
            }
        }
        _ => {
            eprintln!("Usage: vesperc module-registry reload <name>");
            exit(1);
        }
    }
}

/// `validate-integration-toolkit <file.vsl>` runs validation, type-checking,
/// and security analysis without emitting code, for a pre-commit or CI hook
/// that only wants diagnostics.
fn cmd_validate_integration_toolkit(args: &[String]) {
    let Some(input) = args.first() else {
        eprintln!("Usage: vesperc validate-integration-toolkit <file.vsl>");
        exit(1);
    };

    let module_name = module_name_of(input);
    let content = read_source(input);
    let state = State::new(SourceFile::new(vec![module_name], content));

    let ast = match vesper_core::process_code(&state) {
        Ok(ast) => ast,
        Err(error) => {
            CodeSpanReportGenerator::generate(error);
            exit(1);
        }
    };

    let validation = vesper_core::validator::validate(&ast);
    for diagnostic in &validation.diagnostics {
        eprintln!("{diagnostic:?}");
    }

    let transformed = vesper_core::transformer::transform(ast);
    let type_report = vesper_core::type_checker::check(&transformed.file);
    for warning in &type_report.warnings {
        println!("warning: {}", warning.message);
    }

    let security_report = vesper_core::security::analyze(&transformed.file, &[], &vesper_core::security::AssumeAllImportsKnown);
    for diagnostic in &security_report.diagnostics {
        eprintln!("{diagnostic:?}");
    }

    if validation.is_fatal() || security_report.is_fatal() {
        exit(1);
    }
    println!("ok");
}

fn report_compile_error(error: CompileError) -> ! {
    eprintln!("{error}");
    exit(1);
}
