use clap::{Arg, ArgAction, ArgMatches, Command};
use glob::glob;
use sigil_core::actions::discover_manifests_in_dir;
use sigil_core::{ActionRegistry, BytecodeAssembler, CompileSettings, ProgramSource, compile_batch};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod output;

use output::FormatStyle;

fn main() -> ExitCode {
    let cli = Command::new("sigil")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles trigger programs into VM assembly")
        .arg(
            Arg::new("verbose")
                .help("Log compile phases (RUST_LOG overrides)")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true),
        );

    let cli = setup_cli(cli);
    let matches = cli.get_matches();

    let level = match matches.get_count("verbose") {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    match dispatch_commands(&matches) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("{}", FormatStyle::default().error.apply_to(message));
            ExitCode::from(2)
        }
    }
}

/// Sets up the CLI with subcommands and arguments.
fn setup_cli(cli: Command) -> Command {
    cli.subcommand(
        Command::new("build")
            .about("Compile trigger programs (JSON files or glob patterns)")
            .arg(
                Arg::new("inputs")
                    .help("Program files or glob patterns")
                    .required(true)
                    .num_args(1..)
                    .index(1),
            )
            .arg(
                Arg::new("output")
                    .help("Directory for compiled artifacts")
                    .short('o')
                    .long("output")
                    .value_parser(clap::value_parser!(PathBuf))
                    .value_name("DIR"),
            )
            .arg(
                Arg::new("settings")
                    .help("Compile settings file (JSON)")
                    .short('s')
                    .long("settings")
                    .value_parser(clap::value_parser!(PathBuf))
                    .value_name("FILE"),
            )
            .arg(manifests_arg())
            .arg(
                Arg::new("threads")
                    .help("Worker threads for the batch")
                    .short('j')
                    .long("threads")
                    .value_parser(clap::value_parser!(usize))
                    .value_name("N"),
            )
            .arg(
                Arg::new("no-auto-serialization")
                    .help("Do not append serialization requests after synced writes")
                    .long("no-auto-serialization")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("no-event-hooks")
                    .help("Namespace module event methods instead of merging them")
                    .long("no-event-hooks")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("dump")
                    .help("Print a stage to stdout")
                    .short('d')
                    .long("dump")
                    .value_parser(["asm", "json"])
                    .value_name("STAGE"),
            ),
    )
    .subcommand(
        Command::new("actions")
            .about("List the actions and events available to programs")
            .arg(manifests_arg()),
    )
}

fn manifests_arg() -> Arg {
    Arg::new("manifests")
        .help("Directory of extra action manifests")
        .short('m')
        .long("manifests")
        .value_parser(clap::value_parser!(PathBuf))
        .value_name("DIR")
}

fn dispatch_commands(matches: &ArgMatches) -> Result<ExitCode, String> {
    match matches.subcommand() {
        Some(("build", sub_m)) => build(sub_m),
        Some(("actions", sub_m)) => {
            let registry = load_registry(sub_m.get_one::<PathBuf>("manifests"))?;
            println!("{}", output::actions_table(&registry));
            Ok(ExitCode::SUCCESS)
        }
        _ => Err("No valid subcommand was used. Use --help for more information.".to_string()),
    }
}

fn load_registry(manifests: Option<&PathBuf>) -> Result<ActionRegistry, String> {
    let mut registry = ActionRegistry::builtin();
    if let Some(dir) = manifests {
        for (manifest, path) in discover_manifests_in_dir(dir)? {
            log::info!("registering actions from {}", path.display());
            registry
                .register_manifest(manifest)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
        }
    }
    Ok(registry)
}

fn expand_inputs<'a>(patterns: impl Iterator<Item = &'a String>) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for pattern in patterns {
        let before = files.len();
        for entry in glob(pattern).map_err(|e| format!("bad pattern '{}': {}", pattern, e))? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => log::warn!("skipping unreadable path: {}", e),
            }
        }
        if files.len() == before {
            return Err(format!("no program matches '{}'", pattern));
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn read_source(path: &Path) -> Result<ProgramSource, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("parse {}: {}", path.display(), e))
}

fn build(sub_m: &ArgMatches) -> Result<ExitCode, String> {
    let style = FormatStyle::default();
    let mut settings = match sub_m.get_one::<PathBuf>("settings") {
        Some(path) => CompileSettings::load_from_file(path)?,
        None => CompileSettings::default(),
    };
    if let Some(threads) = sub_m.get_one::<usize>("threads") {
        settings.threads = Some(*threads);
    }
    if sub_m.get_flag("no-auto-serialization") {
        settings.auto_request_serialization = false;
    }
    if sub_m.get_flag("no-event-hooks") {
        settings.include_event_hooks = false;
    }
    let registry = load_registry(sub_m.get_one::<PathBuf>("manifests"))?;

    let inputs = sub_m.get_many::<String>("inputs").into_iter().flatten();
    let sources = expand_inputs(inputs)?
        .iter()
        .map(|p| read_source(p))
        .collect::<Result<Vec<_>, _>>()?;

    let report = compile_batch(&sources, &settings, &registry, &BytecodeAssembler);

    for program in report.programs.values() {
        for diagnostic in program.warnings.iter().chain(program.errors.iter()) {
            eprintln!("{} [{}]", style.diagnostic(diagnostic), program.key);
        }
    }

    if let Some(dir) = sub_m.get_one::<PathBuf>("output") {
        fs::create_dir_all(dir).map_err(|e| format!("create {}: {}", dir.display(), e))?;
        for (key, program) in &report.programs {
            let json = serde_json::to_string_pretty(program).map_err(|e| e.to_string())?;
            let target = dir.join(format!("{}.json", key));
            fs::write(&target, json).map_err(|e| format!("write {}: {}", target.display(), e))?;
            if program.is_success() {
                let target = dir.join(format!("{}.sasm", key));
                fs::write(&target, &program.assembly).map_err(|e| format!("write {}: {}", target.display(), e))?;
            }
        }
    }

    match sub_m.get_one::<String>("dump").map(String::as_str) {
        Some("asm") => {
            for (key, program) in &report.programs {
                println!("{}", style.title.apply_to(key));
                println!("{}", program.assembly);
            }
        }
        Some("json") => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        _ => println!("{}", output::summary_table(&report)),
    }

    let failed = report.failed().count();
    if failed > 0 {
        eprintln!("{}", style.error.apply_to(format!("{} program(s) failed", failed)));
        Ok(ExitCode::FAILURE)
    } else {
        eprintln!("{}", style.success.apply_to(format!("{} program(s) compiled", report.programs.len())));
        Ok(ExitCode::SUCCESS)
    }
}
