use clap::{value_parser, Arg, ArgAction, Command};
use graft_cli::{default_config_toml, load_config, render_json, render_text, run_demo, VERSION};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Command::new("graft")
        .version(VERSION)
        .about("Live object-graph migration for hot reload")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("demo")
                .about("Migrate a demo world from generation 1 to generation 2")
                .arg(
                    Arg::new("players")
                        .long("players")
                        .default_value("8")
                        .value_parser(value_parser!(usize))
                        .help("Number of players in the world"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Pass configuration (TOML)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(Command::new("config").about("Print the default pass configuration"));

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("demo", args)) => {
            let players = args.get_one::<usize>("players").copied().unwrap_or(8);
            let config = load_config(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
            let report = run_demo(players, config)?;

            if args.get_flag("json") {
                println!("{}", render_json(&report)?);
            } else {
                print!("{}", render_text(&report));
            }
            if report.has_errors() {
                std::process::exit(1);
            }
        }
        Some(("config", _)) => print!("{}", default_config_toml()?),
        _ => {}
    }
    Ok(())
}
