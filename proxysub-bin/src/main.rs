use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{arg, value_parser, ArgMatches, Command};
use log::{debug, info};

use proxysub::{Node, NodeRecord};

mod settings;

use settings::{parse_settings, Settings};

fn main() -> Result<()> {
    let args = get_args();
    let Some((command, sub_args)) = args.subcommand() else {
        anyhow::bail!("No subcommand given");
    };
    let settings = load_settings(sub_args)?;
    init_log(sub_args.get_flag("verbose") || settings.verbose)?;
    match command {
        "decode" => decode(sub_args, &settings),
        "encode" => encode(sub_args, &settings),
        _ => unreachable!("clap rejects unknown subcommands"),
    }
}

fn get_args() -> ArgMatches {
    clap::command!()
        .subcommand_required(true)
        .arg(
            arg!(-c --config <PATH> "Path to a TOML settings file")
                .value_parser(value_parser!(PathBuf))
                .required(false)
                .global(true),
        )
        .arg(arg!(-v --verbose "Turn on verbose logging").global(true))
        .subcommand(
            Command::new("decode")
                .about("Decode a subscription document into a JSON array of nodes")
                .arg(
                    arg!(-t --"type" <TYPE> "Declared subscription type, e.g. clash, sip008, v2ray or auto")
                        .required(false),
                )
                .arg(arg!(--report "Print units that did not yield a node to stderr"))
                .arg(
                    arg!([INPUT] "Subscription document. Reads stdin if missing")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("encode")
                .about("Render a JSON array of nodes as a subscription document")
                .arg(
                    arg!(-f --format <FORMAT> "Output format: base64, clash or json")
                        .required(false),
                )
                .arg(
                    arg!([INPUT] "JSON array of nodes. Reads stdin if missing")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .get_matches()
}

fn load_settings(args: &ArgMatches) -> Result<Settings> {
    let Some(path) = args.get_one::<PathBuf>("config") else {
        return Ok(Settings::default());
    };
    let toml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    parse_settings(&toml).with_context(|| format!("Invalid settings file {}", path.display()))
}

fn init_log(is_verbose: bool) -> Result<()> {
    let colors = fern::colors::ColoredLevelConfig::new();
    let default_level;
    #[cfg(debug_assertions)]
    {
        default_level = log::LevelFilter::Debug;
    }
    #[cfg(not(debug_assertions))]
    {
        default_level = log::LevelFilter::Info;
    }
    let level = if is_verbose {
        log::LevelFilter::Debug
    } else {
        default_level
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S%.3f]"),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("Cannot set up logger")
}

fn read_input(args: &ArgMatches) -> Result<String> {
    let data = match args.get_one::<PathBuf>("INPUT") {
        Some(path) => {
            debug!("Reading {}", path.display());
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut data = vec![];
            std::io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
            data
        }
    };
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn write_output(content: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush().context("Failed to write output")
}

fn decode(args: &ArgMatches, settings: &Settings) -> Result<()> {
    let content = read_input(args)?;
    let declared = args
        .get_one::<String>("type")
        .or(settings.decode_type.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("auto");
    info!("Decoding subscription, declared type: {}", declared);

    let sub = proxysub::decode_subscription(&content, declared)
        .context("Failed to decode subscription")?;
    info!(
        "Decoded {} nodes, {} units skipped",
        sub.nodes.len(),
        sub.skipped.len()
    );
    if args.get_flag("report") {
        for unit in &sub.skipped {
            eprintln!("{}: {}", unit.position, unit.reason);
        }
    }

    let records: Vec<NodeRecord> = sub.nodes.iter().map(NodeRecord::from).collect();
    let json = serde_json::to_string_pretty(&records).context("Failed to serialize nodes")?;
    write_output(&json)
}

fn encode(args: &ArgMatches, settings: &Settings) -> Result<()> {
    let content = read_input(args)?;
    let format = args
        .get_one::<String>("format")
        .or(settings.encode_format.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("base64");

    let records: Vec<NodeRecord> =
        serde_json::from_str(&content).context("Input is not a JSON array of nodes")?;
    let nodes = records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            Node::try_from(record).with_context(|| format!("Invalid node at index {}", idx))
        })
        .collect::<Result<Vec<_>>>()?;

    let encoded = proxysub::encode_subscription(&nodes, format)
        .context("Failed to encode subscription")?;
    info!(
        "Encoded {} nodes as {}, content type: {}",
        nodes.len(),
        format,
        encoded.content_type
    );
    write_output(&encoded.content)
}
