use std::path::Path;

use anyhow::Result;
use clap::*;
use log::LevelFilter;
use srum_convert::report;
use srum_convert::store::SqliteStore;

fn main() -> Result<()> {
    let matches = Command::new("srum_convert")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Run YAML report templates against a converted SRUM database.")
        .arg(
            Arg::new("list_reports")
                .long("list-reports")
                .help("List report templates (name + description) and exit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_parser(value_parser!(String))
                .required_unless_present("list_reports")
                .help("Path to the converted SQLite database"),
        )
        .arg(
            Arg::new("template_folder")
                .short('t')
                .long("template-folder")
                .value_parser(value_parser!(String))
                .default_value("templates")
                .help("Folder containing YML report templates"),
        )
        .arg(
            Arg::new("outpath")
                .short('o')
                .long("outpath")
                .value_parser(value_parser!(String))
                .required_unless_present("list_reports")
                .help("Output folder for the rendered reports"),
        )
        .arg(
            Arg::new("log_level")
                .short('l')
                .long("log-level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("info"),
        )
        .get_matches();

    let log_level_str = matches.get_one::<String>("log_level").unwrap();
    let level_filter = match log_level_str.as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    env_logger::Builder::new().filter_level(level_filter).init();

    let template_folder = matches.get_one::<String>("template_folder").unwrap();

    if matches.get_flag("list_reports") {
        println!("available reports:");
        for template in report::load_templates(Path::new(template_folder))? {
            println!(
                "  {:<32} {}",
                template.name,
                template.description.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    }

    let database = matches.get_one::<String>("database").unwrap();
    let outpath = matches.get_one::<String>("outpath").unwrap();

    let store = SqliteStore::open(Path::new(database))?;
    let written = report::run_all(&store, Path::new(template_folder), Path::new(outpath))?;
    for path in &written {
        println!("{}", path.display());
    }

    eprintln!("done: rendered {} reports", written.len());
    Ok(())
}
