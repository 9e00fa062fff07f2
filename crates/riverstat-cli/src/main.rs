use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use riverstat_cli::predict::run_predict;
use riverstat_cli::train::input::TrainConfig;
use riverstat_cli::train::trainer;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("RIVERSTAT_LOG", "error,riverstat=info"))
        .init();

    let matches = Command::new("riverstat")
        .version(clap::crate_version!())
        .about("\u{1F30A} riverstat - River water-quality status classification")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Tune and train the weighted ensemble on a labelled CSV")
                .arg(
                    Arg::new("config")
                        .help("Path to training configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data_file")
                        .short('d')
                        .long("data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to the labelled CSV. Overrides the data file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("artifact_file")
                        .short('o')
                        .long("output")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "File path that the trained model artifact will be written to. \
                             Overrides the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("report_file")
                        .short('r')
                        .long("report")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("File path for the plain-text evaluation report.")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("trials")
                        .long("trials")
                        .value_parser(clap::value_parser!(usize))
                        .help("Number of search trials. Overrides the configuration file."),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(clap::value_parser!(u64))
                        .help("Seed for the search, folds, oversampling and models."),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Classify one JSON sample with a trained model")
                .arg(
                    Arg::new("model_path")
                        .short('m')
                        .long("model")
                        .help("Path to the trained model artifact (*.json)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("Path to the JSON request. Reads stdin when omitted.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        let template = serde_json::to_string_pretty(&TrainConfig::default())?;
        println!("{}", template);
        eprintln!(
            "[riverstat::train] No config file provided. \
             Save the template above, set \"data_file\" and pass it as the first argument."
        );
        return Ok(());
    };
    log::info!("[riverstat::train] Training from config: {:?}", config_path);

    let params = TrainConfig::from_arguments(config_path, matches)?;
    match trainer::run_training(&params) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let model_path: &PathBuf = matches
        .get_one("model_path")
        .ok_or_else(|| anyhow::anyhow!("--model is required"))?;
    let input_path: Option<&PathBuf> = matches.get_one("input");

    let response = run_predict(model_path, input_path.map(PathBuf::as_path))?;
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_success() {
        log::error!("Prediction request rejected with status {}", response.status);
        std::process::exit(1);
    }
    Ok(())
}
