use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use mig_core::config::CASPER_CONF_PATH;
use mig_core::logging::{init_tracing, DEFAULT_LEVEL};
use mig_core::{
    replay, CasperConfig, EventClass, MigrationConfig, QuestionFilter, QuestionKind, Transcript,
};
use mig_store::QuestionId;

fn main() -> anyhow::Result<()> {
    let cli = Command::new("mig-replay")
        .version(mig_core::VERSION)
        .about("Migration-assistant negotiator tools")
        .subcommand_required(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value(DEFAULT_LEVEL)
                .help("Log filter used when MIGRATION_ASSISTANT_LOG and RUST_LOG are unset"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Negotiator configuration (JSON)"),
        )
        .arg(
            Arg::new("casper-conf")
                .long("casper-conf")
                .global(true)
                .default_value(CASPER_CONF_PATH)
                .help("Live session configuration"),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay a recorded session transcript")
                .arg(
                    Arg::new("transcript")
                        .long("transcript")
                        .required(true)
                        .help("Transcript file (JSON)"),
                )
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Pretty-print the report"),
                ),
        )
        .subcommand(
            Command::new("check-question")
                .about("Show whether the negotiator owns a question")
                .arg(Arg::new("question").required(true).help("Question identifier"))
                .arg(
                    Arg::new("error")
                        .long("error")
                        .action(ArgAction::SetTrue)
                        .help("Treat the identifier as an error event"),
                ),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration"));

    let matches = cli.get_matches();

    let level = matches
        .get_one::<String>("log-level")
        .map_or(DEFAULT_LEVEL, String::as_str);
    init_tracing(level, matches.get_flag("log-json"))?;

    match matches.subcommand() {
        Some(("replay", args)) => {
            let path = args
                .get_one::<String>("transcript")
                .context("missing --transcript")?;
            let mut transcript = Transcript::from_json_file(path)
                .with_context(|| format!("loading transcript {path}"))?;
            if let Some(config) = load_config(&matches)? {
                transcript.config = Some(config);
            }

            let report = replay(transcript, &load_casper(&matches))?;
            let json = if args.get_flag("pretty") {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
        }
        Some(("check-question", args)) => {
            let id = args
                .get_one::<String>("question")
                .context("missing question")?;
            let question: QuestionId = id.parse()?;
            let class = if args.get_flag("error") {
                EventClass::Error
            } else {
                EventClass::Question
            };

            let config = load_config(&matches)?.unwrap_or_default();
            let filter = QuestionFilter::new(config.question_patterns.iter().cloned())?;
            let accepted = filter.accepts(&question, class);

            println!("Question:  {question}");
            println!("Accepted:  {accepted}");
            println!("Patterns:  {}", filter.matching_patterns(&question).join(", "));
            println!("Kind:      {:?}", QuestionKind::classify(&question));
            if class == EventClass::Error {
                println!("Recoverable: {}", config.is_recoverable(question.as_str()));
            }
        }
        Some(("show-config", _)) => {
            let config = load_config(&matches)?
                .unwrap_or_default()
                .with_casper(&load_casper(&matches));
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<Option<MigrationConfig>> {
    matches
        .get_one::<String>("config")
        .map(|path| {
            MigrationConfig::from_json_file(path).with_context(|| format!("loading config {path}"))
        })
        .transpose()
}

fn load_casper(matches: &ArgMatches) -> CasperConfig {
    matches
        .get_one::<String>("casper-conf")
        .map_or_else(CasperConfig::default, CasperConfig::load)
}
