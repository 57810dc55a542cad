#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;
extern crate judge;
extern crate serde;
extern crate serde_json;
extern crate stderrlog;

use std::path::Path;

use error_chain::ChainedError;
use serde::Deserialize;
use serde_json::Value;

use judge::{
    ChallengeLimits,
    EngineConfig,
    ExecutionOptions,
    JudgeEngine,
    Language,
    LanguageProfile,
    TestCase,
};


error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Judge(::judge::Error, ::judge::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }
}


/// Test cases of a `run` invocation, either a bare array or a challenge object carrying defaults.
#[derive(Deserialize)]
#[serde(untagged)]
enum TestSuite {
    Cases(Vec<TestCase>),
    Challenge {
        #[serde(rename = "testCases")]
        test_cases: Vec<TestCase>,

        #[serde(flatten)]
        limits: ChallengeLimits,
    },
}

impl TestSuite {
    fn into_parts(self) -> (Vec<TestCase>, ChallengeLimits) {
        match self {
            TestSuite::Cases(test_cases) => (test_cases, ChallengeLimits::default()),
            TestSuite::Challenge { test_cases, limits } => (test_cases, limits),
        }
    }
}


fn get_arg_matches() -> clap::ArgMatches<'static> {
    let lang_arg = clap::Arg::with_name("lang")
        .short("l")
        .long("lang")
        .required(true)
        .multiple(false)
        .takes_value(true)
        .value_name("LANGUAGE")
        .help("language of the candidate solution");
    let source_arg = clap::Arg::with_name("source")
        .required(true)
        .multiple(false)
        .takes_value(true)
        .value_name("SOURCE_FILE")
        .help("source file of the candidate solution");

    clap::App::new("bench-judge")
        .version("0.1.0")
        .about("Execute candidate solutions against benchmark test cases.")
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .arg(clap::Arg::with_name("config")
            .short("c")
            .long("config")
            .global(true)
            .multiple(false)
            .takes_value(true)
            .value_name("CONFIG_FILE")
            .help("path to the YAML configuration file of the engine"))
        .arg(clap::Arg::with_name("verbose")
            .short("v")
            .global(true)
            .multiple(true)
            .help("increase the verbosity of logs; may be repeated"))
        .arg(clap::Arg::with_name("quiet")
            .short("q")
            .long("quiet")
            .global(true)
            .help("silence all logs"))
        .subcommand(clap::SubCommand::with_name("languages")
            .about("List the supported languages and their commands"))
        .subcommand(clap::SubCommand::with_name("harness")
            .about("Print the harness program materialized for a candidate solution")
            .arg(lang_arg.clone())
            .arg(clap::Arg::with_name("input")
                .short("i")
                .long("input")
                .multiple(false)
                .takes_value(true)
                .value_name("JSON")
                .default_value("null")
                .help("input value embedded into the harness program"))
            .arg(source_arg.clone()))
        .subcommand(clap::SubCommand::with_name("run")
            .about("Execute a candidate solution against test cases")
            .arg(lang_arg)
            .arg(clap::Arg::with_name("tests")
                .short("t")
                .long("tests")
                .required(true)
                .multiple(false)
                .takes_value(true)
                .value_name("TESTS_FILE")
                .help(concat!(
                    "JSON file holding an array of test cases, or an object with a testCases ",
                    "array and optional timeLimit / memoryLimit defaults")))
            .arg(clap::Arg::with_name("sandbox")
                .long("sandbox")
                .help("execute the run phase inside a container"))
            .arg(clap::Arg::with_name("timeout")
                .long("timeout")
                .multiple(false)
                .takes_value(true)
                .value_name("TIMEOUT_MS")
                .help("default real time limit, in milliseconds"))
            .arg(clap::Arg::with_name("workers")
                .short("j")
                .long("workers")
                .multiple(false)
                .takes_value(true)
                .value_name("WORKERS")
                .help("number of test cases executed concurrently"))
            .arg(source_arg))
        .get_matches()
}

fn init_logging(matches: &clap::ArgMatches<'_>) -> Result<()> {
    stderrlog::new()
        .module("bench_judge")
        .module("bench_sandbox")
        .quiet(matches.is_present("quiet"))
        .verbosity(1 + matches.occurrences_of("verbose") as usize)
        .init()
        .map_err(|e| Error::from(format!("cannot initialize logger: {}", e)))
}

fn load_config(matches: &clap::ArgMatches<'_>) -> Result<EngineConfig> {
    match matches.value_of("config") {
        Some(path) => Ok(EngineConfig::from_file(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn read_source(matches: &clap::ArgMatches<'_>) -> Result<String> {
    let path = Path::new(matches.value_of("source").unwrap_or_default());
    std::fs::read_to_string(path)
        .chain_err(|| format!("cannot read source file {}", path.display()))
}

fn do_languages() -> Result<bool> {
    for language in Language::ALL.iter() {
        let profile = language.profile();
        let compile = profile.compile(profile.source_file(), profile.output_file())
            .map(|argv| argv.join(" "))
            .unwrap_or_else(|| String::from("-"));
        let executable = if profile.is_compiled() {
            profile.output_file()
        } else {
            profile.source_file()
        };
        println!("{:<12}{:<48}{}", language.name(), compile, profile.run(executable).join(" "));
    }

    Ok(true)
}

fn do_harness(matches: &clap::ArgMatches<'_>) -> Result<bool> {
    let profile = judge::languages::profile_for(matches.value_of("lang").unwrap_or_default())?;
    let input: Value = serde_json::from_str(matches.value_of("input").unwrap_or("null"))
        .chain_err(|| "invalid input value")?;
    let code = read_source(matches)?;

    let harness = judge::harness::materialize(profile, &code, &input)?;
    print!("{}", harness.text);
    Ok(true)
}

fn do_run(matches: &clap::ArgMatches<'_>) -> Result<bool> {
    let mut config = load_config(matches)?;
    if matches.is_present("sandbox") {
        config.use_sandbox = true;
    }
    if matches.is_present("timeout") {
        config.timeout_ms = value_t!(matches, "timeout", u64).unwrap_or_else(|e| e.exit());
    }
    if matches.is_present("workers") {
        config.max_workers = value_t!(matches, "workers", usize).unwrap_or_else(|e| e.exit());
    }

    let tests_path = matches.value_of("tests").unwrap_or_default();
    let tests_file = std::fs::read_to_string(tests_path)
        .chain_err(|| format!("cannot read tests file {}", tests_path))?;
    let suite: TestSuite = serde_json::from_str(&tests_file)
        .chain_err(|| format!("invalid tests file {}", tests_path))?;
    let (test_cases, limits) = suite.into_parts();

    let code = read_source(matches)?;
    let language = matches.value_of("lang").unwrap_or_default();

    let engine = JudgeEngine::with_config(config);
    let options = ExecutionOptions {
        limits,
        ..ExecutionOptions::default()
    };
    let results = engine.execute_with_options(&code, language, &test_cases, &options);

    let passed = results.iter().filter(|r| r.passed).count();
    info!("{} of {} test cases passed", passed, results.len());
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(passed == results.len())
}

fn do_main() -> Result<bool> {
    let matches = get_arg_matches();

    // Global arguments are propagated into the matches of the subcommand.
    let (name, sub_matches) = match matches.subcommand() {
        (name, Some(sub_matches)) => (name, sub_matches),
        _ => unreachable!()
    };
    init_logging(sub_matches)?;

    match name {
        "languages" => do_languages(),
        "harness" => do_harness(sub_matches),
        "run" => do_run(sub_matches),
        _ => unreachable!()
    }
}

fn main() -> Result<()> {
    match do_main() {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e.display_chain().to_string());
            Err(e)
        }
    }
}
