//! Command-line front end for the degreepath audit engine. Reads an
//! area specification and a transcript from YAML/JSON, runs the solver,
//! and prints the resulting `AreaResult` as a colored tree or as JSON.

mod loader;
mod report;

use std::path::PathBuf;

use clap::{arg, crate_version, Arg, Command};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::{self, termcolor::{ColorChoice, StandardStream}};
use degreepath_core::{AreaPointer, ExceptionSet};

fn cli() -> Command<'static> {
    Command::new("degreepath")
        .version(crate_version!())
        .about("Audits a transcript against an area-of-study specification")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("audit")
                .about("Audits a transcript against an area specification")
                .arg(
                    Arg::new("AREA")
                        .help("Area specification file (YAML or JSON)")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("TRANSCRIPT")
                        .help("Transcript file (YAML or JSON list of courses)")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("POINTERS")
                        .long("pointers")
                        .takes_value(true)
                        .value_name("FILE")
                        .help("Area pointers file (defaults to an empty list)"),
                )
                .arg(
                    Arg::new("EXCEPTIONS")
                        .long("exceptions")
                        .takes_value(true)
                        .value_name("FILE")
                        .help("Exceptions file (defaults to an empty set)"),
                )
                .arg(arg!(--json "Print the result as JSON instead of a tree")),
        )
        .subcommand(
            Command::new("check")
                .about("Validates an area specification without auditing a transcript")
                .arg(
                    Arg::new("AREA")
                        .help("Area specification file (YAML or JSON)")
                        .required(true)
                        .index(1),
                ),
        )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .init();

    let matches = cli().get_matches();

    let code = match matches.subcommand() {
        Some(("audit", sub)) => run_audit(sub),
        Some(("check", sub)) => run_check(sub),
        _ => unreachable!("clap enforces subcommand_required"),
    };

    if code != 0 {
        std::process::exit(code);
    }
}

fn run_check(sub: &clap::ArgMatches) -> i32 {
    let area_path = PathBuf::from(sub.value_of("AREA").expect("required"));
    match loader::load_area(&area_path) {
        Ok(area) => {
            println!("{} is valid: {} requirements, {} top-level children", area.code, area.requirements.len(), count_children(&area));
            0
        }
        Err(err) => {
            report_load_error(&area_path, &err);
            1
        }
    }
}

fn count_children(area: &degreepath_core::AreaSpec) -> usize {
    match &area.result {
        degreepath_core::Rule::Count(c) => c.of.len(),
        _ => 1,
    }
}

fn run_audit(sub: &clap::ArgMatches) -> i32 {
    let area_path = PathBuf::from(sub.value_of("AREA").expect("required"));
    let transcript_path = PathBuf::from(sub.value_of("TRANSCRIPT").expect("required"));

    let area = match loader::load_area(&area_path) {
        Ok(area) => area,
        Err(err) => {
            report_load_error(&area_path, &err);
            return 1;
        }
    };

    let transcript = match loader::load_transcript(&transcript_path) {
        Ok(t) => t,
        Err(err) => {
            report_load_error(&transcript_path, &err);
            return 1;
        }
    };

    let pointers: Vec<AreaPointer> = match sub.value_of("POINTERS") {
        Some(p) => match loader::load_area_pointers(&PathBuf::from(p)) {
            Ok(p) => p,
            Err(err) => {
                report_load_error(&PathBuf::from(p), &err);
                return 1;
            }
        },
        None => Vec::new(),
    };

    let exceptions: ExceptionSet = match sub.value_of("EXCEPTIONS") {
        Some(p) => match loader::load_exceptions(&PathBuf::from(p)) {
            Ok(e) => e,
            Err(err) => {
                report_load_error(&PathBuf::from(p), &err);
                return 1;
            }
        },
        None => ExceptionSet::default(),
    };

    let result = degreepath_core::solve(&area, &transcript, &pointers, &exceptions);

    if sub.is_present("json") {
        match report::to_json(&result) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("error serializing result: {}", err);
                return 1;
            }
        }
    } else {
        report::print_tree(&result);
    }

    if result.ok {
        0
    } else {
        1
    }
}

fn report_load_error(path: &PathBuf, err: &loader::LoadError) {
    if let loader::LoadError::Specification(spec_err) = err {
        let diagnostic: Diagnostic<()> = spec_err.to_diagnostic();
        let file = SimpleFile::new(path.display().to_string(), String::new());
        let mut writer = StandardStream::stderr(ColorChoice::Auto);
        let config = codespan_reporting::term::Config::default();
        let _ = term::emit(&mut writer, &config, &file, &diagnostic);
    } else {
        eprintln!("{}", err);
    }
}
