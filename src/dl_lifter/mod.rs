use crate::prelude::*;
use clap::ArgMatches;
use nu_ansi_term::Color;
use regex::Regex;
use serde::Serialize;

#[derive(Serialize)]
struct JsonEntry<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a Body>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn options(args: &ArgMatches) -> Options {
    Options::default()
        .strict(args.get_flag("strict"))
        .prune_unreachable(!args.get_flag("keep-dead-code"))
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    let color = match diagnostic.kind {
        DiagnosticKind::Conflict => Color::Red,
        DiagnosticKind::Unconstrained | DiagnosticKind::Ambiguous => Color::Yellow,
    };
    println!("    {}", color.paint(format!("// {diagnostic}")));
}

pub fn run(args: &ArgMatches) -> DlResult<()> {
    init_logger(args);

    if let Some(jobs) = args.get_one::<usize>("jobs") {
        rayon::ThreadPoolBuilder::new()
            .num_threads(*jobs)
            .build_global()?;
    }

    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| DlError::BadArguments("--input needed".to_string()))?;
    let assembly = open_assembly(input_fname)?;
    let method_pattern = args
        .get_one::<String>("filter-method")
        .map(|r| Regex::new(r))
        .transpose()?;
    let options = options(args);
    log::debug!("lifting options: {options:?}");

    let lifted = lift_all(&assembly, method_pattern.as_ref(), &options);

    let mut nb_success = 0;
    let mut nb_fails = 0;
    let mut nb_diagnostics = 0;
    let mut last_res = Ok(());

    for item in &lifted {
        match &item.result {
            Ok(body) => {
                nb_success += 1;
                nb_diagnostics += body.diagnostics.len();
                for diagnostic in &body.diagnostics {
                    log::warn!("{}: {diagnostic}", item.name);
                }
            }
            Err(err) => {
                nb_fails += 1;
                log::error!("{}: {err}", item.name);
            }
        }
    }

    if args.get_flag("json") {
        let entries: Vec<JsonEntry> = lifted
            .iter()
            .map(|item| JsonEntry {
                method: &item.name,
                body: item.result.as_ref().ok(),
                error: item.result.as_ref().err().map(ToString::to_string),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for item in &lifted {
            println!("[*] {}", item.name);
            match &item.result {
                Ok(body) => {
                    println!("{}", PrettyPrinter(body, &assembly.pool));
                    for diagnostic in &body.diagnostics {
                        print_diagnostic(diagnostic);
                    }
                }
                Err(err) => println!("    {}", Color::Red.paint(format!("// {err}"))),
            }
        }
    }

    for item in lifted {
        if let Err(err) = item.result {
            last_res = Err(err.into());
        }
    }

    log::info!("");
    log::info!(
        "lifted methods: {} / {} ({} diagnostics)",
        nb_success,
        nb_success + nb_fails,
        nb_diagnostics
    );

    last_res
}
