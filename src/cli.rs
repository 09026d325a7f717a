//! Main `dexlift` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help("Input assembly file")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_filter_method() -> Arg {
    Arg::new("filter-method")
        .long("filter-method")
        .action(ArgAction::Set)
        .help("Method(s) regex filter, matched against La/B;->name(..)R")
}

fn arg_jobs() -> Arg {
    Arg::new("jobs")
        .short('j')
        .long("jobs")
        .action(ArgAction::Set)
        .value_parser(value_parser!(usize))
        .help("Number of worker threads (defaults to the number of cpus)")
}

#[must_use]
pub fn dexlift() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(lift())
        .subcommand(cfg())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn lift() -> Command {
    Command::new("lift")
        .bin_name("dl-lift")
        .version(VERSION)
        .author(AUTHORS)
        .about("Lifts dalvik bytecode into typed three-address code")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_filter_method())
        .arg(arg_jobs())
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Fail methods with conflicting registers instead of defaulting them"),
        )
        .arg(
            Arg::new("keep-dead-code")
                .long("keep-dead-code")
                .action(ArgAction::SetTrue)
                .help("Lift instructions unreachable from the method entry too"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Output lifted bodies and diagnostics as JSON"),
        )
}

#[must_use]
pub fn cfg() -> Command {
    Command::new("cfg")
        .bin_name("dl-cfg")
        .version(VERSION)
        .author(AUTHORS)
        .about("Prints methods control flow graphs")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_output("Dot output directory"))
        .arg(arg_filter_method())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_consistent() {
        dexlift().debug_assert();
    }

    #[test]
    fn lift_flags() {
        let args = lift()
            .try_get_matches_from(["dl-lift", "-i", "a.smali", "--strict", "-j", "4"])
            .unwrap();
        assert!(args.get_flag("strict"));
        assert!(!args.get_flag("keep-dead-code"));
        assert_eq!(args.get_one::<usize>("jobs"), Some(&4));
    }
}
