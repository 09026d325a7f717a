//! # `dexlift`
//!
//! `dexlift` is the main crate of the `dexlift` project, which lifts Dalvik
//! bytecode into a typed three-address representation. The project is
//! subdivided into two library crates, `dexlift` acts as entry point by
//! reexporting them along with the command line tools. Most commonly used
//! items are reexported within the `dexlift::prelude` namespace.
//!
//! ## Library basics
//!
//! Method code is read from a smali-like assembly text, then each method
//! is lifted on its own:
//!
//! ```rust
//! use dexlift::prelude::*;
//!
//! let asm = dexlift::bytecode::parse_assembly(r#"
//! .class La/B;
//! .method static f()I
//!     .registers 2
//!     const/4 v0, 0x5
//!     neg-int v1, v0
//!     return v1
//! .end method
//! "#)?;
//! let body = lift_method(&asm.methods[0], &asm.pool, &Options::default())?;
//! assert!(body.diagnostics.is_empty());
//! println!("{}", PrettyPrinter(&body, &asm.pool));
//! # Ok::<(), DlError>(())
//! ```
//!
//! ## Sub-crates
//!
//!  - [`dl_bytecode`] contains the definitions of addresses, registers,
//!    types, opcodes, decoded instructions, method code and constant pool,
//!    as well as the assembly front end,
//!  - [`dl_lift`] contains the lifting algorithms and the typed
//!    representation they produce.

mod errors;

pub mod cli;
pub mod dl_cfg;
pub mod dl_lifter;

pub use dl_bytecode as bytecode;
pub use dl_lift as lift;

use crate::errors::DlResult;
use dl_bytecode::code::MethodCode;
use dl_bytecode::pool::ConstantPool;
use dl_bytecode::Assembly;
use dl_lift::errors::LiftResult;
use dl_lift::ir::Body;
use dl_lift::Options;
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Reads and parses an assembly file.
pub fn open_assembly<P: AsRef<Path>>(path: P) -> DlResult<Assembly> {
    let text = fs::read_to_string(path)?;
    Ok(dl_bytecode::parse_assembly(&text)?)
}

/// Full name of the method of some code (`La/B;->f(I)V`).
#[must_use]
pub fn method_name(code: &MethodCode, pool: &dyn ConstantPool) -> String {
    pool.method(code.method).map_or_else(
        |_| format!("<method #{}>", code.method.as_usize()),
        ToString::to_string,
    )
}

/// The lifting outcome of one method.
#[derive(Debug)]
pub struct Lifted<'a> {
    pub code: &'a MethodCode,
    pub name: String,
    pub result: LiftResult<Body>,
}

/// Lifts every method of an assembly whose name matches the filter.
///
/// Methods are lifted in parallel, each one on its own; a method that
/// fails to lift does not prevent the others from being lifted. Results
/// are returned in the assembly order.
#[must_use]
pub fn lift_all<'a>(
    assembly: &'a Assembly,
    filter: Option<&Regex>,
    options: &Options,
) -> Vec<Lifted<'a>> {
    let selected: Vec<(&MethodCode, String)> = assembly
        .methods
        .iter()
        .map(|code| (code, method_name(code, &assembly.pool)))
        .filter(|(_, name)| filter.map_or(true, |r| r.is_match(name)))
        .collect();
    log::debug!(
        "lifting {} out of {} methods",
        selected.len(),
        assembly.methods.len()
    );
    selected
        .into_par_iter()
        .map(|(code, name)| {
            log::info!("lift {name}");
            let result = dl_lift::lift_method(code, &assembly.pool, options);
            Lifted { code, name, result }
        })
        .collect()
}

/// Reexport module of commonly used structures and functions from `dexlift`
/// project sub-crates:
///
/// ```rust
/// use dexlift::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{DlError, DlResult};
    pub use crate::{lift_all, method_name, open_assembly, Lifted};

    pub use dl_bytecode::pool::{ConstantPool, Pool, PrettyPrinter};
    pub use dl_bytecode::{Addr, Assembly};

    pub use dl_lift::controlflow::Cfg;
    pub use dl_lift::diagnostics::{Diagnostic, DiagnosticKind};
    pub use dl_lift::ir::Body;
    pub use dl_lift::{lift_method, Options};

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("DL_LOG", "info")
            .write_style("DL_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_METHODS: &str = r#"
.class La/B;
.method static good(F)F
    .registers 2
    neg-float v0, p0
    return v0
.end method
.method static bad()V
    .registers 1
    invoke-static {v0}, La/B;->g()V
    return-void
.end method
"#;

    #[test]
    fn failures_stay_per_method() {
        let asm = dl_bytecode::parse_assembly(TWO_METHODS).unwrap();
        let lifted = lift_all(&asm, None, &Options::default());
        assert_eq!(lifted.len(), 2);
        assert!(lifted[0].name.ends_with("good(F)F"));
        assert!(lifted[0].result.is_ok());
        assert!(lifted[1].result.is_err());
    }

    #[test]
    fn sample_lifts_without_conflicts() {
        let asm = dl_bytecode::parse_assembly(include_str!("../demos/sample.smali")).unwrap();
        let lifted = lift_all(&asm, None, &Options::default());
        assert_eq!(lifted.len(), 5);
        for item in &lifted {
            let body = item.result.as_ref().unwrap();
            assert!(
                body.diagnostics.iter().all(|d| !d.is_conflict()),
                "{}",
                item.name
            );
        }
    }

    #[test]
    fn methods_are_filtered_by_name() {
        let asm = dl_bytecode::parse_assembly(TWO_METHODS).unwrap();
        let filter = Regex::new("->good").unwrap();
        let lifted = lift_all(&asm, Some(&filter), &Options::default());
        assert_eq!(lifted.len(), 1);
        assert_eq!(lifted[0].name, method_name(lifted[0].code, &asm.pool));
    }
}
