use crate::prelude::*;
use clap::ArgMatches;
use dl_bytecode::code::MethodCode;
use regex::Regex;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;

pub fn run(args: &ArgMatches) -> DlResult<()> {
    init_logger(args);

    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| DlError::BadArguments("--input needed".to_string()))?;
    let assembly = open_assembly(input_fname)?;
    let method_pattern = args
        .get_one::<String>("filter-method")
        .map(|r| Regex::new(r))
        .transpose()?;

    let mut last_res = Ok(());
    for code in &assembly.methods {
        let name = method_name(code, &assembly.pool);
        if let Some(r) = &method_pattern {
            if !r.is_match(&name) {
                continue;
            }
        }
        println!("[*] {name}");

        let cfg = match Cfg::build(code, &assembly.pool) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::error!("{name}: {err}");
                last_res = Err(err.into());
                continue;
            }
        };
        if let Some(cfg_dir) = &args.get_one::<String>("output") {
            write_cfg_file(cfg_dir, code, &assembly.pool, &cfg)?;
        } else {
            println!("    ------------------------------");
            for block in cfg.iter_ordered_blocks() {
                for line in block.to_string().lines() {
                    println!("    {line}");
                }
                println!("    ------------------------------");
            }
        }
    }

    last_res
}

fn write_cfg_file<P: AsRef<Path>>(
    base_dir: P,
    code: &MethodCode,
    pool: &dyn ConstantPool,
    cfg: &Cfg,
) -> DlResult<()> {
    let method = pool.method(code.method)?;

    // prepare directory (base_dir/fully_qualified_class_name)
    let mut dir = base_dir.as_ref().to_path_buf();
    dir.push(method.class.to_java_string());
    create_dir_all(&dir)?;

    // write file, overloads are told apart by their prototype
    let proto = method.proto.to_string().replace(['/', ';'], "_");
    dir.push(format!("{}{proto}.dot", method.name));
    let mut file = File::create(&dir)?;
    file.write_all(cfg.to_dot()?.as_bytes())?;
    log::info!("dot output written in {:?}", dir);

    Ok(())
}
