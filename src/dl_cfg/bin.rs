use dexlift::prelude::DlResult;
use dexlift::{cli, dl_cfg};

fn main() -> DlResult<()> {
    let args = cli::cfg().get_matches();
    dl_cfg::run(&args)
}
