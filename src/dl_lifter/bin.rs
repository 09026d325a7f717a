use dexlift::prelude::DlResult;
use dexlift::{cli, dl_lifter};

fn main() -> DlResult<()> {
    let args = cli::lift().get_matches();
    dl_lifter::run(&args)
}
