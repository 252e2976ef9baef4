use anyhow::Result;
use structopt::StructOpt;

use gbs_dropout::cli::{run, GbsDropout};

fn main() -> Result<()> {
    let opt = GbsDropout::from_args();

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(if opt.verbose() {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .chain(std::io::stderr())
        .apply()?;

    run(opt)
}
