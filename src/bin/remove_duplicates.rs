use anyhow::Result;
use clap::Parser as _;
use isbn_dedup::RemoveArgs;

fn main() -> Result<()> {
    let args = RemoveArgs::parse();
    isbn_dedup::init_tracing();
    isbn_dedup::run_remove(args)
}
