use clap::Parser as _;
use isbn_dedup::FindArgs;

fn main() {
    let args = FindArgs::parse();
    isbn_dedup::init_tracing();
    isbn_dedup::run_find(args);
}
