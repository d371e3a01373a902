fn main() {
    if let Err(err) = mapping_miner::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
