fn main() {
    if let Err(err) = metro_rents::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
