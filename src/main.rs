fn main() {
    if let Err(err) = csv2table::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
