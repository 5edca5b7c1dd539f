fn main() {
    if let Err(e) = inkflow::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
