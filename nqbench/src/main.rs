fn main() {
    if let Err(e) = nqbench::run() {
        eprintln!("[error] {}", e);
        std::process::exit(nqbench::exit_code(&e));
    }
}
