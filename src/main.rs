fn main() {
    if let Err(e) = anamnesis_lib::run() {
        tracing::error!("{e}");
        eprintln!("anamnesis: {e}");
        std::process::exit(1);
    }
}
