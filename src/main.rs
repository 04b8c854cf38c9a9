fn main() {
    esmp_sync::env_loader::load_dotenv();

    if let Err(err) = esmp_sync::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
