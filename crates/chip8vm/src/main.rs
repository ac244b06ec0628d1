fn main() {
    env_logger::init();

    let options = match chip8vm::Options::from_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err:#}\n\n{}", chip8vm::USAGE);
            std::process::exit(2);
        }
    };

    if let Err(err) = chip8vm::run(&options) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
