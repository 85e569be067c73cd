use clap::Parser;

use webfs_cli::Args;

fn main() {
    env_logger::init();

    let args = Args::parse();

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    if let Err(e) = webfs_cli::run(&args, &mut stdout.lock(), &mut stderr.lock()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
