use clap::Parser;

mod cli;
mod html;
mod vision;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let _telemetry = vision::init_telemetry(&cli.telemetry);
    cli::handle_command(cli.command)
}
