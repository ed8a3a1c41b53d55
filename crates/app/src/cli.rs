use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::vision::{
    self, AnnotateArgs, AnnotateConfig, DetectArgs, DetectConfig, ServeArgs, ServeConfig,
    TelemetryOptions,
};

/// Detect wildlife in photos and draw labelled boxes around each find.
#[derive(Debug, Parser)]
#[command(name = "wildlife", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub telemetry: TelemetryOptions,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the capture/upload page and detection API.
    Serve(ServeArgs),
    /// Detect on one photo and write the annotated copy.
    Detect(DetectArgs),
    /// Draw detections from a JSON file onto a photo.
    Annotate(AnnotateArgs),
}

pub fn handle_command(command: Command) -> Result<()> {
    match command {
        Command::Serve(args) => vision::serve(ServeConfig::try_from(args)?),
        Command::Detect(args) => vision::detect_file(DetectConfig::try_from(args)?),
        Command::Annotate(args) => vision::annotate_file(AnnotateConfig::try_from(args)?),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["wildlife", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind.to_string(), "0.0.0.0:8080");
        assert_eq!(args.jpeg_quality, 85);
    }

    #[test]
    fn chrome_trace_is_global() {
        let cli = Cli::try_parse_from([
            "wildlife",
            "annotate",
            "--image",
            "a.png",
            "--detections",
            "d.json",
            "--chrome-trace",
            "trace.json",
        ])
        .unwrap();
        assert!(cli.telemetry.chrome_trace_path.is_some());
    }
}
