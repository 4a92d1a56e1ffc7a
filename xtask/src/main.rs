mod dequantize;
mod half;
mod list;

#[macro_use]
extern crate clap;
use clap::Parser;

fn main() {
    use Commands::*;
    match Cli::parse().command {
        List(args) => args.list(),
        Half(args) => args.half(),
        Dequantize(args) => args.dequantize(),
    }
}

#[derive(Parser)]
#[clap(name = "ggml-dequant-utils")]
#[clap(version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported element types
    List(list::ListArgs),
    /// Convert between binary16 bit patterns and values
    Half(half::HalfArgs),
    /// Decode a raw block stream into f32 values
    Dequantize(dequantize::DequantizeArgs),
}

#[derive(Args, Default)]
struct LogArgs {
    /// Log level, may be "off", "error", "warn", "info", "debug" or "trace"
    #[clap(long)]
    log: Option<String>,
}

impl LogArgs {
    fn init(self) {
        use log::LevelFilter;
        use simple_logger::SimpleLogger;

        let level = match self.log.as_deref() {
            None => LevelFilter::Warn,
            Some(s) => s.parse().unwrap_or_else(|_| {
                eprintln!("{ERR}Unknown log level \"{s}\", fall back to warn");
                LevelFilter::Warn
            }),
        };
        if let Err(e) = SimpleLogger::new().with_level(level).init() {
            eprintln!("{ERR}Failed to init logger: {e}")
        }
    }
}

const YES: &str = "✔️  ";
const ERR: &str = "❌  ";
