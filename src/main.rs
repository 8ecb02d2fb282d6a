use simplelog::{TermLogger, TerminalMode};
use structopt::StructOpt;
use ttc::driver::{self, Backend, BuildOptions, Options};
use ttc::error::SourceMetadata;

use tracing_subscriber::fmt;

fn main() {
    if let Err(ref e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), anyhow::Error> {
    use std::fs;

    let opt = Opt::from_args();

    if let Some((_, filter)) = std::env::vars().find(|x| x.0 == "TTC_TRACE") {
        // the subscriber's log bridge also picks up the driver's `log` records
        fmt::Subscriber::builder()
            .with_ansi(true)
            .pretty()
            .with_env_filter(filter)
            .init();
    } else {
        TermLogger::init(
            if opt.verbose {
                log::LevelFilter::Trace
            } else {
                log::LevelFilter::Info
            },
            Default::default(),
            TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )?;
    }

    let filename = opt.file;
    let file = fs::read_to_string(&filename)?;
    let meta = SourceMetadata::new(&file).with_file(filename.clone());
    let options = BuildOptions {
        input: filename,
        output: opt.output,
        assemble_only: opt.assemble_only,
        compile: Options {
            backend: opt.backend,
            print_ast: opt.print_ast,
            print_tast: opt.print_tast,
            print_ir: opt.print_ir,
        },
    };
    let artifact = driver::build(&meta, &options)?;
    log::info!("wrote {}", artifact.display());

    Ok(())
}

#[derive(Debug, StructOpt)]
#[structopt(name = "ttc", about = "Compiler for the tt language")]
struct Opt {
    /// The file to compile
    #[structopt(parse(from_os_str))]
    file: std::path::PathBuf,
    /// The (optional) output file
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<std::path::PathBuf>,
    /// Only write the backend's text output, don't assemble or link
    #[structopt(short = "S")]
    assemble_only: bool,
    /// Code generator to use: amd64 (FASM) or qbe
    #[structopt(long, default_value = "amd64")]
    backend: Backend,
    /// Print the syntax tree after parsing
    #[structopt(long)]
    print_ast: bool,
    /// Print the typed tree after type checking
    #[structopt(long)]
    print_tast: bool,
    /// Print the IR
    #[structopt(long)]
    print_ir: bool,
    /// Log every step of the build
    #[structopt(short, long)]
    verbose: bool,
}
