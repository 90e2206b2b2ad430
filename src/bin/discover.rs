#![deny(warnings, clippy::all)]

use clap::Parser;
use ctf_fs_plugins::error::CodecError;
use ctf_fs_plugins::prelude::*;
use ctf_fs_plugins::source::discovery;
use ctf_fs_plugins::tracing::try_init_tracing_subscriber;
use std::path::PathBuf;
use std::sync::Arc;

/// Discover CTF traces on disk
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct Opts {
    /// Also print each trace's textual metadata
    #[clap(long)]
    pub metadata: bool,

    /// Root path to search for CTF traces
    #[clap(name = "path")]
    pub path: PathBuf,
}

fn main() {
    match do_main() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("{e}");
            let mut cause = e.source();
            while let Some(err) = cause {
                eprintln!("Caused by: {err}");
                cause = err.source();
            }
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

fn do_main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    try_init_tracing_subscriber()?;

    let intr = Interruptor::new();
    let interruptor = intr.clone();
    ctrlc::set_handler(move || {
        if intr.is_set() {
            // 128 (fatal error signal "n") + 2 (control-c is fatal error signal 2)
            std::process::exit(130);
        } else {
            intr.set();
        }
    })?;

    for trace in discovery::discover(&opts.path)? {
        if interruptor.is_set() {
            break;
        }
        println!("{}\t{}", trace.name, trace.path.display());
        if opts.metadata {
            let info = metadata_info(&trace.path, &TextOnlyMetadata)?;
            println!("{}", info.text);
        }
    }

    Ok(())
}

/// Plain-text metadata support only. Packetized metadata and trace-model
/// construction need the full decoder stack this tool doesn't link.
struct TextOnlyMetadata;

impl MetadataDecoder for TextOnlyMetadata {
    fn parse(&self, _text: &str, _options: &MetadataOptions) -> Result<Arc<Trace>, CodecError> {
        Err("this tool does not build trace models".into())
    }

    fn depacketize(&self, _bytes: &[u8], _byte_order: ByteOrder) -> Result<String, CodecError> {
        Err("packetized metadata is not supported by this tool".into())
    }
}
