mod args;
mod report;

use args::{Args, Command};
use clap::Parser;
use cld_image::build::{BuildError, ImageBuilder};
use cld_image::{FirmwareImage, ParseError};
use driver_log::{ConsoleLogger, level_for_verbosity};
use mdt_image::{MdtError, MdtHeader};
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{fs, io};

#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error("{}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid .cld image")]
    Image(#[from] ParseError),
    #[error("cannot assemble image")]
    Build(#[from] BuildError),
    #[error("invalid .mdt image")]
    Mdt(#[from] MdtError),
}

fn read(path: &Path) -> Result<Vec<u8>, ToolError> {
    fs::read(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn run(command: Command) -> Result<(), ToolError> {
    match command {
        Command::Info { image } => {
            let blob = read(&image)?;
            let parsed = FirmwareImage::parse(&blob)?;
            log::info!("{}: {} bytes", image.display(), blob.len());
            print!("{}", report::describe_cld(&parsed));
        }
        Command::Mdt { image } => {
            let bytes = read(&image)?;
            let header = MdtHeader::parse(&bytes)?;
            print!("{}", report::describe_mdt(&header));
        }
        Command::Pack {
            dram,
            iram,
            version,
            out,
            primary_units,
        } => {
            let blob = ImageBuilder::new()
                .primary_units(primary_units)
                .dram(&read(&dram)?)
                .iram(&read(&iram)?)
                .version(&version)
                .build()?;

            // Never write an image the driver would refuse.
            FirmwareImage::parse(&blob)?;

            fs::write(&out, &blob).map_err(|source| ToolError::Io {
                path: out.clone(),
                source,
            })?;
            log::info!("packed {} bytes into {}", blob.len(), out.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = ConsoleLogger::new(level_for_verbosity(args.verbosity)).init() {
        eprintln!("cldtool: {e}");
    }

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("cldtool: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprint!(": {cause}");
                source = cause.source();
            }
            eprintln!();
            ExitCode::FAILURE
        }
    }
}
