use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and assemble Aquantia `.cld` and Qualcomm `.mdt` firmware images.
#[derive(Debug, Parser)]
#[command(name = "cldtool")]
pub struct Args {
    /// More log output (`-v`, `-vv`, ...).
    #[arg(short, long = "verbose", action = ArgAction::Count, global = true)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Eq, PartialEq, Subcommand)]
pub enum Command {
    /// Show header, version and CRC of a `.cld` image.
    Info { image: PathBuf },
    /// Show the program header table of an `.mdt` image.
    Mdt { image: PathBuf },
    /// Assemble a `.cld` image from DRAM and IRAM contents.
    Pack {
        dram: PathBuf,
        iram: PathBuf,
        version: String,
        out: PathBuf,
        /// Primary offset in 4 KiB units.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(..=0x0fff))]
        primary_units: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse_str(line: &str) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("cldtool").chain(line.split_whitespace()))
    }

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn info_with_verbosity() {
        let args = parse_str("-vv info fw.cld").unwrap();
        assert_eq!(args.verbosity, 2);
        assert_eq!(
            args.command,
            Command::Info {
                image: PathBuf::from("fw.cld")
            }
        );
        assert_eq!(parse_str("info fw.cld -v").unwrap().verbosity, 1);
    }

    #[test]
    fn pack_takes_four_operands() {
        let args = parse_str("pack --primary-units 2 dram.bin iram.bin 5.4.1 out.cld").unwrap();
        assert_eq!(
            args.command,
            Command::Pack {
                dram: PathBuf::from("dram.bin"),
                iram: PathBuf::from("iram.bin"),
                version: String::from("5.4.1"),
                out: PathBuf::from("out.cld"),
                primary_units: 2,
            }
        );
        assert!(parse_str("pack dram.bin iram.bin 5.4.1").is_err());
    }

    #[test]
    fn primary_units_default_to_one() {
        let args = parse_str("pack d i 1.0 o").unwrap();
        assert!(matches!(args.command, Command::Pack { primary_units: 1, .. }));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_str("").is_err());
        assert!(parse_str("flash fw.cld").is_err());
        assert!(parse_str("info a.cld b.cld").is_err());
        assert!(parse_str("--force info a.cld").is_err());
        assert!(parse_str("pack --primary-units x a b c d").is_err());
        assert!(parse_str("pack --primary-units 4096 a b c d").is_err());
    }
}
