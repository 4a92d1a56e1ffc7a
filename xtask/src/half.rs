use crate::{LogArgs, ERR};
use ggml_dequant::{
    bf16,
    fp16::{float_to_half, half_to_float},
};
use log::error;

#[derive(Args, Default)]
pub struct HalfArgs {
    /// A binary16 bit pattern such as "0x3c00", or a decimal value to narrow
    #[clap(allow_negative_numbers = true)]
    value: String,

    #[clap(flatten)]
    log: LogArgs,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum Input {
    Bits(u16),
    Value(f32),
}

impl Input {
    fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            u16::from_str_radix(hex, 16)
                .map(Self::Bits)
                .map_err(|e| format!("Invalid bit pattern \"{value}\": {e}"))
        } else {
            value
                .parse()
                .map(Self::Value)
                .map_err(|e| format!("Invalid value \"{value}\": {e}"))
        }
    }
}

impl HalfArgs {
    pub fn half(self) {
        let Self { value, log } = self;
        log.init();

        match Input::parse(&value) {
            Ok(Input::Bits(bits)) => println!("{bits:#06x} -> {:?}", half_to_float(bits)),
            Ok(Input::Value(f)) => {
                let bits = float_to_half(f);
                let brain = bf16::from_f32(f).to_bits();
                println!("f16  {bits:#06x} -> {:?}", half_to_float(bits));
                println!("bf16 {brain:#06x} -> {:?}", bf16::from_bits(brain).to_f32());
            }
            Err(e) => {
                error!("{e}");
                println!("{ERR}{e}");
                std::process::exit(1)
            }
        }
    }
}

#[test]
fn test_parse_input() {
    assert_eq!(Input::parse("0x3c00"), Ok(Input::Bits(0x3c00)));
    assert_eq!(Input::parse("0XC000"), Ok(Input::Bits(0xc000)));
    assert_eq!(Input::parse("-2"), Ok(Input::Value(-2.)));
    assert_eq!(Input::parse(" 0.5 "), Ok(Input::Value(0.5)));
    assert!(Input::parse("zz").is_err());
    assert!(Input::parse("0x1ffff").is_err());
    assert!(Input::parse("0x").is_err());
}

#[test]
fn test_negative_value_argument() {
    use crate::{Cli, Commands};
    use clap::Parser;

    let cli = Cli::try_parse_from(["ggml-dequant-utils", "half", "-2"]).unwrap();
    let Commands::Half(args) = cli.command else {
        panic!("expected the half subcommand")
    };
    assert_eq!(Input::parse(&args.value), Ok(Input::Value(-2.)));

    let cli = Cli::try_parse_from(["ggml-dequant-utils", "half", "-1.5e-3", "--log", "info"]);
    assert!(cli.is_ok());
}
