use std::env;

use argh::{EarlyExit, FromArgs, TopLevelCommand};

struct ArgsOrVersion<T: FromArgs>(T);

impl<T: FromArgs> TopLevelCommand for ArgsOrVersion<T> {}

impl<T: FromArgs> FromArgs for ArgsOrVersion<T> {
    fn from_args(command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        if args.first().map_or(false, |&arg| arg == "--version" || arg == "-V") {
            return Err(EarlyExit {
                output: format!("{} {}", command_name.join(" "), env!("CARGO_PKG_VERSION")),
                status: Ok(()),
            });
        }
        T::from_args(command_name, args).map(Self)
    }
}

/// Equivalent of [`argh::from_env`], with support for a `--version` flag.
pub fn from_env<T: TopLevelCommand>() -> T {
    let strings: Vec<String> = env::args().collect();
    let strs: Vec<&str> = strings.iter().map(String::as_str).collect();
    ArgsOrVersion::<T>::from_args(&[strs[0]], &strs[1..]).map(|args| args.0).unwrap_or_else(
        |exit| match exit.status {
            Ok(()) => {
                println!("{}", exit.output);
                std::process::exit(0);
            }
            Err(()) => {
                eprintln!("{}", exit.output);
                std::process::exit(1);
            }
        },
    )
}
