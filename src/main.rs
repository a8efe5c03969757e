use std::io::{self, BufRead, Error, ErrorKind, Write};
use std::time::Duration;
use clap::Parser;
use log::info;
use othello::board::Side;
use othello::engine::{Engine, SearchConfig};
use othello::game::{human_moves_first, Game};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Answer to "would you like to go first" (y/n); asked on stdin when omitted.
    #[arg(long)]
    first: Option<String>,
    /// Seconds the computer may think per move.
    #[arg(long, default_value_t = 20.0)]
    budget_secs: f64,
    /// Stop deepening after this many plies.
    #[arg(long)]
    max_depth: Option<u32>,
    #[arg(long, default_value = "warn")]
    log_level: log::Level,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    simple_logger::init_with_level(args.log_level)
        .map_err(|e| Error::new(ErrorKind::Other, e))?;

    if !(args.budget_secs.is_finite() && args.budget_secs >= 0.0) {
        return Err(Error::new(ErrorKind::InvalidInput, format!("Invalid budget: {}", args.budget_secs)));
    }
    let config = SearchConfig {
        budget: Duration::from_secs_f64(args.budget_secs),
        max_depth: args.max_depth,
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout().lock();

    let answer = match args.first {
        Some(answer) => answer,
        None => {
            writeln!(output, "Enter Y or y if you would like to go first.")?;
            output.flush()?;
            let mut line = String::new();
            input.read_line(&mut line)?;
            line
        }
    };
    let computer = if human_moves_first(&answer) { Side::White } else { Side::Black };
    info!("Computer plays {:?} with {:?}", computer, config);

    let mut game = Game::new(computer, Engine::new(config));
    game.play(&mut input, &mut output)?;
    Ok(())
}
