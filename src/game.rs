use std::fmt;
use std::io::{BufRead, Error, ErrorKind, Write};
use log::info;
use crate::board::{Board, Cell, Side};
use crate::engine::Engine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Tie,
    ComputerWins(i32),
    PlayerWins(i32),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Tie => write!(f, "Tie game."),
            Outcome::ComputerWins(margin) => write!(f, "Computer wins by {}", margin),
            Outcome::PlayerWins(margin) => write!(f, "Player wins by {}", margin),
        }
    }
}

/// True when the answer to the turn-order prompt asks for the human to move first.
pub fn human_moves_first(answer: &str) -> bool {
    matches!(answer.trim().chars().next(), Some('y') | Some('Y'))
}

/// Prompts until a line parses as an integer. Hitting end of input is an error.
pub fn read_coordinate<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<usize, Error> {
    loop {
        write!(output, "{}", prompt)?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(Error::new(ErrorKind::UnexpectedEof, "Input closed while waiting for a move"));
        }
        match line.trim().parse::<usize>() {
            Ok(value) => return Ok(value),
            Err(_) => writeln!(output, "Please enter a number.")?,
        }
    }
}

/// A human-versus-computer game. Black always moves first.
pub struct Game {
    board: Board,
    to_move: Side,
    computer: Side,
    engine: Engine,
    consecutive_passes: u8,
}

impl Game {
    pub fn new(computer: Side, engine: Engine) -> Self {
        Self::with_board(Board::new(), Side::Black, computer, engine)
    }

    pub fn with_board(board: Board, to_move: Side, computer: Side, engine: Engine) -> Self {
        Self {
            board,
            to_move,
            computer,
            engine,
            consecutive_passes: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn is_over(&self) -> bool {
        self.board.is_full() || self.consecutive_passes >= 2
    }

    pub fn outcome(&self) -> Outcome {
        let margin = self.board.material_score() * self.computer.value();
        match margin.signum() {
            0 => Outcome::Tie,
            1 => Outcome::ComputerWins(margin),
            _ => Outcome::PlayerWins(-margin),
        }
    }

    /// Runs the game to completion and reports the result.
    pub fn play<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<Outcome, Error> {
        writeln!(output, "{}", self.board)?;
        while !self.is_over() {
            if self.to_move == self.computer {
                self.computer_turn(output)?;
            } else {
                self.human_turn(input, output)?;
            }
            self.to_move = -self.to_move;
        }
        let outcome = self.outcome();
        info!("Game over: {:?}", outcome);
        writeln!(output, "{}", outcome)?;
        Ok(outcome)
    }

    fn computer_turn<W: Write>(&mut self, output: &mut W) -> Result<(), Error> {
        writeln!(output, "...")?;
        let (row, col) = self.engine.select_move(&self.board, self.computer);
        if self.board.cell(row, col) == Some(Cell::Empty) && self.board.apply_move(row, col, self.computer) {
            info!("Computer played ({}, {})", row, col);
            self.consecutive_passes = 0;
        } else {
            writeln!(output, "Computer passes.")?;
            self.consecutive_passes += 1;
        }
        writeln!(output, "{}", self.board)?;
        Ok(())
    }

    fn human_turn<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<(), Error> {
        let human = -self.computer;
        if !self.board.has_legal_move(human) {
            writeln!(output, "You must pass.")?;
            self.consecutive_passes += 1;
            return Ok(());
        }
        self.consecutive_passes = 0;
        loop {
            let row = read_coordinate(input, output, "Your move row (1-8): ")?;
            let col = read_coordinate(input, output, "Your move col (1-8): ")?;
            if self.board.apply_move(row, col, human) {
                info!("Player played ({}, {})", row, col);
                break;
            }
            writeln!(output, "Illegal move.")?;
        }
        writeln!(output, "{}", self.board)?;
        Ok(())
    }
}
