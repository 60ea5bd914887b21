//! Algorithm wire protocol.
//!
//! The algorithm process writes one command per line on stdout and reads one
//! result line on stdin. Lines that do not start with a known command verb
//! are not errors: they are treated as plain output and forwarded verbatim
//! to the run's output stream.

use crate::maze::Direction;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    WallFront,
    WallLeft,
    WallRight,
    MoveForward,
    TurnLeft,
    TurnRight,
    SetWheelSpeeds { left: f32, right: f32 },
    Sleep { ms: u64 },
    DeclareWall { x: u32, y: u32, direction: Direction, present: bool },
    SetTileText { x: u32, y: u32, text: String },
    SetTileColor { x: u32, y: u32, color: char },
    ReadSensor { index: usize },
    MazeWidth,
    MazeHeight,
    CurrentXTile,
    CurrentYTile,
    CurrentDirection,
}

/// Outcome of looking at one line from the algorithm.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Command(Command),
    /// A known verb with unusable arguments; answered with `error`.
    Malformed { verb: String },
    /// Not a command at all; forwarded to the output stream.
    Output,
}

pub fn parse_line(line: &str) -> ParsedLine {
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return ParsedLine::Output;
    };
    let args: Vec<&str> = tokens.collect();

    let malformed = || ParsedLine::Malformed { verb: verb.to_string() };
    let exact = |n: usize, cmd: Command| {
        if args.len() == n {
            ParsedLine::Command(cmd)
        } else {
            malformed()
        }
    };

    match verb {
        "wallFront" => exact(0, Command::WallFront),
        "wallLeft" => exact(0, Command::WallLeft),
        "wallRight" => exact(0, Command::WallRight),
        "moveForward" => exact(0, Command::MoveForward),
        "turnLeft" => exact(0, Command::TurnLeft),
        "turnRight" => exact(0, Command::TurnRight),
        "mazeWidth" => exact(0, Command::MazeWidth),
        "mazeHeight" => exact(0, Command::MazeHeight),
        "currentXTile" => exact(0, Command::CurrentXTile),
        "currentYTile" => exact(0, Command::CurrentYTile),
        "currentDirection" => exact(0, Command::CurrentDirection),
        "setWheelSpeeds" => {
            let &[left, right] = &args[..] else {
                return malformed();
            };
            match (left.parse(), right.parse()) {
                (Ok(left), Ok(right)) => {
                    ParsedLine::Command(Command::SetWheelSpeeds { left, right })
                }
                _ => malformed(),
            }
        }
        "sleep" => {
            let &[ms] = &args[..] else {
                return malformed();
            };
            match ms.parse() {
                Ok(ms) => ParsedLine::Command(Command::Sleep { ms }),
                Err(_) => malformed(),
            }
        }
        "declareWall" => {
            let &[x, y, direction, present] = &args[..] else {
                return malformed();
            };
            let direction = direction
                .chars()
                .next()
                .filter(|_| direction.len() == 1)
                .and_then(Direction::from_char);
            let present = match present {
                "1" | "true" => Some(true),
                "0" | "false" => Some(false),
                _ => None,
            };
            match (x.parse(), y.parse(), direction, present) {
                (Ok(x), Ok(y), Some(direction), Some(present)) => {
                    ParsedLine::Command(Command::DeclareWall { x, y, direction, present })
                }
                _ => malformed(),
            }
        }
        "setTileText" => {
            if args.len() < 2 {
                return malformed();
            }
            match (args[0].parse(), args[1].parse()) {
                (Ok(x), Ok(y)) => ParsedLine::Command(Command::SetTileText {
                    x,
                    y,
                    text: args[2..].join(" "),
                }),
                _ => malformed(),
            }
        }
        "setTileColor" => {
            let &[x, y, color] = &args[..] else {
                return malformed();
            };
            let color = color.chars().next().filter(|_| color.len() == 1);
            match (x.parse(), y.parse(), color) {
                (Ok(x), Ok(y), Some(color)) => {
                    ParsedLine::Command(Command::SetTileColor { x, y, color })
                }
                _ => malformed(),
            }
        }
        "readSensor" => {
            let &[index] = &args[..] else {
                return malformed();
            };
            match index.parse() {
                Ok(index) => ParsedLine::Command(Command::ReadSensor { index }),
                Err(_) => malformed(),
            }
        }
        _ => ParsedLine::Output,
    }
}

/// Result of dispatching one command, rendered as a single response line.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ack,
    Bool(bool),
    Number(f32),
    Integer(u32),
    Direction(Direction),
    Crash,
    Denied,
    Error,
}

impl Response {
    pub fn render(&self) -> String {
        match self {
            Response::Ack => "ack".to_string(),
            Response::Bool(true) => "true".to_string(),
            Response::Bool(false) => "false".to_string(),
            Response::Number(value) => format!("{value}"),
            Response::Integer(value) => format!("{value}"),
            Response::Direction(direction) => direction.as_char().to_string(),
            Response::Crash => "crash".to_string(),
            Response::Denied => "denied".to_string(),
            Response::Error => "error".to_string(),
        }
    }
}
