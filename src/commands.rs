// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Operator commands read line by line from stdin.

use std::io::BufRead;
use std::str::FromStr;
use std::thread;

use log::{info, warn};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectFlight(String),
    SelectAirport(String),
    Deselect,
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

const SELECT_USAGE: &str = "select flight <id> | select airport <icao>";

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?;

        let command = match verb.to_ascii_lowercase().as_str() {
            "select" => {
                let (Some(kind), Some(key)) = (words.next(), words.next()) else {
                    return Err(CommandError::Usage(SELECT_USAGE));
                };
                match kind.to_ascii_lowercase().as_str() {
                    "flight" => Command::SelectFlight(key.to_string()),
                    "airport" => Command::SelectAirport(key.to_ascii_uppercase()),
                    _ => return Err(CommandError::Usage(SELECT_USAGE)),
                }
            }
            "deselect" => Command::Deselect,
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        if words.next().is_some() {
            return Err(CommandError::Unknown(line.trim().to_string()));
        }
        Ok(command)
    }
}

/// Read commands from stdin on a dedicated thread.
///
/// A blocking read would hold up runtime shutdown, so stdin stays off the
/// runtime entirely. The thread exits on EOF, `quit`, or once the dashboard
/// drops its receiver.
pub fn spawn_stdin_reader(command_tx: mpsc::Sender<Command>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || forward_commands(std::io::stdin().lock(), &command_tx))
}

fn forward_commands<R: BufRead>(reader: R, command_tx: &mpsc::Sender<Command>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read command: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(command) => {
                let quit = command == Command::Quit;
                if command_tx.blocking_send(command).is_err() || quit {
                    return;
                }
            }
            Err(e) => warn!("{}", e),
        }
    }
    info!("stdin closed, no further commands");
}
