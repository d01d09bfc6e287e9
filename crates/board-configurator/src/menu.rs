//! Interactive numbered-menu shell around a [`Session`].

use std::fmt;
use std::io::{BufRead, Write};

use tracing::error;

use crate::error::{Error, Result};
use crate::records::BoardIdentity;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    NotANumber,
    OutOfRange,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::NotANumber => write!(f, "please enter a number"),
            RetryReason::OutOfRange => write!(f, "please enter a valid number"),
        }
    }
}

/// Map a 1-based menu entry to a 0-based index.
pub fn validate(raw: &str, option_count: usize) -> std::result::Result<usize, RetryReason> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(RetryReason::NotANumber);
    }
    match raw.parse::<usize>() {
        Ok(n) if (1..=option_count).contains(&n) => Ok(n - 1),
        _ => Err(RetryReason::OutOfRange),
    }
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(Error::msg("input closed"));
    }
    Ok(line)
}

/// List `options` under `title` and ask until a valid entry is given.
pub fn prompt_choice<R: BufRead, W: Write, S: AsRef<str>>(
    input: &mut R,
    output: &mut W,
    title: &str,
    prompt: &str,
    options: &[S],
) -> Result<usize> {
    writeln!(output, "\n-----{title}-----\n")?;
    for (i, opt) in options.iter().enumerate() {
        writeln!(output, "{}) {}", i + 1, opt.as_ref())?;
    }
    write!(output, "\n{prompt} (by number): ")?;
    output.flush()?;
    loop {
        match validate(&read_line(input)?, options.len()) {
            Ok(idx) => return Ok(idx),
            Err(reason) => {
                write!(output, "\n{prompt} ({reason}): ")?;
                output.flush()?;
            }
        }
    }
}

fn prompt_text<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<String> {
    write!(output, "{prompt}: ")?;
    output.flush()?;
    Ok(read_line(input)?.trim().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Provision,
    ChooseBoard,
    Configure,
    Build,
    Cleanup,
    Exit,
}

impl MenuAction {
    pub fn number(self) -> &'static str {
        match self {
            MenuAction::Provision => "1",
            MenuAction::ChooseBoard => "2",
            MenuAction::Configure => "3",
            MenuAction::Build => "4",
            MenuAction::Cleanup => "5",
            MenuAction::Exit => "6",
        }
    }
}

/// Which actions are offered given the current records.
pub fn available_actions(board_chosen: bool, thing_created: bool) -> Vec<MenuAction> {
    let mut out = vec![MenuAction::Provision, MenuAction::ChooseBoard];
    if board_chosen {
        out.push(MenuAction::Configure);
        out.push(MenuAction::Build);
    }
    if thing_created {
        out.push(MenuAction::Cleanup);
    }
    out.push(MenuAction::Exit);
    out
}

pub fn parse_action(raw: &str, available: &[MenuAction]) -> Option<MenuAction> {
    let raw = raw.trim();
    available.iter().copied().find(|a| a.number() == raw)
}

pub fn choose_board<R: BufRead, W: Write>(
    session: &Session<'_>,
    input: &mut R,
    output: &mut W,
) -> Result<BoardIdentity> {
    let catalog = &session.cfg.catalog;
    let vendors = catalog.iter().map(|v| v.vendor.as_str()).collect::<Vec<_>>();
    let v = prompt_choice(input, output, "CHOOSE A VENDOR", "Select your vendor", &vendors)?;
    let entry = &catalog[v];
    let b = prompt_choice(input, output, "CHOOSE A BOARD", "Select your board", entry.boards.as_slice())?;
    Ok(BoardIdentity::new(entry.vendor.clone(), entry.boards[b].clone()))
}

/// Run the main menu until Exit (or end of input).
pub fn run<R: BufRead, W: Write>(session: &Session<'_>, input: &mut R, output: &mut W) -> Result<()> {
    loop {
        let board = session.current_board()?;
        let thing = session.current_thing()?;
        let actions = available_actions(board.is_some(), thing.is_some());

        writeln!(output, "-----Board Configuration-----\n")?;
        writeln!(output, "Options:")?;
        for a in &actions {
            let label = match (a, &board, &thing) {
                (MenuAction::Provision, _, _) => "Provision cloud resources".to_string(),
                (MenuAction::ChooseBoard, _, _) => "Choose a board".to_string(),
                (MenuAction::Configure, Some(b), _) => format!("Configure your demo for the {b}"),
                (MenuAction::Build, Some(b), _) => format!("Build the demo for the {b}"),
                (MenuAction::Cleanup, _, Some(t)) => {
                    format!("Cleanup cloud resources for the thing: '{t}'")
                }
                (MenuAction::Exit, _, _) => "Exit".to_string(),
                _ => continue,
            };
            writeln!(output, "{}) {label}", a.number())?;
        }
        write!(output, "\nWhat do you want to do?: ")?;
        output.flush()?;

        let line = match read_line(input) {
            Ok(l) => l,
            Err(_) => return Ok(()),
        };
        let Some(action) = parse_action(&line, &actions) else {
            writeln!(output, "Please choose a valid option")?;
            continue;
        };

        let outcome = match action {
            MenuAction::Exit => return Ok(()),
            MenuAction::Provision => {
                writeln!(output, "\n-----Choose a thing name-----\n")?;
                let name = prompt_text(input, output, "What would you like your thing name to be")?;
                session
                    .provision(&name)
                    .map(|t| format!("Provisioned thing '{t}'"))
            }
            MenuAction::ChooseBoard => {
                let b = choose_board(session, input, output)?;
                writeln!(output, "\nYour choice was the {b}")?;
                session
                    .select_board(&b)
                    .map(|files| format!("Merged {} board definition file(s)", files.len()))
            }
            MenuAction::Configure => session
                .configure()
                .map(|()| "Finished configuring".to_string()),
            MenuAction::Build => session.build().map(|()| "Build finished".to_string()),
            MenuAction::Cleanup => session.cleanup().map(|t| match t {
                Some(t) => format!("Cleaned up thing '{t}'"),
                None => "Nothing to clean up".to_string(),
            }),
        };

        match outcome {
            Ok(msg) => writeln!(output, "\n-----{msg}-----\n")?,
            Err(e) => {
                error!("{e}");
                writeln!(output, "\nERROR: {e}\n")?;
            }
        }
    }
}
