//! Line protocol read by `shutter run` on stdin.
//!
//! ```text
//! move <percent> | open | close | stop | calibrate | toggle
//! window open|closed
//! logic disabled|block_downward|open_fully|ventilation_position
//! invert on|off
//! ```

use eyre::{Result, bail, eyre};
use shutter_core::{Command, WindowOpenLogic};

fn parse_switch(word: Option<&str>, on: &str, off: &str) -> Result<bool> {
    match word {
        Some(w) if w == on => Ok(true),
        Some(w) if w == off => Ok(false),
        _ => bail!("expected `{on}` or `{off}`"),
    }
}

pub fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let arg = words.next();
    let cmd = match verb {
        "move" => {
            let raw = arg.ok_or_else(|| eyre!("move needs a percentage"))?;
            let p: u8 = raw
                .trim_end_matches('%')
                .parse()
                .map_err(|_| eyre!("bad percentage {raw:?}"))?;
            Command::MoveTo(p)
        }
        "open" => Command::Open,
        "close" => Command::Close,
        "stop" => Command::Stop,
        "calibrate" => Command::StartCalibration,
        "toggle" => Command::ToggleDirection,
        "window" => Command::SetWindowOpen(parse_switch(arg, "open", "closed")?),
        "invert" => Command::SetDirectionInverted(parse_switch(arg, "on", "off")?),
        "logic" => {
            let name = arg.ok_or_else(|| eyre!("logic needs a name"))?;
            Command::SetWindowLogic(
                WindowOpenLogic::parse(name).ok_or_else(|| eyre!("unknown window logic {name:?}"))?,
            )
        }
        other => bail!("unknown command {other:?}"),
    };
    if let Some(extra) = words.next() {
        bail!("unexpected argument {extra:?}");
    }
    Ok(cmd)
}
