use anyhow::{Result, bail};
use std::io::{self, IsTerminal, Write};

pub fn is_interactive() -> bool {
  io::stdin().is_terminal() && io::stderr().is_terminal()
}

fn read_answer(prompt: &str) -> Result<String> {
  write!(io::stderr(), "{} ", prompt)?;
  io::stderr().flush()?;

  let mut input = String::new();
  if io::stdin().read_line(&mut input)? == 0 {
    bail!("Input closed while waiting for an answer");
  }
  Ok(input.trim().to_string())
}

fn is_yes(answer: &str) -> bool {
  matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

pub fn confirm(message: &str, yes: bool) -> Result<bool> {
  if yes {
    return Ok(true);
  }

  if !is_interactive() {
    bail!("Cannot prompt for confirmation in non-interactive mode. Use --yes to proceed.");
  }

  let answer = read_answer(&format!("{} [y/N]", message))?;
  Ok(is_yes(&answer))
}

/// Ask for a value, falling back to `default` on empty input or with `--yes`.
pub fn prompt_with_default(label: &str, default: &str, flag: &str, yes: bool) -> Result<String> {
  if yes {
    return Ok(default.to_string());
  }

  if !is_interactive() {
    bail!("Cannot prompt for {label} in non-interactive mode. Pass {flag} or use --yes for the default.");
  }

  let answer = read_answer(&format!("{} [{}]:", label, default))?;
  Ok(if answer.is_empty() { default.to_string() } else { answer })
}

/// Ask for a value that has no default.
pub fn prompt_required(label: &str, flag: &str) -> Result<String> {
  if !is_interactive() {
    bail!("Cannot prompt for {label} in non-interactive mode. Pass {flag}.");
  }

  loop {
    let answer = read_answer(&format!("{}:", label))?;
    if !answer.is_empty() {
      return Ok(answer);
    }
  }
}
