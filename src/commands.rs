//! Commands reachable from the `:` prompt.

/// A root screen to switch to, or quitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Talents,
  Requirements,
  Quit,
}

impl Command {
  /// Prompt order when nothing has been typed
  pub const ALL: [Command; 3] = [Command::Talents, Command::Requirements, Command::Quit];

  pub fn name(self) -> &'static str {
    match self {
      Command::Talents => "talents",
      Command::Requirements => "requirements",
      Command::Quit => "quit",
    }
  }

  fn aliases(self) -> &'static [&'static str] {
    match self {
      Command::Talents => &["t", "talent", "candidates"],
      Command::Requirements => &["r", "req", "jobs"],
      Command::Quit => &["q", "exit"],
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Command::Talents => "Browse the talent pool",
      Command::Requirements => "Browse open staffing requirements",
      Command::Quit => "Exit talentdesk",
    }
  }

  fn rank(self, typed: &str) -> Option<Rank> {
    std::iter::once(self.name())
      .chain(self.aliases().iter().copied())
      .filter_map(|word| {
        if word == typed {
          Some(Rank::Exact)
        } else if word.starts_with(typed) {
          Some(Rank::Prefix)
        } else if is_subsequence(typed, word) {
          Some(Rank::Scattered)
        } else {
          None
        }
      })
      .min()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
  Exact,
  Prefix,
  Scattered,
}

/// Letters of `typed` appear in `word` in order ("rqs" matches "requirements")
fn is_subsequence(typed: &str, word: &str) -> bool {
  let mut letters = word.chars();
  typed.chars().all(|c| letters.any(|w| w == c))
}

/// Commands matching the prompt text, best match first.
pub fn complete(input: &str) -> Vec<Command> {
  let typed = input.trim().to_lowercase();
  if typed.is_empty() {
    return Command::ALL.to_vec();
  }

  let mut ranked: Vec<(Rank, Command)> = Command::ALL
    .into_iter()
    .filter_map(|command| command.rank(&typed).map(|rank| (rank, command)))
    .collect();
  // Stable: ties keep prompt order
  ranked.sort_by_key(|(rank, _)| *rank);
  ranked.into_iter().map(|(_, command)| command).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_prompt_lists_every_command() {
    assert_eq!(complete(""), Command::ALL.to_vec());
    assert_eq!(complete("  "), Command::ALL.to_vec());
  }

  #[test]
  fn test_alias_beats_scattered_match() {
    // "t" is an alias of talents and a scattered match for the others
    assert_eq!(
      complete("t"),
      vec![Command::Talents, Command::Requirements, Command::Quit]
    );
    assert_eq!(complete("jobs"), vec![Command::Requirements]);
  }

  #[test]
  fn test_prefix_and_scattered_matches() {
    assert_eq!(complete("Tal"), vec![Command::Talents]);
    assert_eq!(complete("rqs"), vec![Command::Requirements]);
    assert!(complete("zzz").is_empty());
  }

  #[test]
  fn test_prompt_text_is_normalised() {
    assert_eq!(complete(" REQ ")[0], Command::Requirements);
    assert_eq!(complete("exit"), vec![Command::Quit]);
  }
}
