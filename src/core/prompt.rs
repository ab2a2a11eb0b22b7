use crate::core::error::Result;

/// Blocking line input. The REPL implements this over rustyline; tests
/// script answers instead.
pub trait Prompter {
    fn read_line(&mut self, prompt: &str) -> Result<String>;
}

/// What the user picked, or the skip sentinel. Skip is a normal outcome and
/// propagates as "abandon this query", never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Picked(usize),
    Skip,
}

/// The one disambiguation primitive, shared by action, argument and value
/// selection. Prints numbered options plus a trailing skip choice, reads a
/// line, and returns the zero-based pick. Anything that is not a valid
/// in-range number - including the explicit skip index `len + 1` - is a
/// skip.
pub fn choose<T>(
    prompter: &mut dyn Prompter,
    message: &str,
    options: &[T],
    label: impl Fn(&T) -> String,
) -> Result<Choice> {
    println!("{}", message);
    for (position, option) in options.iter().enumerate() {
        println!("  {}) {}", position + 1, label(option));
    }
    println!("  {}) skip this query", options.len() + 1);

    let answer = prompter.read_line("> ")?;
    Ok(parse_choice(&answer, options.len()))
}

fn parse_choice(answer: &str, option_count: usize) -> Choice {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=option_count).contains(&n) => Choice::Picked(n - 1),
        _ => Choice::Skip,
    }
}

/// Scripted prompter for tests: hands out canned answers in order, then
/// empty lines (which read as skips).
#[cfg(test)]
pub(crate) struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub(crate) fn new<I: IntoIterator<Item = &'static str>>(answers: I) -> ScriptedPrompter {
        ScriptedPrompter {
            answers: answers.into_iter().map(String::from).collect(),
        }
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, _prompt: &str) -> Result<String> {
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}
