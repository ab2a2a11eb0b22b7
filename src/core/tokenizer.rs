use crate::core::error::{DorisError, Result};

/// A query token. Quoted tokens carry literal values the user delimited
/// explicitly; they bypass keyword matching entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub quoted: bool,
}

impl Token {
    pub fn bare(text: &str) -> Token {
        Token {
            text: text.to_string(),
            quoted: false,
        }
    }

    pub fn quoted(text: &str) -> Token {
        Token {
            text: text.to_string(),
            quoted: true,
        }
    }
}

/// Splits a raw query on whitespace, honoring `"..."` and `'...'` quoting.
/// Quote markers are stripped; insertion order is preserved. A token counts
/// as quoted only when the quote opens at its start; a quote embedded
/// mid-token still groups characters but leaves the token ordinary. Quoted
/// tokens that end up empty are discarded. Unbalanced quotes are a syntax
/// error.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut was_quoted = false;
    let mut open_quote: Option<char> = None;

    for ch in input.chars() {
        match open_quote {
            Some(quote) => {
                if ch == quote {
                    open_quote = None;
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '"' | '\'' => {
                    open_quote = Some(ch);
                    if current.is_empty() {
                        was_quoted = true;
                    }
                }
                c if c.is_whitespace() => flush(&mut tokens, &mut current, &mut was_quoted),
                c => current.push(c),
            },
        }
    }

    if open_quote.is_some() {
        return Err(DorisError::syntax("unbalanced quote in query"));
    }
    flush(&mut tokens, &mut current, &mut was_quoted);
    Ok(tokens)
}

fn flush(tokens: &mut Vec<Token>, current: &mut String, was_quoted: &mut bool) {
    if !current.is_empty() {
        tokens.push(Token {
            text: std::mem::take(current),
            quoted: *was_quoted,
        });
    }
    *was_quoted = false;
}
