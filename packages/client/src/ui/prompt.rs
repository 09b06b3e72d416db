//! Prompt utilities for the terminal.

use std::io::Write;

/// Redisplay the prompt after printing asynchronous output
pub fn redisplay_prompt(prompt: &str) {
    print!("{}", prompt);
    std::io::stdout().flush().ok();
}

/// Print output that arrived while the user may be typing, then restore the prompt
pub fn print_above_prompt(output: &str, prompt: &str) {
    print!("{}", output);
    redisplay_prompt(prompt);
}
