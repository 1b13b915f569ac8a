//! English screen text.

use crate::config::ResponseMode;

pub const CONTINUE_PROMPT: &str = "Press SPACE to continue";
pub const REPEAT_PROMPT: &str = "Press R to repeat the practice, or SPACE to start the task";

pub const WELCOME_TITLE: &str = "Welcome to the N-Back Task";
pub const WELCOME_MESSAGE: &str =
    "In this task you will see a series of single digits, one after another.";

pub const INSTRUCTIONS_TITLE: &str = "Instructions";
pub const INSTRUCTIONS_OVERVIEW: &str =
    "This task measures working memory: your ability to hold and update information over a short time.";
pub const INSTRUCTIONS_SEQUENCE: &str =
    "Each digit appears briefly in the middle of the screen, followed by a short blank pause.";

pub const TASK_RULES_TITLE: &str = "Task Rules";

pub const RESPONSE_TITLE: &str = "How to Respond";
pub const RESPONSE_WHEN_MATCH: &str = "Respond as soon as you notice a match.";
pub const RESPONSE_WHEN_NO_MATCH: &str = "If the digit does not match, do nothing.";
pub const SPEED_ACCURACY: &str = "Try to be both fast and accurate.";

pub const PRACTICE_TITLE: &str = "Practice";
pub const PRACTICE_MESSAGE: &str =
    "You will first do a short practice round and get feedback at the end.";
pub const READY_MESSAGE: &str = "Get ready, the digits start right away.";

pub const FEEDBACK_TITLE: &str = "Practice Complete";
pub const FEEDBACK_TEXT: &str = "Here is how you did:";

pub const MAIN_READY_TITLE: &str = "Ready for the Main Task";
pub const MAIN_READY_MESSAGE: &str =
    "The main task works exactly like the practice, but without feedback.";
pub const MAIN_PRESS_TO_BEGIN: &str = "Press SPACE to begin";

pub const COMPLETE_TITLE: &str = "Task Complete";
pub const COMPLETE_MESSAGE: &str = "Thank you, you have finished the task.";

pub const BREAK_TITLE: &str = "Take a Break";
pub const BREAK_MESSAGE: &str = "Rest your eyes for a moment.";

pub fn task_description(n_level: usize) -> String {
    match n_level {
        1 => "Respond whenever the digit is the same as the one just before it.".to_string(),
        n => format!("Respond whenever the digit is the same as the one shown {n} steps earlier."),
    }
}

pub fn task_rules(n_level: usize) -> String {
    match n_level {
        1 => "Compare every digit with the previous one.".to_string(),
        n => format!("Compare every digit with the one {n} positions back, ignoring those in between."),
    }
}

/// Worked example for the given level.
pub fn example(n_level: usize) -> String {
    match n_level {
        1 => "Example: 4, 7, 7 -> the second 7 is a match.".to_string(),
        2 => "Example: 3, 8, 3 -> the second 3 is a match.".to_string(),
        3 => "Example: 5, 1, 9, 5 -> the second 5 is a match.".to_string(),
        _ => "Example: 2, 6, 0, 4, 2 -> the second 2 is a match.".to_string(),
    }
}

pub fn response_method(mode: ResponseMode) -> String {
    format!("Response method: {mode}")
}
