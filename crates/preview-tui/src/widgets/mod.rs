pub mod progress_bar;
pub mod search_input;
pub mod toast;
