use terminal_size::{terminal_size, Width};

/// For passing to clap's `set_term_width`: the current terminal width,
/// or a fixed fallback when not connected to a terminal.
pub fn get_terminal_width() -> usize {
    if let Some((Width(w), _)) = terminal_size() {
        w.into()
    } else {
        100
    }
}
