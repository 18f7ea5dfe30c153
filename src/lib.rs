pub mod get_terminal_width;
pub mod mem_estimate;
pub mod output_table;
pub mod profiles;
pub mod run_record;
pub mod stats;
pub mod tuning;
pub mod utillib;
