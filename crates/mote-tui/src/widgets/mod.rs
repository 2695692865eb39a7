pub mod address_input;
pub mod progress_bar;
pub mod status_bar;
pub mod toast;
