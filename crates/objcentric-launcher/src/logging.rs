use colored::{Colorize, CustomColor};

pub const OBJCENTRIC_TEAL: CustomColor = CustomColor {
    r: 0,
    g: 168,
    b: 150,
};

fn tag() -> colored::ColoredString {
    "objcentric".custom_color(OBJCENTRIC_TEAL)
}

pub fn print_err(err_message: &str) {
    eprintln!("[{}] {}: {}", tag(), "error".red().bold(), err_message);
}

#[macro_export]
macro_rules! print_err {
    ($($arg:tt)*) => {
        $crate::logging::print_err(&format!($($arg)*));
    };
}

pub fn print_warn(warn_message: &str) {
    eprintln!("[{}] {}: {}", tag(), "warning".yellow().bold(), warn_message);
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        $crate::logging::print_warn(&format!($($arg)*));
    };
}

pub fn print_info(info_message: &str) {
    println!("[{}] {}: {}", tag(), "info".cyan().bold(), info_message);
}

#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        $crate::logging::print_info(&format!($($arg)*));
    };
}

pub fn print_success(success_message: &str) {
    println!("[{}] {}: {}", tag(), "success".green().bold(), success_message);
}

#[macro_export]
macro_rules! print_success {
    ($($arg:tt)*) => {
        $crate::logging::print_success(&format!($($arg)*));
    };
}
