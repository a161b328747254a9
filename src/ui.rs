//! Terminal output helpers for the qrouter binary

use colored::*;
use terminal_size::{terminal_size, Height, Width};

pub fn print_header(model: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "qrouter".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  🔀 {} {}", name, version);

    let info = format!("  {}", model).cyan();
    println!("{}", info);

    println!("{}", line.black().bold());
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red().bold(), msg.red());
}

pub fn print_tools_used(names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("  {} {}", "🔧".cyan(), format!("Tools used: {}", names.join(", ")).cyan());
}
