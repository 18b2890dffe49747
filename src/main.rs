use std::process;

use gitbridge::ui::output;

fn main() {
    if let Err(e) = gitbridge::cli::run() {
        output::error(format!("{:#}", e));
        process::exit(1);
    }
}
