//! Label intake - resolves vendor downloads to reviewable installer identities.
//!
//! This binary downloads (or reads) a vendor artifact, unwraps nested
//! containers and prints the identity of the package or app bundle inside.

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match label_intake::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("Hint: {}", hint);
            }
            1
        }
    };

    process::exit(exit_code);
}
