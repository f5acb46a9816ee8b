//! CLI tool to generate the admin secret used by `POST /api/create-api-key`.
//!
//! Usage:
//!   cargo run --bin generate_admin_secret -- [--env-file .env] [--print-only]

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;

const SECRET_VAR: &str = "ADMIN_SECRET_KEY";

/// 32 random bytes, hex encoded.
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Replace or append the `ADMIN_SECRET_KEY=` line of an env file.
fn upsert_secret(contents: &str, secret: &str) -> String {
    let line = format!("{}={}", SECRET_VAR, secret);
    let prefix = format!("{}=", SECRET_VAR);
    let mut replaced = false;

    let mut lines: Vec<String> = contents
        .lines()
        .map(|l| {
            if l.trim_start().starts_with(&prefix) {
                replaced = true;
                line.clone()
            } else {
                l.to_string()
            }
        })
        .collect();

    if !replaced {
        lines.push(line);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn print_usage() {
    println!("Usage: generate_admin_secret [--env-file <path>] [--print-only]");
    println!();
    println!("Options:");
    println!("  -f, --env-file <path>  env file to update (default: .env)");
    println!("  -p, --print-only       print the secret without writing any file");
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut env_file = ".env".to_string();
    let mut print_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--env-file" | "-f" => {
                i += 1;
                env_file = args
                    .get(i)
                    .cloned()
                    .context("--env-file needs a path")?;
            }
            "--print-only" | "-p" => print_only = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                print_usage();
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let secret = generate_secret();

    if !print_only {
        let path = Path::new(&env_file);
        let existing = if path.exists() {
            fs::read_to_string(path).with_context(|| format!("reading {}", env_file))?
        } else {
            String::new()
        };

        fs::write(path, upsert_secret(&existing, &secret))
            .with_context(|| format!("writing {}", env_file))?;
    }

    println!();
    println!("════════════════════════════════════════════════════════════════");
    println!("  Admin Secret Generated");
    println!("════════════════════════════════════════════════════════════════");
    println!();
    println!("  {}={}", SECRET_VAR, secret);
    println!();
    if print_only {
        println!("  Set it in the server environment before starting it.");
    } else {
        println!("  Written to {}. Restart the server to pick it up.", env_file);
    }
    println!("  Keep this value private: it can issue keys for any address.");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn upsert_replaces_existing_line() {
        let contents = "DATABASE_URL=postgres://x\nADMIN_SECRET_KEY=old\nSERVER_PORT=3000\n";
        let updated = upsert_secret(contents, "new");

        assert_eq!(
            updated,
            "DATABASE_URL=postgres://x\nADMIN_SECRET_KEY=new\nSERVER_PORT=3000\n"
        );
    }

    #[test]
    fn upsert_appends_when_missing() {
        assert_eq!(upsert_secret("", "abc"), "ADMIN_SECRET_KEY=abc\n");
        assert_eq!(
            upsert_secret("SERVER_PORT=3000", "abc"),
            "SERVER_PORT=3000\nADMIN_SECRET_KEY=abc\n"
        );
    }
}
