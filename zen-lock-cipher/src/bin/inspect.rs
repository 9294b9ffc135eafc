//! zen-lock-cipher-inspect — dump ciphertext metadata without decrypting
//!
//! Usage:
//!   zen-lock-cipher-inspect --in <FILE>

use std::fs;
use std::process;

use zen_lock_cipher::inspect;

fn usage() -> ! {
    eprintln!(
        "zen-lock-cipher-inspect — report ciphertext metadata\n\
         \n\
         zen-lock-cipher-inspect --in <FILE>\n"
    );
    process::exit(1);
}

fn die(msg: &str) -> ! {
    eprintln!("error: {}", msg);
    process::exit(1);
}

fn parse_args() -> Vec<(String, String)> {
    let args: Vec<String> = std::env::args().collect();
    let mut flags = Vec::new();

    let mut i = 1;
    while i < args.len() {
        if args[i].starts_with("--") && i + 1 < args.len() {
            flags.push((args[i].clone(), args[i + 1].clone()));
            i += 2;
        } else {
            die(&format!("unexpected argument: {}", args[i]));
        }
    }

    flags
}

fn get_flag(flags: &[(String, String)], name: &str) -> Option<String> {
    flags.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

fn main() {
    let flags = parse_args();
    let in_path = get_flag(&flags, "--in").unwrap_or_else(|| usage());

    let data = fs::read(&in_path).unwrap_or_else(|e| die(&format!("reading {}: {}", in_path, e)));

    match inspect(&data) {
        Ok(info) => {
            println!("version:         {}", info.version);
            println!("recipient_count: {}", info.recipient_count);
            println!("total_bytes:     {}", info.total_bytes);
        }
        Err(e) => die(&format!("not a valid zen-lock ciphertext: {}", e)),
    }
}
