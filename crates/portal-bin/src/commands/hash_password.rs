// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `hash-password` command.

use std::io::{self, BufRead};

use portal_api::users;

use crate::cli::{Cli, HashPasswordArgs};
use crate::error::{BinError, BinResult};

const MIN_PASSWORD_LEN: usize = 8;

/// Prints an Argon2id PHC string for `bootstrap_admin.password_hash`.
pub fn hash_password(_cli: &Cli, args: HashPasswordArgs) -> BinResult<()> {
    let password = match args.password {
        Some(password) => password,
        None => read_line(io::stdin().lock())?,
    };

    println!("{}", hash(&password)?);
    Ok(())
}

pub(crate) fn hash(password: &str) -> BinResult<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(BinError::input(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(users::hash_password(password)?)
}

/// Reads the first line without its line terminator.
fn read_line(mut reader: impl BufRead) -> BinResult<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies() {
        let phc = hash("correct horse").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(users::verify_password("correct horse", &phc));
        assert!(!users::verify_password("wrong horse", &phc));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(hash("short"), Err(BinError::Input(_))));
    }

    #[test]
    fn test_read_line_strips_terminator() {
        let input = io::Cursor::new("s3cret pass\r\nignored\n");
        assert_eq!(read_line(input).unwrap(), "s3cret pass");
    }
}
