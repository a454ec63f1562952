//! Random password generation for new entries.

use rand::Rng;
use zeroize::Zeroizing;

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Which character classes a generated password draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub length: usize,
    pub uppercase: bool,
    pub lowercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 16,
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

impl PasswordPolicy {
    fn alphabet(&self) -> Vec<char> {
        let mut chars = String::new();
        if self.lowercase {
            chars.push_str(LOWERCASE);
        }
        if self.uppercase {
            chars.push_str(UPPERCASE);
        }
        if self.digits {
            chars.push_str(DIGITS);
        }
        if self.symbols {
            chars.push_str(SYMBOLS);
        }

        // Every class disabled: fall back to letters and digits.
        if chars.is_empty() {
            chars.push_str(LOWERCASE);
            chars.push_str(UPPERCASE);
            chars.push_str(DIGITS);
        }
        chars.chars().collect()
    }
}

/// Generate a random password following `policy`.
pub fn generate_password(policy: &PasswordPolicy) -> Zeroizing<String> {
    let alphabet = policy.alphabet();
    let mut rng = rand::rng();
    let password: String = (0..policy.length)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())])
        .collect();
    Zeroizing::new(password)
}
