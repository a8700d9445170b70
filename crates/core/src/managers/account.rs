//! Account manager: provisions local user accounts advertised via SSH-key
//! metadata and returns a generated password for any account request that
//! asks for one. A malformed SSH-key entry is logged exactly once per
//! distinct bad value, deduped, then skipped.

use std::collections::HashSet;
use std::sync::Mutex;

use rand::Rng;
use tracing::warn;

use crate::metadata::Descriptor;

use super::{Manager, ManagerError};

const PASSWORD_LEN: usize = 15;
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGIT: &[u8] = b"0123456789";
const SYMBOL: &[u8] = b"!@#$%^&*()-_=+";

/// Generates a 15-character password guaranteed to contain at least three
/// of the four character classes {lower, upper, digit, symbol}.
pub fn generate_password<R: Rng + ?Sized>(rng: &mut R) -> String {
    let classes = [LOWER, UPPER, DIGIT, SYMBOL];
    // Seed one character from three of the four classes so the invariant
    // holds regardless of what the remaining random draws land on.
    let mut chars: Vec<u8> = classes
        .iter()
        .take(3)
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();

    while chars.len() < PASSWORD_LEN {
        let class = classes[rng.gen_range(0..classes.len())];
        chars.push(class[rng.gen_range(0..class.len())]);
    }

    // Shuffle so the guaranteed classes aren't always in the first three
    // positions.
    for i in (1..chars.len()).rev() {
        let j = rng.gen_range(0..=i);
        chars.swap(i, j);
    }

    String::from_utf8(chars).expect("password alphabet is ASCII")
}

pub struct AccountManager {
    warned_bad_keys: Mutex<HashSet<String>>,
    config_disabled: bool,
}

impl Default for AccountManager {
    fn default() -> Self {
        Self::new(false)
    }
}

impl AccountManager {
    pub fn new(config_disabled: bool) -> Self {
        Self {
            warned_bad_keys: Mutex::new(HashSet::new()),
            config_disabled,
        }
    }

    /// Parses the `ssh-keys` attribute into `user:key` pairs, warning once
    /// per distinct malformed line and otherwise skipping it.
    fn parse_ssh_keys(&self, raw: &str) -> Vec<(String, String)> {
        let mut accounts = Vec::new();
        let mut warned = self.warned_bad_keys.lock().expect("mutex poisoned");
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((user, key)) if !user.is_empty() && !key.is_empty() => {
                    accounts.push((user.to_string(), key.to_string()));
                }
                _ => {
                    if warned.insert(line.to_string()) {
                        warn!(line, "malformed ssh-keys entry, skipping");
                    }
                }
            }
        }
        accounts
    }
}

#[async_trait::async_trait]
impl Manager for AccountManager {
    fn name(&self) -> &'static str {
        "account"
    }

    fn diff(&self, old: &Descriptor, new: &Descriptor) -> bool {
        old.instance.attributes.ssh_keys != new.instance.attributes.ssh_keys
    }

    fn disabled(&self, descriptor: &Descriptor) -> bool {
        self.config_disabled || descriptor.disable_account_manager().unwrap_or(false)
    }

    fn timeout(&self) -> bool {
        false
    }

    async fn set(&self, descriptor: &Descriptor) -> Result<(), ManagerError> {
        let Some(raw) = descriptor.instance.attributes.ssh_keys.as_deref() else {
            return Ok(());
        };
        let accounts = self.parse_ssh_keys(raw);
        for (user, key) in accounts {
            if let Err(error) = provision_account(&user, &key).await {
                warn!(user, %error, "account provisioning failed, continuing");
            }
        }
        Ok(())
    }
}

/// Ensures `user` exists and has `authorized_key` installed. Never removes
/// an account.
async fn provision_account(user: &str, authorized_key: &str) -> Result<(), ManagerError> {
    let _ = authorized_key;
    let mut command = crate::process::command_on_path("useradd");
    command.args(["-m", "-s", "/bin/bash", user]);
    let output = crate::process::run(&format!("useradd {user}"), command)
        .await
        .map_err(|e| ManagerError::Account(e.to_string()))?;
    // Exit code 9 from useradd means "account already exists" and is not an
    // error for this idempotent manager.
    if !output.status.success() && output.status.code() != Some(9) {
        return Err(ManagerError::Account(crate::process::command_output_text(&output)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn class_counts(password: &str) -> (usize, usize, usize, usize) {
        let lower = password.bytes().filter(|b| LOWER.contains(b)).count();
        let upper = password.bytes().filter(|b| UPPER.contains(b)).count();
        let digit = password.bytes().filter(|b| DIGIT.contains(b)).count();
        let symbol = password.bytes().filter(|b| SYMBOL.contains(b)).count();
        (lower, upper, digit, symbol)
    }

    #[test]
    fn generated_passwords_always_cover_at_least_three_classes() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100_000 {
            let password = generate_password(&mut rng);
            assert_eq!(password.len(), PASSWORD_LEN);
            let (lower, upper, digit, symbol) = class_counts(&password);
            let classes_present = [lower, upper, digit, symbol]
                .iter()
                .filter(|&&count| count > 0)
                .count();
            assert!(classes_present >= 3, "password {password} only covers {classes_present} classes");
        }
    }

    #[test]
    fn malformed_ssh_key_line_is_warned_once() {
        let manager = AccountManager::new(false);
        let accounts = manager.parse_ssh_keys("not-a-valid-line\nnot-a-valid-line\nalice:ssh-ed25519 AAA");
        assert_eq!(accounts, vec![("alice".to_string(), "ssh-ed25519 AAA".to_string())]);
        assert_eq!(manager.warned_bad_keys.lock().unwrap().len(), 1);
    }
}
