//! Nurse and physician credentials and the current session role.
//!
//! Credentials are kept in a newline-delimited file, one `role:username:password` record per
//! line with `role` either `nurse` or `physician`. Passwords are stored and compared in
//! plaintext; [`Credential::verify`] is the single place that comparison happens.
//!
//! Parsing rules:
//! - blank lines are skipped
//! - the password is everything after the second `:`, so it may itself contain `:`
//! - lines with an unrecognised role or fewer than three fields are dropped with a warning
//! - a later line for the same username replaces an earlier one

use crate::{TriageError, TriageResult};
use std::collections::HashMap;
use std::io::{BufRead, Write};

/// The kind of clinician using the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Nurse,
    Physician,
}

impl Role {
    /// Token used in the credentials file.
    pub fn to_wire(self) -> &'static str {
        match self {
            Role::Nurse => "nurse",
            Role::Physician => "physician",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "nurse" => Some(Role::Nurse),
            "physician" => Some(Role::Physician),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_wire())
    }
}

impl std::str::FromStr for Role {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_wire(&s.trim().to_ascii_lowercase())
            .ok_or_else(|| TriageError::invalid("role", format!("unknown role '{s}'")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    role: Role,
    username: String,
    password: String,
}

impl Credential {
    pub fn new(role: Role, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            role,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parses one `role:username:password` line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.splitn(3, ':');
        let role = Role::from_wire(fields.next()?)?;
        let username = fields.next().filter(|name| !name.trim().is_empty())?;
        let password = fields.next()?;
        Some(Self::new(role, username, password))
    }

    pub fn to_line(&self) -> String {
        format!("{}:{}:{}", self.role.to_wire(), self.username, self.password)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn verify(&self, password: &str) -> bool {
        self.password == password
    }
}

#[derive(Clone, Debug, Default)]
pub struct CredentialStore {
    credentials: HashMap<String, Credential>,
    current_role: Option<Role>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, credential: Credential) {
        self.credentials
            .insert(credential.username.clone(), credential);
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn is_username_valid(&self, username: &str) -> bool {
        self.credentials.contains_key(username)
    }

    pub fn is_password_valid(&self, username: &str, password: &str) -> bool {
        self.credentials
            .get(username)
            .is_some_and(|c| c.verify(password))
    }

    /// Starts a session as `username`.
    pub fn set_current_user(&mut self, username: &str) -> TriageResult<Role> {
        let role = self
            .credentials
            .get(username)
            .map(Credential::role)
            .ok_or_else(|| TriageError::UnknownUser(username.to_string()))?;
        self.current_role = Some(role);
        Ok(role)
    }

    /// Role of the logged-in user, if any.
    pub fn current_role(&self) -> Option<Role> {
        self.current_role
    }

    /// Merges credentials read from `reader` into the store.
    ///
    /// Returns the number of lines accepted.
    pub fn load_credentials<R: BufRead>(&mut self, reader: R) -> TriageResult<usize> {
        let mut accepted = 0;

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(TriageError::FileRead)?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            match Credential::parse_line(line) {
                Some(credential) => {
                    self.add(credential);
                    accepted += 1;
                }
                None => {
                    tracing::warn!(line = index + 1, "dropping malformed credentials line");
                }
            }
        }

        Ok(accepted)
    }
}

/// Writes `lines` as a fresh credentials file.
pub fn create_default_credentials_file<W, S>(mut sink: W, lines: &[S]) -> TriageResult<()>
where
    W: Write,
    S: AsRef<str>,
{
    for line in lines {
        writeln!(sink, "{}", line.as_ref()).map_err(TriageError::FileWrite)?;
    }
    sink.flush().map_err(TriageError::FileWrite)
}

/// Appends one credential record.
pub fn append_credential<W: Write>(
    mut sink: W,
    role: Role,
    username: &str,
    password: &str,
) -> TriageResult<()> {
    let line = Credential::new(role, username, password).to_line();
    writeln!(sink, "{line}").map_err(TriageError::FileWrite)?;
    sink.flush().map_err(TriageError::FileWrite)
}
