use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use wiscdb_core::Result;

use crate::handshake::Scramble;

/// A pluggable authentication method, keyed by its MySQL plugin name.
/// Structured as a registry (spec §C.2) rather than a single hardcoded
/// check so a second plugin (`caching_sha2_password`) can be added later
/// without the handshake state machine changing: the handshake always
/// advertises one plugin name and hands the client's response to whatever
/// provider matches it.
pub trait AuthProvider: Send + Sync {
	fn plugin_name(&self) -> &'static str;

	/// Checks `response` (the client's `auth_response` bytes) against
	/// `password` for the given connection `scramble`. `password` is
	/// looked up by the caller from whatever credential store is
	/// configured; this trait only verifies a response against a known
	/// plaintext password, since neither plugin scheme supports
	/// verifying against a stored-hash-only credential.
	fn verify(&self, scramble: &Scramble, password: &str, response: &[u8]) -> bool;
}

/// `mysql_native_password`: SHA1-based challenge-response (spec §4.7
/// "Default auth plugin is `mysql_native_password` (SHA1-based
/// challenge-response)").
///
/// `response = SHA1(password) XOR SHA1(scramble + SHA1(SHA1(password)))`
pub struct MysqlNativePassword;

impl AuthProvider for MysqlNativePassword {
	fn plugin_name(&self) -> &'static str {
		"mysql_native_password"
	}

	fn verify(&self, scramble: &Scramble, password: &str, response: &[u8]) -> bool {
		if password.is_empty() {
			return response.is_empty();
		}
		if response.len() != 20 {
			return false;
		}

		let stage1 = Sha1::digest(password.as_bytes());
		let stage2 = Sha1::digest(stage1);

		let mut hasher = Sha1::new();
		hasher.update(scramble);
		hasher.update(stage2);
		let mixed = hasher.finalize();

		let expected: Vec<u8> = stage1.iter().zip(mixed.iter()).map(|(a, b)| a ^ b).collect();
		expected.ct_eq(response).into()
	}
}

/// Looks up credentials by username; returns `None` for an unknown user so
/// the caller can respond with the spec's Err 1045 without leaking which
/// half (user vs. password) was wrong.
pub trait CredentialStore: Send + Sync {
	fn password_for(&self, username: &str) -> Option<String>;
}

/// A small in-memory credential store, the only kind the core system
/// needs (spec §1's Non-goals exclude a pluggable external-auth surface;
/// see DESIGN.md).
#[derive(Default, Clone)]
pub struct StaticCredentials {
	users: std::collections::HashMap<String, String>,
}

impl StaticCredentials {
	pub fn new() -> Self {
		StaticCredentials::default()
	}

	pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.users.insert(username.into(), password.into());
		self
	}
}

impl CredentialStore for StaticCredentials {
	fn password_for(&self, username: &str) -> Option<String> {
		self.users.get(username).cloned()
	}
}

/// The registry consulted once per connection: picks the provider matching
/// the plugin name the client echoed back (falling back to the default
/// when the client didn't send one, which is legal under
/// `CLIENT_SECURE_CONNECTION` without `CLIENT_PLUGIN_AUTH`).
pub struct AuthRegistry {
	providers: Vec<Box<dyn AuthProvider>>,
	credentials: Box<dyn CredentialStore>,
}

impl AuthRegistry {
	pub fn new(credentials: impl CredentialStore + 'static) -> Self {
		AuthRegistry { providers: vec![Box::new(MysqlNativePassword)], credentials: Box::new(credentials) }
	}

	pub fn default_plugin_name(&self) -> &'static str {
		self.providers[0].plugin_name()
	}

	pub fn register(&mut self, provider: Box<dyn AuthProvider>) {
		self.providers.push(provider);
	}

	/// `Ok(true)` if `username`/`response` authenticate under the named
	/// plugin (or the default when `plugin_name` is `None`); `Ok(false)`
	/// for a known user with the wrong response; unknown users and
	/// unknown plugin names both fold into `Ok(false)` rather than a
	/// distinguishable error, per spec §4.7's single Err-1045 outcome.
	pub fn authenticate(&self, plugin_name: Option<&str>, username: &str, scramble: &Scramble, response: &[u8]) -> Result<bool> {
		let provider = match plugin_name {
			Some(name) => self.providers.iter().find(|p| p.plugin_name() == name),
			None => self.providers.first(),
		};
		let provider = match provider {
			Some(p) => p,
			None => return Ok(false),
		};
		let password = match self.credentials.password_for(username) {
			Some(p) => p,
			None => return Ok(false),
		};
		Ok(provider.verify(scramble, &password, response))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn native_password_accepts_the_correct_scramble_response() {
		let scramble: Scramble = [9u8; 20];
		let password = "s3cr3t";

		let stage1 = Sha1::digest(password.as_bytes());
		let stage2 = Sha1::digest(stage1);
		let mut hasher = Sha1::new();
		hasher.update(scramble);
		hasher.update(stage2);
		let mixed = hasher.finalize();
		let response: Vec<u8> = stage1.iter().zip(mixed.iter()).map(|(a, b)| a ^ b).collect();

		assert!(MysqlNativePassword.verify(&scramble, password, &response));
		assert!(!MysqlNativePassword.verify(&scramble, "wrong", &response));
	}

	#[test]
	fn registry_rejects_unknown_user_without_distinguishing_the_failure() {
		let registry = AuthRegistry::new(StaticCredentials::new().with_user("root", "hunter2"));
		let scramble: Scramble = [1u8; 20];
		assert!(!registry.authenticate(Some("mysql_native_password"), "nobody", &scramble, &[]).unwrap());
	}
}
