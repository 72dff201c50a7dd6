use wiscdb_core::{Error, Result};

/// A single lexical token. Keywords are recognized by the parser from
/// `Token::Ident` rather than as their own variants, since this grammar's
/// keyword set is small and case-insensitive like MySQL's own.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
	Ident(String),
	/// A quoted string literal, already unescaped.
	StringLit(String),
	/// An integer literal, kept as text so the parser can pick the
	/// narrowest `Value` variant that fits (spec §4.2's integer family).
	NumberLit(String),
	Star,
	Comma,
	Dot,
	LParen,
	RParen,
	Eq,
	NotEq,
	Lt,
	LtEq,
	Gt,
	GtEq,
	Plus,
	Minus,
	Slash,
	Semicolon,
	Eof,
}

/// Splits SQL text into tokens. Whitespace and `--`/`#` line comments are
/// skipped; string literals support `''`-doubling for an embedded quote
/// (standard SQL, not backslash escapes).
pub struct Lexer<'a> {
	chars: std::iter::Peekable<std::str::CharIndices<'a>>,
	input: &'a str,
}

impl<'a> Lexer<'a> {
	pub fn new(input: &'a str) -> Self {
		Lexer { chars: input.char_indices().peekable(), input }
	}

	pub fn tokenize(mut self) -> Result<Vec<Token>> {
		let mut tokens = Vec::new();
		loop {
			let tok = self.next_token()?;
			let done = tok == Token::Eof;
			tokens.push(tok);
			if done {
				break;
			}
		}
		Ok(tokens)
	}

	fn next_token(&mut self) -> Result<Token> {
		self.skip_whitespace_and_comments();
		let (start, c) = match self.chars.peek().copied() {
			Some(pair) => pair,
			None => return Ok(Token::Eof),
		};
		match c {
			'*' => {
				self.chars.next();
				Ok(Token::Star)
			}
			'+' => {
				self.chars.next();
				Ok(Token::Plus)
			}
			'-' => {
				self.chars.next();
				Ok(Token::Minus)
			}
			'/' => {
				self.chars.next();
				Ok(Token::Slash)
			}
			',' => {
				self.chars.next();
				Ok(Token::Comma)
			}
			'.' => {
				self.chars.next();
				Ok(Token::Dot)
			}
			'(' => {
				self.chars.next();
				Ok(Token::LParen)
			}
			')' => {
				self.chars.next();
				Ok(Token::RParen)
			}
			';' => {
				self.chars.next();
				Ok(Token::Semicolon)
			}
			'=' => {
				self.chars.next();
				Ok(Token::Eq)
			}
			'!' => {
				self.chars.next();
				self.expect_char('=')?;
				Ok(Token::NotEq)
			}
			'<' => {
				self.chars.next();
				match self.chars.peek().map(|(_, c)| *c) {
					Some('>') => {
						self.chars.next();
						Ok(Token::NotEq)
					}
					Some('=') => {
						self.chars.next();
						Ok(Token::LtEq)
					}
					_ => Ok(Token::Lt),
				}
			}
			'>' => {
				self.chars.next();
				if self.chars.peek().map(|(_, c)| *c) == Some('=') {
					self.chars.next();
					Ok(Token::GtEq)
				} else {
					Ok(Token::Gt)
				}
			}
			'\'' => self.read_string(),
			'`' => self.read_backtick_ident(),
			c if c.is_ascii_digit() => Ok(Token::NumberLit(self.read_while(start, |c| c.is_ascii_digit() || c == '.'))),
			c if c.is_alphabetic() || c == '_' => Ok(Token::Ident(self.read_while(start, |c| c.is_alphanumeric() || c == '_'))),
			other => Err(Error::SyntaxError { message: format!("unexpected character '{other}'") }),
		}
	}

	fn expect_char(&mut self, expected: char) -> Result<()> {
		match self.chars.next() {
			Some((_, c)) if c == expected => Ok(()),
			_ => Err(Error::SyntaxError { message: format!("expected '{expected}'") }),
		}
	}

	fn read_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> String {
		let mut end = start;
		while let Some((idx, c)) = self.chars.peek().copied() {
			if pred(c) {
				end = idx + c.len_utf8();
				self.chars.next();
			} else {
				break;
			}
		}
		self.input[start..end].to_string()
	}

	fn read_string(&mut self) -> Result<Token> {
		self.chars.next(); // opening quote
		let mut out = String::new();
		loop {
			match self.chars.next() {
				Some((_, '\'')) => {
					if self.chars.peek().map(|(_, c)| *c) == Some('\'') {
						self.chars.next();
						out.push('\'');
					} else {
						return Ok(Token::StringLit(out));
					}
				}
				Some((_, c)) => out.push(c),
				None => return Err(Error::SyntaxError { message: "unterminated string literal".to_string() }),
			}
		}
	}

	fn read_backtick_ident(&mut self) -> Result<Token> {
		self.chars.next(); // opening backtick
		let mut out = String::new();
		loop {
			match self.chars.next() {
				Some((_, '`')) => return Ok(Token::Ident(out)),
				Some((_, c)) => out.push(c),
				None => return Err(Error::SyntaxError { message: "unterminated quoted identifier".to_string() }),
			}
		}
	}

	fn skip_whitespace_and_comments(&mut self) {
		loop {
			match self.chars.peek().copied() {
				Some((_, c)) if c.is_whitespace() => {
					self.chars.next();
				}
				Some((_, '-')) => {
					let mut lookahead = self.chars.clone();
					lookahead.next();
					if lookahead.peek().map(|(_, c)| *c) == Some('-') {
						self.skip_to_eol();
					} else {
						break;
					}
				}
				Some((_, '#')) => self.skip_to_eol(),
				_ => break,
			}
		}
	}

	fn skip_to_eol(&mut self) {
		for (_, c) in self.chars.by_ref() {
			if c == '\n' {
				break;
			}
		}
	}
}
