use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use wiscdb_core::{Error, Result};

/// Largest payload a single physical packet can carry (spec §4.7 framing:
/// `length: u24_le`). A logical message larger than this is split across
/// consecutive packets with increasing sequence numbers, the last one
/// shorter than `MAX_PAYLOAD_LEN` (possibly empty, to mark the end).
pub const MAX_PAYLOAD_LEN: usize = 0x00_FF_FF_FF;

/// Reads/writes MySQL's `{length: u24_le, sequence: u8, payload}` packets
/// over one connection, tracking the sequence number the way the protocol
/// requires: it starts at 0 for every new command and increments by one
/// per packet until the command boundary resets it (spec §4.7 "sequence
/// resets to 0 at each command boundary").
pub struct PacketChannel<S> {
	stream: S,
	sequence: u8,
}

impl<S> PacketChannel<S> {
	pub fn new(stream: S) -> Self {
		PacketChannel { stream, sequence: 0 }
	}

	/// Resets the sequence counter; called before a new command's first
	/// packet is read or written.
	pub fn reset_sequence(&mut self) {
		self.sequence = 0;
	}

	pub fn into_inner(self) -> S {
		self.stream
	}
}

impl<S: AsyncRead + Unpin> PacketChannel<S> {
	/// Reads one logical packet, transparently reassembling a payload that
	/// was split across multiple physical packets at `MAX_PAYLOAD_LEN`.
	pub async fn read_packet(&mut self) -> Result<Vec<u8>> {
		let mut payload = Vec::new();
		loop {
			let mut header = [0u8; 4];
			self.stream.read_exact(&mut header).await.map_err(io_err)?;
			let len = (header[0] as usize) | ((header[1] as usize) << 8) | ((header[2] as usize) << 16);
			let seq = header[3];
			if seq != self.sequence {
				return Err(Error::SyntaxError { message: format!("packet sequence mismatch: expected {}, got {seq}", self.sequence) });
			}
			self.sequence = self.sequence.wrapping_add(1);

			let mut chunk = vec![0u8; len];
			self.stream.read_exact(&mut chunk).await.map_err(io_err)?;
			let full_chunk = len == MAX_PAYLOAD_LEN;
			payload.extend_from_slice(&chunk);
			if !full_chunk {
				break;
			}
		}
		Ok(payload)
	}
}

impl<S: AsyncWrite + Unpin> PacketChannel<S> {
	/// Writes one logical payload, splitting it into `MAX_PAYLOAD_LEN`
	/// chunks (with a trailing zero-length packet when the payload is an
	/// exact multiple of the limit, so the reader can tell a full chunk
	/// from the final one).
	pub async fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
		let mut offset = 0;
		loop {
			let end = (offset + MAX_PAYLOAD_LEN).min(payload.len());
			let chunk = &payload[offset..end];
			let mut header = [0u8; 4];
			header[0] = (chunk.len() & 0xFF) as u8;
			header[1] = ((chunk.len() >> 8) & 0xFF) as u8;
			header[2] = ((chunk.len() >> 16) & 0xFF) as u8;
			header[3] = self.sequence;
			self.sequence = self.sequence.wrapping_add(1);

			self.stream.write_all(&header).await.map_err(io_err)?;
			self.stream.write_all(chunk).await.map_err(io_err)?;

			offset = end;
			if chunk.len() < MAX_PAYLOAD_LEN {
				break;
			}
		}
		self.stream.flush().await.map_err(io_err)?;
		Ok(())
	}
}

fn io_err(e: std::io::Error) -> Error {
	Error::storage(wiscdb_core::StorageErrorKind::Io, e)
}

/// A cursor over a packet payload, used to decode the length-encoded
/// integers/strings that make up every MySQL packet body (spec §4.7).
pub struct PayloadReader<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> PayloadReader<'a> {
	pub fn new(buf: &'a [u8]) -> Self {
		PayloadReader { buf, pos: 0 }
	}

	pub fn remaining(&self) -> &'a [u8] {
		&self.buf[self.pos..]
	}

	pub fn is_empty(&self) -> bool {
		self.pos >= self.buf.len()
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		let b = *self.buf.get(self.pos).ok_or_else(unexpected_eof)?;
		self.pos += 1;
		Ok(b)
	}

	pub fn read_u16_le(&mut self) -> Result<u16> {
		let bytes = self.take(2)?;
		Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
	}

	pub fn read_u32_le(&mut self) -> Result<u32> {
		let bytes = self.take(4)?;
		Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
		if self.pos + n > self.buf.len() {
			return Err(unexpected_eof());
		}
		let out = &self.buf[self.pos..self.pos + n];
		self.pos += n;
		Ok(out)
	}

	/// A NUL-terminated string, as used for e.g. the handshake's username
	/// and plugin-name fields.
	pub fn read_nul_string(&mut self) -> Result<String> {
		let start = self.pos;
		while self.pos < self.buf.len() && self.buf[self.pos] != 0 {
			self.pos += 1;
		}
		if self.pos >= self.buf.len() {
			return Err(unexpected_eof());
		}
		let s = String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned();
		self.pos += 1; // skip the NUL
		Ok(s)
	}

	/// Length-encoded integer (spec §4.7 packets use this throughout:
	/// column counts, lenenc strings' length prefix, ...).
	pub fn read_lenenc_int(&mut self) -> Result<u64> {
		let first = self.read_u8()?;
		match first {
			0xFB => Err(Error::Internal("unexpected NULL length-encoded integer".to_string())),
			0xFC => Ok(self.read_u16_le()? as u64),
			0xFD => {
				let bytes = self.take(3)?;
				Ok((bytes[0] as u64) | ((bytes[1] as u64) << 8) | ((bytes[2] as u64) << 16))
			}
			0xFE => {
				let bytes = self.take(8)?;
				Ok(u64::from_le_bytes(bytes.try_into().expect("exactly 8 bytes")))
			}
			n => Ok(n as u64),
		}
	}

	pub fn read_lenenc_string(&mut self) -> Result<Vec<u8>> {
		let len = self.read_lenenc_int()? as usize;
		Ok(self.take(len)?.to_vec())
	}

	pub fn read_remaining(&mut self) -> &'a [u8] {
		let rest = &self.buf[self.pos..];
		self.pos = self.buf.len();
		rest
	}
}

fn unexpected_eof() -> Error {
	Error::SyntaxError { message: "packet ended before expected field".to_string() }
}

/// Appends a length-encoded integer to `out` (spec §4.7's wire encoding for
/// column counts and string-length prefixes).
pub fn write_lenenc_int(out: &mut Vec<u8>, value: u64) {
	if value < 251 {
		out.push(value as u8);
	} else if value < (1 << 16) {
		out.push(0xFC);
		out.extend_from_slice(&(value as u16).to_le_bytes());
	} else if value < (1 << 24) {
		out.push(0xFD);
		let bytes = (value as u32).to_le_bytes();
		out.extend_from_slice(&bytes[..3]);
	} else {
		out.push(0xFE);
		out.extend_from_slice(&value.to_le_bytes());
	}
}

pub fn write_lenenc_string(out: &mut Vec<u8>, value: &[u8]) {
	write_lenenc_int(out, value.len() as u64);
	out.extend_from_slice(value);
}

pub fn write_nul_string(out: &mut Vec<u8>, value: &str) {
	out.extend_from_slice(value.as_bytes());
	out.push(0);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lenenc_int_roundtrips_across_every_width() {
		for value in [0u64, 250, 251, 65_535, 65_536, 16_777_215, 16_777_216, u64::MAX] {
			let mut buf = Vec::new();
			write_lenenc_int(&mut buf, value);
			let mut reader = PayloadReader::new(&buf);
			assert_eq!(reader.read_lenenc_int().unwrap(), value);
			assert!(reader.is_empty());
		}
	}

	#[test]
	fn nul_string_stops_at_terminator() {
		let mut buf = Vec::new();
		write_nul_string(&mut buf, "root");
		buf.extend_from_slice(b"trailing");
		let mut reader = PayloadReader::new(&buf);
		assert_eq!(reader.read_nul_string().unwrap(), "root");
		assert_eq!(reader.read_remaining(), b"trailing");
	}

	#[tokio::test]
	async fn packet_channel_roundtrips_a_small_payload() {
		let (client, server) = tokio::io::duplex(4096);
		let mut writer = PacketChannel::new(client);
		let mut reader = PacketChannel::new(server);
		writer.write_packet(b"hello").await.unwrap();
		let got = reader.read_packet().await.unwrap();
		assert_eq!(got, b"hello");
	}
}
