// This file is part of pdfr-rs.
//
// pdfr-rs is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// pdfr-rs is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with pdfr-rs.  If not, see <http://www.gnu.org/licenses/>.
//! MD5 (RFC 1321), RC4, and the standard-security-handler key derivation
//! PDF's `/Filter /Standard` encryption uses (Adobe PDF 32000-1:2008 §7.6).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("empty key")]
    EmptyKey,
}

const S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9,
    14, 20, 5, 9, 14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 6, 10, 15,
    21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

/// `floor(abs(sin(i + 1)) * 2^32)` for i in 0..64, the standard MD5 round constants.
const K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

/// Computes the MD5 digest of `input`.
pub fn md5(input: &[u8]) -> [u8; 16] {
    let mut a0: u32 = 0x67452301;
    let mut b0: u32 = 0xefcdab89;
    let mut c0: u32 = 0x98badcfe;
    let mut d0: u32 = 0x10325476;

    let mut message = input.to_vec();
    let bit_len = (input.len() as u64).wrapping_mul(8);
    message.push(0x80);
    while message.len() % 64 != 56 {
        message.push(0);
    }
    message.extend_from_slice(&bit_len.to_le_bytes());

    for chunk in message.chunks(64) {
        let mut m = [0u32; 16];
        for (i, word) in chunk.chunks(4).enumerate() {
            m[i] = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }

        let (mut a, mut b, mut c, mut d) = (a0, b0, c0, d0);
        for i in 0..64 {
            let (f, g) = match i {
                0..=15 => ((b & c) | (!b & d), i),
                16..=31 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                32..=47 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let f = f
                .wrapping_add(a)
                .wrapping_add(K[i])
                .wrapping_add(m[g]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(f.rotate_left(S[i]));
        }

        a0 = a0.wrapping_add(a);
        b0 = b0.wrapping_add(b);
        c0 = c0.wrapping_add(c);
        d0 = d0.wrapping_add(d);
    }

    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&a0.to_le_bytes());
    out[4..8].copy_from_slice(&b0.to_le_bytes());
    out[8..12].copy_from_slice(&c0.to_le_bytes());
    out[12..16].copy_from_slice(&d0.to_le_bytes());
    out
}

/// RC4 key-scheduling plus pseudo-random generation, applied as a stream
/// cipher (encryption and decryption are the same operation).
pub fn rc4(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.is_empty() {
        return Err(CryptoError::EmptyKey);
    }
    let mut state: [u8; 256] = [0; 256];
    for (i, s) in state.iter_mut().enumerate() {
        *s = i as u8;
    }
    let mut j: u8 = 0;
    for i in 0..256 {
        j = j
            .wrapping_add(key[i % key.len()])
            .wrapping_add(state[i]);
        state.swap(i, j as usize);
    }

    let mut out = Vec::with_capacity(data.len());
    let (mut x, mut y) = (0u8, 0u8);
    for &byte in data {
        x = x.wrapping_add(1);
        y = y.wrapping_add(state[x as usize]);
        state.swap(x as usize, y as usize);
        let k = state[(state[x as usize].wrapping_add(state[y as usize])) as usize];
        out.push(byte ^ k);
    }
    Ok(out)
}

/// The 32-byte padding string Algorithm 2 (PDF 32000-1:2008 §7.6.3.3) pads
/// short passwords with.
const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let n = password.len().min(32);
    out[..n].copy_from_slice(&password[..n]);
    out[n..].copy_from_slice(&PASSWORD_PAD[..32 - n]);
    out
}

/// Derives the file encryption key (Algorithm 2) from the (possibly empty)
/// user password, `/O`, `/P`, the first file `/ID` element, key length in
/// bytes, and the security handler revision.
pub fn compute_file_key(
    password: &[u8],
    o_entry: &[u8],
    permissions: i32,
    id0: &[u8],
    key_len: usize,
    revision: u8,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let mut input = Vec::new();
    input.extend_from_slice(&pad_password(password));
    input.extend_from_slice(&o_entry[..o_entry.len().min(32)]);
    input.extend_from_slice(&permissions.to_le_bytes());
    input.extend_from_slice(id0);
    if revision >= 4 && !encrypt_metadata {
        input.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
    }

    let mut digest = md5(&input).to_vec();
    digest.truncate(key_len.min(16));
    if revision >= 3 {
        for _ in 0..50 {
            digest = md5(&digest)[..key_len.min(16)].to_vec();
        }
    }
    digest
}

/// Per-object key derivation (PDF 32000-1:2008 §7.6.2, algorithm 1): the
/// file key is extended with the object number and generation, hashed, and
/// truncated back down to `min(key.len() + 5, 16)` bytes.
pub fn object_key(file_key: &[u8], object_number: u32, generation: u16) -> Vec<u8> {
    let mut extended = file_key.to_vec();
    extended.push((object_number & 0xff) as u8);
    extended.push(((object_number >> 8) & 0xff) as u8);
    extended.push(((object_number >> 16) & 0xff) as u8);
    extended.push((generation & 0xff) as u8);
    extended.push(((generation >> 8) & 0xff) as u8);
    let truncated_len = extended.len().min(16);
    let mut digest = md5(&extended).to_vec();
    digest.truncate(truncated_len);
    digest
}

/// Decrypts (or encrypts — RC4 is symmetric) a single indirect object's
/// stream or string data, given the file encryption key.
pub fn decrypt_stream(
    data: &[u8],
    file_key: &[u8],
    object_number: u32,
    generation: u16,
) -> Result<Vec<u8>, CryptoError> {
    let key = object_key(file_key, object_number, generation);
    log::trace!(
        "decrypting object {} gen {} with {}-byte derived key",
        object_number,
        generation,
        key.len()
    );
    rc4(&key, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_known_vectors() {
        assert_eq!(
            hex(&md5(b"")),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hex(&md5(b"abc")),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            hex(&md5(b"The quick brown fox jumps over the lazy dog")),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn rc4_round_trips() {
        let key = b"Key";
        let plaintext = b"Plaintext";
        let ciphertext = rc4(key, plaintext).unwrap();
        // RC4 test vector from Wikipedia's "RC4 test vectors" table.
        assert_eq!(hex(&ciphertext), "bbf316e8d940af0ad3");
        let roundtrip = rc4(key, &ciphertext).unwrap();
        assert_eq!(roundtrip, plaintext);
    }

    #[test]
    fn rc4_rejects_empty_key() {
        assert!(rc4(&[], b"data").is_err());
    }

    #[test]
    fn object_key_truncates_to_len_plus_five_when_short() {
        let file_key = vec![0u8; 5]; // 40-bit RC4 key
        let key = object_key(&file_key, 1, 0);
        assert_eq!(key.len(), 10); // min(5 + 5, 16)
    }

    #[test]
    fn object_key_caps_at_sixteen_bytes() {
        let file_key = vec![0u8; 16]; // 128-bit RC4 key
        let key = object_key(&file_key, 1, 0);
        assert_eq!(key.len(), 16); // min(16 + 5, 16)
    }

    #[test]
    fn decrypt_then_reencrypt_with_same_object_key_is_identity() {
        let file_key = b"0123456789abcdef".to_vec();
        let plain = b"stream contents go here";
        let cipher = decrypt_stream(plain, &file_key, 7, 0).unwrap();
        let roundtrip = decrypt_stream(&cipher, &file_key, 7, 0).unwrap();
        assert_eq!(roundtrip, plain);
    }
}
